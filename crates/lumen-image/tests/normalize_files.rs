//! On-disk normalization: encoded files in, fixed-length vectors out.

use image::{GrayImage, ImageBuffer, Luma, LumaA};
use lumen_image::{ChannelPolicy, FEATURE_LEN, ImageError, Normalizer};
use tempfile::TempDir;

#[test]
fn zero_png_512_normalizes_to_all_zeros() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("black.png");
    GrayImage::new(512, 512).save(&path).unwrap();

    let fv = Normalizer::new().normalize_path(&path).unwrap();
    assert_eq!(fv.len(), FEATURE_LEN);
    assert!(fv.as_slice().iter().all(|&v| v == 0));
}

#[test]
fn sixteen_bit_grayscale_is_single_channel() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("deep.png");
    let img: ImageBuffer<Luma<u16>, Vec<u16>> = ImageBuffer::from_pixel(64, 48, Luma([u16::MAX]));
    img.save(&path).unwrap();

    let fv = Normalizer::new().normalize_path(&path).unwrap();
    assert!(fv.as_slice().iter().all(|&v| v == 255));
}

#[test]
fn extension_does_not_matter() {
    let dir = TempDir::new().unwrap();
    let png = dir.path().join("scan.png");
    GrayImage::from_pixel(32, 32, Luma([40])).save(&png).unwrap();
    let renamed = dir.path().join("scan.dat");
    std::fs::rename(&png, &renamed).unwrap();

    let fv = Normalizer::new().normalize_path(&renamed).unwrap();
    assert_eq!(fv.len(), FEATURE_LEN);
}

#[test]
fn alpha_channel_follows_policy() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("alpha.png");
    let img: ImageBuffer<LumaA<u8>, Vec<u8>> = ImageBuffer::from_pixel(20, 20, LumaA([60, 255]));
    img.save(&path).unwrap();

    let strict = Normalizer::new().normalize_path(&path).unwrap_err();
    assert!(matches!(strict, ImageError::ChannelCount { got: 2, .. }));

    let converted = Normalizer::new()
        .with_channel_policy(ChannelPolicy::ConvertToLuma)
        .normalize_path(&path)
        .unwrap();
    assert_eq!(converted.len(), FEATURE_LEN);
}
