//! Decode, resize, and flatten a grayscale image.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageReader};
use tracing::{debug, instrument};

use crate::ImageError;
use crate::feature::FeatureVector;

/// Side length of the square canvas every image is resized onto.
pub const CANVAS_SIZE: u32 = 256;

/// Cubic (Catmull-Rom) interpolation. Changing this invalidates every
/// persisted model.
const RESIZE_FILTER: FilterType = FilterType::CatmullRom;

/// How to treat decoded images that carry more than one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelPolicy {
    /// Reject anything that is not single-channel.
    #[default]
    Strict,
    /// Convert color or alpha images to 8-bit luma before resizing.
    ConvertToLuma,
}

/// Turns images into [`FeatureVector`]s.
///
/// Resizing ignores aspect ratio (no letterboxing or cropping).
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    channel_policy: ChannelPolicy,
}

impl Normalizer {
    /// Create a normalizer with the [`ChannelPolicy::Strict`] policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the channel policy.
    #[must_use]
    pub fn with_channel_policy(mut self, channel_policy: ChannelPolicy) -> Self {
        self.channel_policy = channel_policy;
        self
    }

    /// Return the channel policy.
    #[must_use]
    pub fn channel_policy(&self) -> ChannelPolicy {
        self.channel_policy
    }

    /// Decode the image at `path` and normalize it.
    ///
    /// The format is sniffed from the file contents, so extensions do not
    /// matter.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ImageError::Read`] | file cannot be opened |
    /// | [`ImageError::Decode`] | contents are not a decodable image |
    /// | [`ImageError::ChannelCount`] | more than one channel under [`ChannelPolicy::Strict`] |
    /// | [`ImageError::EmptyImage`] | zero width or height |
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn normalize_path(&self, path: impl AsRef<Path>) -> Result<FeatureVector, ImageError> {
        let path = path.as_ref();

        let decoded = ImageReader::open(path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|e| ImageError::Read {
                path: path.to_path_buf(),
                source: e,
            })?
            .decode()
            .map_err(|e| ImageError::Decode {
                path: path.to_path_buf(),
                source: e,
            })?;

        let gray = self.to_gray(decoded, path)?;
        self.normalize_image(&gray)
    }

    /// Normalize an already-decoded grayscale image.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::EmptyImage`] if the image has zero width or height.
    pub fn normalize_image(&self, image: &GrayImage) -> Result<FeatureVector, ImageError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(ImageError::EmptyImage { width, height });
        }

        let resized = imageops::resize(image, CANVAS_SIZE, CANVAS_SIZE, RESIZE_FILTER);
        debug!(width, height, "resized onto canvas");

        FeatureVector::new(resized.into_raw())
    }

    /// Reduce a decoded image to 8-bit luma according to the channel policy.
    fn to_gray(&self, decoded: DynamicImage, path: &Path) -> Result<GrayImage, ImageError> {
        let channels = decoded.color().channel_count();
        if channels != 1 && self.channel_policy == ChannelPolicy::Strict {
            return Err(ImageError::ChannelCount {
                path: path.to_path_buf(),
                expected: 1,
                got: channels,
            });
        }
        Ok(match decoded {
            DynamicImage::ImageLuma8(gray) => gray,
            other => other.to_luma8(),
        })
    }
}

#[cfg(test)]
mod tests {
    use image::{GrayImage, Luma, Rgb, RgbImage};
    use tempfile::TempDir;

    use super::*;
    use crate::feature::FEATURE_LEN;

    #[test]
    fn zero_image_normalizes_to_zeros() {
        let img = GrayImage::new(512, 512);
        let fv = Normalizer::new().normalize_image(&img).unwrap();
        assert_eq!(fv.len(), FEATURE_LEN);
        assert!(fv.as_slice().iter().all(|&v| v == 0));
    }

    #[test]
    fn length_is_fixed_for_any_resolution() {
        let normalizer = Normalizer::new();
        for (w, h) in [(1, 1), (3, 700), (256, 256), (1024, 97), (300, 300)] {
            let img = GrayImage::from_fn(w, h, |x, y| Luma([((x * 7 + y * 13) % 256) as u8]));
            let fv = normalizer.normalize_image(&img).unwrap();
            assert_eq!(fv.len(), FEATURE_LEN, "size {w}x{h}");
        }
    }

    #[test]
    fn uniform_image_stays_uniform() {
        let img = GrayImage::from_pixel(123, 77, Luma([180]));
        let fv = Normalizer::new().normalize_image(&img).unwrap();
        assert!(fv.as_slice().iter().all(|&v| v.abs_diff(180) <= 1));
    }

    #[test]
    fn normalization_is_deterministic() {
        let img = GrayImage::from_fn(400, 311, |x, y| Luma([((x ^ y) % 256) as u8]));
        let normalizer = Normalizer::new();
        let a = normalizer.normalize_image(&img).unwrap();
        let b = normalizer.normalize_image(&img).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_image_rejected() {
        let img = GrayImage::new(0, 10);
        let err = Normalizer::new().normalize_image(&img).unwrap_err();
        assert!(matches!(err, ImageError::EmptyImage { width: 0, height: 10 }));
    }

    #[test]
    fn strict_policy_rejects_rgb() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("color.png");
        RgbImage::from_pixel(16, 16, Rgb([10, 20, 30])).save(&path).unwrap();

        let err = Normalizer::new().normalize_path(&path).unwrap_err();
        assert!(matches!(
            err,
            ImageError::ChannelCount { expected: 1, got: 3, .. }
        ));
    }

    #[test]
    fn convert_policy_accepts_rgb() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("color.png");
        RgbImage::from_pixel(16, 16, Rgb([90, 90, 90])).save(&path).unwrap();

        let fv = Normalizer::new()
            .with_channel_policy(ChannelPolicy::ConvertToLuma)
            .normalize_path(&path)
            .unwrap();
        assert_eq!(fv.len(), FEATURE_LEN);
        assert!(fv.as_slice().iter().all(|&v| v.abs_diff(90) <= 1));
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = Normalizer::new()
            .normalize_path("/tmp/lumen_missing_image_0451.png")
            .unwrap_err();
        assert!(matches!(err, ImageError::Read { .. }));
        assert!(err.is_input_error());
    }

    #[test]
    fn garbage_file_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.png");
        std::fs::write(&path, b"definitely not a png").unwrap();
        let err = Normalizer::new().normalize_path(&path).unwrap_err();
        assert!(matches!(err, ImageError::Decode { .. }));
    }
}
