//! End-to-end assembly tests over real image files on disk.

use std::fs;
use std::path::Path;

use image::{GrayImage, Luma, Rgb, RgbImage};
use lumen_image::{ChannelPolicy, Label, Normalizer};
use lumen_io::{DatasetAssembler, DecodeFailurePolicy, IoError};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn write_gray(path: &Path, side: u32, value: u8) {
    GrayImage::from_pixel(side, side, Luma([value])).save(path).unwrap();
}

/// `normal/` with 3 images and `covid/` with 2.
fn make_tree(root: &Path) {
    let normal = root.join("normal");
    let covid = root.join("covid");
    fs::create_dir_all(&normal).unwrap();
    fs::create_dir_all(&covid).unwrap();
    for (i, side) in [64u32, 300, 512].iter().enumerate() {
        write_gray(&normal.join(format!("n{i}.png")), *side, 20);
    }
    for (i, side) in [128u32, 1024].iter().enumerate() {
        write_gray(&covid.join(format!("c{i}.png")), *side, 220);
    }
}

// ---------------------------------------------------------------------------
// Directory-pair assembly
// ---------------------------------------------------------------------------

#[test]
fn three_normal_two_covid_gives_five_samples() {
    let dir = TempDir::new().unwrap();
    make_tree(dir.path());

    let assembly = DatasetAssembler::new(Normalizer::new())
        .with_directory(dir.path().join("normal"), Label::Normal)
        .with_directory(dir.path().join("covid"), Label::Covid)
        .with_sort_by_file_name(true)
        .assemble()
        .unwrap();
    assert!(assembly.skipped.is_empty());

    let dataset = assembly.into_dataset().unwrap();
    assert_eq!(dataset.len(), 5);
    assert_eq!(dataset.label_count(Label::Normal), 3);
    assert_eq!(dataset.label_count(Label::Covid), 2);
    assert_eq!(
        dataset.labels(),
        vec![Label::Normal, Label::Normal, Label::Normal, Label::Covid, Label::Covid]
    );
    for sample in dataset.samples() {
        assert_eq!(sample.features().len(), 65_536);
    }
    assert!(dataset.samples()[0].source().ends_with("normal/n0.png"));
}

#[test]
fn undecodable_file_is_skipped_and_recorded() {
    let dir = TempDir::new().unwrap();
    make_tree(dir.path());
    fs::write(dir.path().join("covid").join("broken.png"), b"not an image").unwrap();

    let assembly = DatasetAssembler::new(Normalizer::new())
        .with_directory(dir.path().join("normal"), Label::Normal)
        .with_directory(dir.path().join("covid"), Label::Covid)
        .assemble()
        .unwrap();

    assert_eq!(assembly.samples.len(), 5);
    assert_eq!(assembly.skipped.len(), 1);
    assert_eq!(assembly.skipped[0].label, Label::Covid);
    assert!(assembly.skipped[0].path.ends_with("broken.png"));
}

#[test]
fn abort_policy_returns_first_failure() {
    let dir = TempDir::new().unwrap();
    make_tree(dir.path());
    fs::write(dir.path().join("normal").join("broken.jpg"), b"\xff\xd8garbage").unwrap();

    let err = DatasetAssembler::new(Normalizer::new())
        .with_directory(dir.path().join("normal"), Label::Normal)
        .with_failure_policy(DecodeFailurePolicy::Abort)
        .assemble()
        .unwrap_err();
    assert!(matches!(err, IoError::Normalize { ref path, .. } if path.ends_with("broken.jpg")));
}

#[test]
fn color_image_skipped_under_strict_and_kept_under_convert() {
    let dir = TempDir::new().unwrap();
    make_tree(dir.path());
    RgbImage::from_pixel(40, 40, Rgb([10, 200, 30]))
        .save(dir.path().join("normal").join("color.png"))
        .unwrap();

    let strict = DatasetAssembler::new(Normalizer::new())
        .with_directory(dir.path().join("normal"), Label::Normal)
        .assemble()
        .unwrap();
    assert_eq!(strict.samples.len(), 3);
    assert_eq!(strict.skipped.len(), 1);

    let convert = DatasetAssembler::new(
        Normalizer::new().with_channel_policy(ChannelPolicy::ConvertToLuma),
    )
    .with_directory(dir.path().join("normal"), Label::Normal)
    .assemble()
    .unwrap();
    assert_eq!(convert.samples.len(), 4);
    assert!(convert.skipped.is_empty());
}

#[test]
fn hidden_files_and_subdirectories_are_ignored() {
    let dir = TempDir::new().unwrap();
    make_tree(dir.path());
    fs::write(dir.path().join("normal").join(".DS_Store"), b"junk").unwrap();
    let nested = dir.path().join("normal").join("nested");
    fs::create_dir_all(&nested).unwrap();
    write_gray(&nested.join("deep.png"), 32, 1);

    let shallow = DatasetAssembler::new(Normalizer::new())
        .with_directory(dir.path().join("normal"), Label::Normal)
        .assemble()
        .unwrap();
    assert_eq!(shallow.samples.len(), 3);
    assert!(shallow.skipped.is_empty());

    let deep = DatasetAssembler::new(Normalizer::new())
        .with_directory(dir.path().join("normal"), Label::Normal)
        .with_max_depth(2)
        .assemble()
        .unwrap();
    assert_eq!(deep.samples.len(), 4);
}

#[test]
fn empty_directories_give_empty_dataset_error() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("normal")).unwrap();

    let assembly = DatasetAssembler::new(Normalizer::new())
        .with_directory(dir.path().join("normal"), Label::Normal)
        .assemble()
        .unwrap();
    assert!(matches!(assembly.into_dataset(), Err(IoError::EmptyDataset)));
}

#[test]
fn file_registered_as_directory_rejected() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("scan.png");
    write_gray(&file, 8, 0);

    let err = DatasetAssembler::new(Normalizer::new())
        .with_directory(&file, Label::Normal)
        .assemble()
        .unwrap_err();
    assert!(matches!(err, IoError::NotADirectory { .. }));
}

// ---------------------------------------------------------------------------
// Root-based assembly
// ---------------------------------------------------------------------------

#[test]
fn from_root_maps_label_directories() {
    let dir = TempDir::new().unwrap();
    make_tree(dir.path());
    fs::create_dir_all(dir.path().join("misc")).unwrap();

    let assembler = DatasetAssembler::from_root(dir.path(), Normalizer::new()).unwrap();
    let labels: Vec<Label> = assembler.directories().iter().map(|(_, l)| *l).collect();
    // Sorted by name: "covid" < "normal".
    assert_eq!(labels, vec![Label::Covid, Label::Normal]);

    let dataset = assembler.assemble().unwrap().into_dataset().unwrap();
    assert_eq!(dataset.len(), 5);
}

#[test]
fn from_root_accepts_covid_19_spelling() {
    let dir = TempDir::new().unwrap();
    let covid = dir.path().join("COVID-19");
    fs::create_dir_all(&covid).unwrap();
    write_gray(&covid.join("a.png"), 16, 200);

    let assembler = DatasetAssembler::from_root(dir.path(), Normalizer::new()).unwrap();
    assert_eq!(assembler.directories().len(), 1);
    assert_eq!(assembler.directories()[0].1, Label::Covid);
}

#[test]
fn from_root_without_labels_rejected() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("misc")).unwrap();
    let err = DatasetAssembler::from_root(dir.path(), Normalizer::new()).unwrap_err();
    assert!(matches!(err, IoError::NoLabeledDirectories { .. }));
}

#[test]
fn from_root_missing_root_rejected() {
    let dir = TempDir::new().unwrap();
    let err = DatasetAssembler::from_root(dir.path().join("nope"), Normalizer::new()).unwrap_err();
    assert!(matches!(err, IoError::DirectoryNotFound { .. }));
}

// ---------------------------------------------------------------------------
// Split after assembly
// ---------------------------------------------------------------------------

#[test]
fn assembled_dataset_splits_eighty_twenty() {
    let dir = TempDir::new().unwrap();
    make_tree(dir.path());
    let dataset = DatasetAssembler::from_root(dir.path(), Normalizer::new())
        .unwrap()
        .assemble()
        .unwrap()
        .into_dataset()
        .unwrap();

    let split = dataset.train_test_split(0.2, 1).unwrap();
    assert_eq!(split.test.len(), 1);
    assert_eq!(split.train.len(), 4);
}
