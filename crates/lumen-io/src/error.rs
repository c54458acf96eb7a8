//! I/O error types for lumen-io.

use std::path::PathBuf;

use lumen_image::ImageError;

/// Errors from directory traversal, dataset construction, and report writing.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Returned when a labeled directory does not exist or is unreadable.
    #[error("directory not found: {path}")]
    DirectoryNotFound {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a labeled path exists but is not a directory.
    #[error("not a directory: {path}")]
    NotADirectory {
        /// Path that was attempted.
        path: PathBuf,
    },

    /// Returned when a data root contains no subdirectory named after a label.
    #[error("no labeled subdirectories (e.g. \"normal\", \"covid\") under {root}")]
    NoLabeledDirectories {
        /// The data root that was scanned.
        root: PathBuf,
    },

    /// Returned under [`DecodeFailurePolicy::Abort`](crate::DecodeFailurePolicy)
    /// when a directory entry cannot be traversed.
    #[error("cannot traverse {path}")]
    Walk {
        /// Entry path, or the directory root when unknown.
        path: PathBuf,
        /// Underlying traversal error.
        source: walkdir::Error,
    },

    /// Returned when an image cannot be normalized and the failure is not
    /// skippable.
    #[error("cannot normalize {path}")]
    Normalize {
        /// Path of the offending file.
        path: PathBuf,
        /// Underlying normalization error.
        source: ImageError,
    },

    /// Returned when assembly produced zero samples.
    #[error("empty dataset: no image could be assembled")]
    EmptyDataset,

    /// Returned when the test fraction is not strictly between 0 and 1.
    #[error("test fraction must be in (0, 1), got {fraction}")]
    InvalidTestFraction {
        /// The invalid value provided.
        fraction: f64,
    },

    /// Returned when a split would leave the train or test side empty.
    #[error("cannot split {n_samples} samples with {n_test} held out: both sides need at least one sample")]
    InvalidSplit {
        /// Number of samples in the dataset.
        n_samples: usize,
        /// Number of samples the fraction asked for.
        n_test: usize,
    },

    /// Returned when the experiment name contains characters outside `[a-zA-Z0-9_-]`.
    #[error("invalid experiment name \"{name}\": must match [a-zA-Z0-9_-]+")]
    InvalidExperimentName {
        /// The invalid name.
        name: String,
    },

    /// Returned when the output directory cannot be created.
    #[error("cannot create output directory {path}")]
    OutputDirCreate {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a report cannot be serialized.
    #[error("cannot serialize report for {path}")]
    Serialize {
        /// Destination path.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// Returned when a result file cannot be written.
    #[error("cannot write file {path}")]
    WriteFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}
