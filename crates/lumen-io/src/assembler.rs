//! Labeled directory walker that turns image folders into a [`Dataset`].

use std::fs;
use std::path::{Path, PathBuf};

use lumen_image::{Label, Normalizer, error_chain};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::domain::{Dataset, Sample};
use crate::IoError;

/// What to do when a file in a labeled directory cannot be normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeFailurePolicy {
    /// Log a warning, record the file in [`Assembly::skipped`], and continue.
    #[default]
    Skip,
    /// Stop and return the first failure.
    Abort,
}

/// A file that was left out of the dataset.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    /// Path of the file.
    pub path: PathBuf,
    /// Label of the directory it was found in.
    pub label: Label,
    /// Human-readable failure reason.
    pub reason: String,
}

/// Output of [`DatasetAssembler::assemble`].
#[derive(Debug, Default)]
pub struct Assembly {
    /// Successfully normalized samples in traversal order.
    pub samples: Vec<Sample>,
    /// Files skipped under [`DecodeFailurePolicy::Skip`].
    pub skipped: Vec<SkippedFile>,
}

impl Assembly {
    /// Turn the assembled samples into a [`Dataset`].
    ///
    /// # Errors
    ///
    /// Returns [`IoError::EmptyDataset`] if no sample was assembled.
    pub fn into_dataset(self) -> Result<Dataset, IoError> {
        Dataset::from_samples(self.samples)
    }
}

/// Walks labeled directories and normalizes every regular file in them.
///
/// Files whose names start with `.` are ignored.
///
/// # Defaults
///
/// | Parameter           | Default |
/// |---------------------|---------|
/// | `max_depth`         | 1 (direct children only) |
/// | `sort_by_file_name` | `false` (filesystem order) |
/// | `failure_policy`    | `Skip`  |
#[derive(Debug, Clone)]
pub struct DatasetAssembler {
    normalizer: Normalizer,
    directories: Vec<(PathBuf, Label)>,
    max_depth: usize,
    sort_by_file_name: bool,
    failure_policy: DecodeFailurePolicy,
}

impl DatasetAssembler {
    /// Create an assembler with no directories registered.
    #[must_use]
    pub fn new(normalizer: Normalizer) -> Self {
        Self {
            normalizer,
            directories: Vec::new(),
            max_depth: 1,
            sort_by_file_name: false,
            failure_policy: DecodeFailurePolicy::Skip,
        }
    }

    /// Register every immediate subdirectory of `root` whose name parses as
    /// a [`Label`] (`normal`, `covid`, `COVID-19`, ...). Other entries are
    /// ignored.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::DirectoryNotFound`] | `root` is missing or unreadable |
    /// | [`IoError::NotADirectory`] | `root` is a file |
    /// | [`IoError::NoLabeledDirectories`] | no subdirectory name parses as a label |
    #[instrument(skip(normalizer), fields(root = %root.as_ref().display()))]
    pub fn from_root(root: impl AsRef<Path>, normalizer: Normalizer) -> Result<Self, IoError> {
        let root = root.as_ref();
        check_directory(root)?;

        let mut assembler = Self::new(normalizer);
        for entry in WalkDir::new(root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| IoError::Walk {
                path: root.to_path_buf(),
                source: e,
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            match name.parse::<Label>() {
                Ok(label) => {
                    debug!(dir = name, %label, "found labeled directory");
                    assembler.directories.push((entry.into_path(), label));
                }
                Err(_) => debug!(dir = name, "ignoring unlabeled directory"),
            }
        }

        if assembler.directories.is_empty() {
            return Err(IoError::NoLabeledDirectories {
                root: root.to_path_buf(),
            });
        }
        Ok(assembler)
    }

    /// Register a directory whose files all carry `label`.
    #[must_use]
    pub fn with_directory(mut self, path: impl Into<PathBuf>, label: Label) -> Self {
        self.directories.push((path.into(), label));
        self
    }

    /// Set how deep to descend into each directory. 1 means direct children.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Visit files in name order instead of filesystem order.
    #[must_use]
    pub fn with_sort_by_file_name(mut self, sort: bool) -> Self {
        self.sort_by_file_name = sort;
        self
    }

    /// Set the per-file failure policy.
    #[must_use]
    pub fn with_failure_policy(mut self, failure_policy: DecodeFailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    /// Registered `(directory, label)` pairs in registration order.
    #[must_use]
    pub fn directories(&self) -> &[(PathBuf, Label)] {
        &self.directories
    }

    /// Walk every registered directory and normalize its files.
    ///
    /// Samples are accumulated directory by directory, in registration order.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::DirectoryNotFound`] | a registered directory is missing or unreadable |
    /// | [`IoError::NotADirectory`] | a registered path is a file |
    /// | [`IoError::Normalize`] | a file failed under [`DecodeFailurePolicy::Abort`] |
    /// | [`IoError::Walk`] | an entry could not be traversed under [`DecodeFailurePolicy::Abort`] |
    #[instrument(skip(self), fields(n_dirs = self.directories.len(), policy = ?self.failure_policy))]
    pub fn assemble(&self) -> Result<Assembly, IoError> {
        let mut assembly = Assembly::default();
        for (dir, label) in &self.directories {
            self.assemble_directory(dir, *label, &mut assembly)?;
        }
        info!(
            n_samples = assembly.samples.len(),
            n_skipped = assembly.skipped.len(),
            "assembly complete"
        );
        Ok(assembly)
    }

    fn assemble_directory(
        &self,
        dir: &Path,
        label: Label,
        assembly: &mut Assembly,
    ) -> Result<(), IoError> {
        check_directory(dir)?;
        let before = assembly.samples.len();

        let mut walker = WalkDir::new(dir).min_depth(1).max_depth(self.max_depth);
        if self.sort_by_file_name {
            walker = walker.sort_by_file_name();
        }

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(dir).to_path_buf();
                    if self.failure_policy == DecodeFailurePolicy::Abort {
                        return Err(IoError::Walk { path, source: e });
                    }
                    self.skip(assembly, path, label, e.to_string());
                    continue;
                }
            };
            if !entry.file_type().is_file() || is_hidden(entry.file_name()) {
                continue;
            }

            let path = entry.into_path();
            match self.normalizer.normalize_path(&path) {
                Ok(features) => assembly.samples.push(Sample::new(features, label, path)),
                Err(e) if e.is_input_error() && self.failure_policy == DecodeFailurePolicy::Skip => {
                    let reason = error_chain(&e);
                    self.skip(assembly, path, label, reason);
                }
                Err(e) => return Err(IoError::Normalize { path, source: e }),
            }
        }

        info!(
            dir = %dir.display(),
            %label,
            n_samples = assembly.samples.len() - before,
            "directory assembled"
        );
        Ok(())
    }

    fn skip(&self, assembly: &mut Assembly, path: PathBuf, label: Label, reason: String) {
        warn!(path = %path.display(), %label, %reason, "skipping file");
        assembly.skipped.push(SkippedFile {
            path,
            label,
            reason,
        });
    }
}

fn check_directory(path: &Path) -> Result<(), IoError> {
    let meta = fs::metadata(path).map_err(|e| IoError::DirectoryNotFound {
        path: path.to_path_buf(),
        source: e,
    })?;
    if !meta.is_dir() {
        return Err(IoError::NotADirectory {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|s| s.starts_with('.'))
}
