//! Domain types for lumen-io.

use std::path::{Path, PathBuf};

use lumen_image::{FeatureVector, Label};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, instrument};

use crate::IoError;

/// A validated experiment name for output file naming.
///
/// Must match `[a-zA-Z0-9_-]+`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentName(String);

impl ExperimentName {
    /// Parse and validate an experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidExperimentName`] if the name is empty or
    /// contains characters outside `[a-zA-Z0-9_-]`.
    pub fn new(name: String) -> Result<Self, IoError> {
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(IoError::InvalidExperimentName { name });
        }
        Ok(Self(name))
    }

    /// Return the experiment name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExperimentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One normalized image with its label and where it came from.
#[derive(Debug, Clone)]
pub struct Sample {
    features: FeatureVector,
    label: Label,
    source: PathBuf,
}

impl Sample {
    /// Create a sample.
    #[must_use]
    pub fn new(features: FeatureVector, label: Label, source: PathBuf) -> Self {
        Self {
            features,
            label,
            source,
        }
    }

    /// The normalized feature vector.
    #[must_use]
    pub fn features(&self) -> &FeatureVector {
        &self.features
    }

    /// The ground-truth label.
    #[must_use]
    pub fn label(&self) -> Label {
        self.label
    }

    /// The file the sample was decoded from.
    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }
}

/// An ordered collection of labeled feature vectors.
///
/// Produced by [`Assembly::into_dataset`](crate::Assembly::into_dataset) and
/// never empty.
#[derive(Debug, Clone)]
pub struct Dataset {
    samples: Vec<Sample>,
}

/// The two halves of a [`Dataset::train_test_split`].
#[derive(Debug, Clone)]
pub struct Split {
    /// Samples used for fitting.
    pub train: Dataset,
    /// Held-out samples used for evaluation.
    pub test: Dataset,
}

impl Dataset {
    /// Build a dataset from samples.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::EmptyDataset`] if `samples` is empty.
    pub fn from_samples(samples: Vec<Sample>) -> Result<Self, IoError> {
        if samples.is_empty() {
            return Err(IoError::EmptyDataset);
        }
        Ok(Self { samples })
    }

    /// Return the samples in order.
    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Return the number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Borrow every feature vector in order, ready to pass to a classifier.
    #[must_use]
    pub fn feature_rows(&self) -> Vec<&FeatureVector> {
        self.samples.iter().map(Sample::features).collect()
    }

    /// Labels in order.
    #[must_use]
    pub fn labels(&self) -> Vec<Label> {
        self.samples.iter().map(Sample::label).collect()
    }

    /// Class indices in order.
    #[must_use]
    pub fn label_indices(&self) -> Vec<usize> {
        self.samples.iter().map(|s| s.label.index()).collect()
    }

    /// Number of samples carrying `label`.
    #[must_use]
    pub fn label_count(&self, label: Label) -> usize {
        self.samples.iter().filter(|s| s.label == label).count()
    }

    /// `(label, count)` for every label, in class-index order.
    #[must_use]
    pub fn label_counts(&self) -> Vec<(Label, usize)> {
        Label::ALL
            .iter()
            .map(|&label| (label, self.label_count(label)))
            .collect()
    }

    /// Shuffle with a seeded ChaCha8 RNG and hold out `ceil(n * test_fraction)`
    /// samples.
    ///
    /// The same seed and input order always give the same split.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::InvalidTestFraction`] | fraction not finite or outside (0, 1) |
    /// | [`IoError::InvalidSplit`] | either side would be empty |
    #[instrument(skip(self), fields(n_samples = self.samples.len()))]
    pub fn train_test_split(self, test_fraction: f64, seed: u64) -> Result<Split, IoError> {
        if !test_fraction.is_finite() || test_fraction <= 0.0 || test_fraction >= 1.0 {
            return Err(IoError::InvalidTestFraction {
                fraction: test_fraction,
            });
        }
        let n_samples = self.samples.len();
        let n_test = (n_samples as f64 * test_fraction).ceil() as usize;
        if n_test == 0 || n_test >= n_samples {
            return Err(IoError::InvalidSplit { n_samples, n_test });
        }

        let mut order: Vec<usize> = (0..n_samples).collect();
        order.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));

        let mut slots: Vec<Option<Sample>> = self.samples.into_iter().map(Some).collect();
        let test: Vec<Sample> = order[..n_test]
            .iter()
            .filter_map(|&i| slots[i].take())
            .collect();
        let train: Vec<Sample> = order[n_test..]
            .iter()
            .filter_map(|&i| slots[i].take())
            .collect();

        debug!(n_train = train.len(), n_test = test.len(), "split dataset");
        Ok(Split {
            train: Dataset { samples: train },
            test: Dataset { samples: test },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(n_normal: usize, n_covid: usize) -> Dataset {
        let samples = (0..n_normal + n_covid)
            .map(|i| {
                let label = if i < n_normal { Label::Normal } else { Label::Covid };
                Sample::new(
                    FeatureVector::filled(i as u8),
                    label,
                    PathBuf::from(format!("img_{i}.png")),
                )
            })
            .collect();
        Dataset::from_samples(samples).unwrap()
    }

    #[test]
    fn experiment_name_valid() {
        let name = ExperimentName::new("my-experiment_01".to_string());
        assert!(name.is_ok());
        assert_eq!(name.unwrap().as_str(), "my-experiment_01");
    }

    #[test]
    fn experiment_name_rejects_empty() {
        let name = ExperimentName::new(String::new());
        assert!(matches!(name, Err(IoError::InvalidExperimentName { .. })));
    }

    #[test]
    fn experiment_name_rejects_special_chars() {
        let name = ExperimentName::new("my experiment!".to_string());
        assert!(matches!(name, Err(IoError::InvalidExperimentName { .. })));
    }

    #[test]
    fn empty_samples_rejected() {
        assert!(matches!(
            Dataset::from_samples(Vec::new()),
            Err(IoError::EmptyDataset)
        ));
    }

    #[test]
    fn label_counts_in_class_order() {
        let ds = dataset(3, 2);
        assert_eq!(ds.label_counts(), vec![(Label::Normal, 3), (Label::Covid, 2)]);
        assert_eq!(ds.label_indices(), vec![0, 0, 0, 1, 1]);
    }

    #[test]
    fn split_sizes_use_ceiling() {
        let split = dataset(6, 5).train_test_split(0.2, 1).unwrap();
        assert_eq!(split.test.len(), 3);
        assert_eq!(split.train.len(), 8);
    }

    #[test]
    fn split_is_a_partition() {
        let split = dataset(10, 10).train_test_split(0.2, 1).unwrap();
        let mut seen: Vec<u8> = split
            .train
            .samples()
            .iter()
            .chain(split.test.samples())
            .map(|s| s.features().as_slice()[0])
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..20).collect::<Vec<u8>>());
    }

    #[test]
    fn split_is_seed_deterministic() {
        let sources = |split: &Split| -> Vec<PathBuf> {
            split.test.samples().iter().map(|s| s.source().to_path_buf()).collect()
        };
        let a = dataset(10, 10).train_test_split(0.3, 7).unwrap();
        let b = dataset(10, 10).train_test_split(0.3, 7).unwrap();
        let c = dataset(10, 10).train_test_split(0.3, 8).unwrap();
        assert_eq!(sources(&a), sources(&b));
        assert_ne!(sources(&a), sources(&c));
    }

    #[test]
    fn split_rejects_bad_fraction() {
        for fraction in [0.0, 1.0, -0.1, f64::NAN] {
            assert!(matches!(
                dataset(3, 3).train_test_split(fraction, 1),
                Err(IoError::InvalidTestFraction { .. })
            ));
        }
    }

    #[test]
    fn split_rejects_single_sample() {
        let err = dataset(1, 0).train_test_split(0.2, 1).unwrap_err();
        assert!(matches!(
            err,
            IoError::InvalidSplit { n_samples: 1, n_test: 1 }
        ));
    }
}
