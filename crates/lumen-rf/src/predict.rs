//! Querying a fitted forest.

use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::error::RfError;
use crate::forest::RandomForest;
use crate::tree::DecisionTree;

/// Per-class share of the tree vote for one row.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDistribution {
    probs: Vec<f64>,
}

impl ClassDistribution {
    pub(crate) fn new(probs: Vec<f64>) -> Self {
        Self { probs }
    }

    /// Most probable class; a tie goes to the lower index.
    #[must_use]
    pub fn predicted_class(&self) -> usize {
        self.probs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1).then(b.0.cmp(&a.0)))
            .map_or(0, |(class, _)| class)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.probs
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<f64> {
        self.probs
    }
}

impl RandomForest {
    /// # Errors
    ///
    /// [`RfError::PredictionFeatureMismatch`] for a row of the wrong width.
    pub fn predict(&self, sample: &[u8]) -> Result<usize, RfError> {
        self.predict_proba(sample).map(|dist| dist.predicted_class())
    }

    /// Mean of the leaf distributions reached in every tree.
    ///
    /// # Errors
    ///
    /// [`RfError::PredictionFeatureMismatch`] for a row of the wrong width.
    pub fn predict_proba(&self, sample: &[u8]) -> Result<ClassDistribution, RfError> {
        if sample.len() != self.n_features {
            return Err(RfError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        let mut mean = vec![0.0f64; self.n_classes];
        for tree in &self.trees {
            let leaf = tree.leaf_distribution(sample)?;
            mean.iter_mut().zip(leaf).for_each(|(m, p)| *m += p);
        }
        let n_trees = self.trees.len().max(1) as f64;
        mean.iter_mut().for_each(|m| *m /= n_trees);
        Ok(ClassDistribution::new(mean))
    }

    /// Class of every row, scored on the rayon pool.
    ///
    /// # Errors
    ///
    /// The first [`RfError::PredictionFeatureMismatch`] encountered.
    pub fn predict_batch<R: AsRef<[u8]> + Sync>(&self, features: &[R]) -> Result<Vec<usize>, RfError> {
        features
            .into_par_iter()
            .map(|row| self.predict(row.as_ref()))
            .collect()
    }

    /// Width of the rows the forest was grown on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    #[must_use]
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }
}
