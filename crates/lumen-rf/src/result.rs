//! What [`RandomForestConfig::fit`](crate::RandomForestConfig::fit) hands back.

use serde::Serialize;

use crate::forest::RandomForest;
use crate::oob::OobScore;

/// Shape of the data a forest was grown on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrainingMetadata {
    pub n_trees: usize,
    /// Columns per row (65,536 for a normalized scan).
    pub n_features: usize,
    pub n_classes: usize,
    /// Rows in the training set, before bootstrapping.
    pub n_samples: usize,
    /// Columns drawn as split candidates at every node.
    pub features_per_split: usize,
}

/// A fitted forest plus its optional out-of-bag estimate.
#[derive(Debug)]
pub struct RandomForestResult {
    forest: RandomForest,
    oob: Option<OobScore>,
    metadata: TrainingMetadata,
}

impl RandomForestResult {
    pub(crate) fn new(forest: RandomForest, oob: Option<OobScore>, metadata: TrainingMetadata) -> Self {
        Self { forest, oob, metadata }
    }

    #[must_use]
    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    #[must_use]
    pub fn into_forest(self) -> RandomForest {
        self.forest
    }

    /// Out-of-bag evaluation; `None` unless training ran with
    /// [`OobMode::Enabled`](crate::OobMode::Enabled).
    #[must_use]
    pub fn oob_score(&self) -> Option<&OobScore> {
        self.oob.as_ref()
    }

    /// Shorthand for `oob_score().map(|s| s.accuracy)`.
    #[must_use]
    pub fn oob_accuracy(&self) -> Option<f64> {
        self.oob.as_ref().map(|s| s.accuracy)
    }

    #[must_use]
    pub fn metadata(&self) -> &TrainingMetadata {
        &self.metadata
    }
}
