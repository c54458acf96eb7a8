/// Everything that can go wrong while growing or querying a forest.
#[derive(Debug, thiserror::Error)]
pub enum RfError {
    #[error("a forest needs at least one tree, got {n_trees}")]
    InvalidTreeCount {
        /// Requested tree count.
        n_trees: usize,
    },

    /// `max_depth` of zero would leave only a root leaf.
    #[error("max_depth must be at least 1, got {max_depth}")]
    InvalidMaxDepth {
        /// Requested depth.
        max_depth: usize,
    },

    #[error("min_samples_split must be at least 2, got {min_samples_split}")]
    InvalidMinSamplesSplit {
        /// Requested minimum.
        min_samples_split: usize,
    },

    #[error("min_samples_leaf must be at least 1, got {min_samples_leaf}")]
    InvalidMinSamplesLeaf {
        /// Requested minimum.
        min_samples_leaf: usize,
    },

    /// The candidate-column count resolved outside `[1, n_features]`.
    #[error("{max_features} split candidates requested for rows of {n_features} pixels")]
    InvalidMaxFeatures {
        /// Resolved candidate count.
        max_features: usize,
        /// Row width.
        n_features: usize,
    },

    #[error("unknown max_features \"{value}\" (expected sqrt, log2, all, a fraction, or a count)")]
    UnknownMaxFeatures {
        /// Unparsed input.
        value: String,
    },

    #[error("bootstrap_fraction must be in (0.0, 1.0], got {fraction}")]
    InvalidBootstrapFraction {
        /// Requested fraction.
        fraction: f64,
    },

    #[error("n_classes must be at least 1, got {n_classes}")]
    InvalidClassCount {
        /// Requested class count.
        n_classes: usize,
    },

    #[error("no training rows")]
    EmptyDataset,

    #[error("training rows are empty")]
    ZeroFeatures,

    /// Rows of one training set must share a width.
    #[error("row {sample_index} has {got} pixels, row 0 has {expected}")]
    FeatureCountMismatch {
        /// Width of row 0.
        expected: usize,
        /// Width of the offending row.
        got: usize,
        /// Offending row.
        sample_index: usize,
    },

    #[error("{n_features_rows} rows but {n_labels} labels")]
    LabelCountMismatch {
        /// Row count.
        n_features_rows: usize,
        /// Label count.
        n_labels: usize,
    },

    #[error("row {sample_index} is labeled {label}, outside 0..{n_classes}")]
    LabelOutOfRange {
        /// Offending row.
        sample_index: usize,
        /// Its label.
        label: usize,
        /// Class count the forest was asked for.
        n_classes: usize,
    },

    /// A query row does not match the width the forest was grown on.
    #[error("input has {got} pixels, forest expects {expected}")]
    PredictionFeatureMismatch {
        /// Training row width.
        expected: usize,
        /// Query row width.
        got: usize,
    },

    /// A decoded forest whose arena cannot be walked safely.
    #[error("malformed tree {tree}: {reason}")]
    MalformedTree {
        /// Position of the tree in the forest.
        tree: usize,
        /// First structural problem found.
        reason: String,
    },

    #[error("out-of-bag evaluation failed: {reason}")]
    OobEvaluationFailed {
        /// What was missing.
        reason: String,
    },
}

/// Check a training set and return its row width.
///
/// Order matters for error reporting: class count, emptiness, label count,
/// width, then labels.
pub(crate) fn validate_training_data<R: AsRef<[u8]>>(
    features: &[R],
    labels: &[usize],
    n_classes: usize,
) -> Result<usize, RfError> {
    if n_classes == 0 {
        return Err(RfError::InvalidClassCount { n_classes });
    }
    let Some(first) = features.first() else {
        return Err(RfError::EmptyDataset);
    };
    if features.len() != labels.len() {
        return Err(RfError::LabelCountMismatch {
            n_features_rows: features.len(),
            n_labels: labels.len(),
        });
    }
    let width = first.as_ref().len();
    if width == 0 {
        return Err(RfError::ZeroFeatures);
    }
    if let Some((sample_index, row)) = features
        .iter()
        .enumerate()
        .find(|(_, row)| row.as_ref().len() != width)
    {
        return Err(RfError::FeatureCountMismatch {
            expected: width,
            got: row.as_ref().len(),
            sample_index,
        });
    }
    if let Some((sample_index, &label)) = labels.iter().enumerate().find(|(_, l)| **l >= n_classes) {
        return Err(RfError::LabelOutOfRange {
            sample_index,
            label,
            n_classes,
        });
    }
    Ok(width)
}
