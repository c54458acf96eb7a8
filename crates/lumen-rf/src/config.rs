//! Hyperparameters for growing a forest over image rows.

use std::str::FromStr;

use crate::error::RfError;
use crate::result::RandomForestResult;
use crate::split::{SplitCriterion, SplitMethod};

/// Trees grown when no count is given.
pub const DEFAULT_TREES: usize = 100;

/// How many columns a node draws as split candidates.
///
/// Parses from `sqrt`, `log2`, `all`, a fraction such as `0.05`, or a
/// whole count such as `512`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaxFeatures {
    /// `ceil(sqrt(n))`: 256 candidates for a 256×256 scan.
    Sqrt,
    /// `ceil(log2(n))`, at least 1.
    Log2,
    /// `ceil(n * f)` for `f` in (0.0, 1.0].
    Fraction(f64),
    Fixed(usize),
    /// Every column; plain bagging.
    All,
}

impl MaxFeatures {
    /// Concrete candidate count for rows of `n_features` columns.
    ///
    /// # Errors
    ///
    /// [`RfError::InvalidMaxFeatures`] when the count lands outside
    /// `[1, n_features]`.
    pub fn resolve(self, n_features: usize) -> Result<usize, RfError> {
        let n = n_features as f64;
        let resolved = match self {
            MaxFeatures::Sqrt => n.sqrt().ceil() as usize,
            MaxFeatures::Log2 => n.log2().ceil().max(1.0) as usize,
            MaxFeatures::Fraction(f) => (n * f).ceil() as usize,
            MaxFeatures::Fixed(count) => count,
            MaxFeatures::All => n_features,
        };
        if (1..=n_features).contains(&resolved) {
            Ok(resolved)
        } else {
            Err(RfError::InvalidMaxFeatures {
                max_features: resolved,
                n_features,
            })
        }
    }
}

impl FromStr for MaxFeatures {
    type Err = RfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || RfError::UnknownMaxFeatures {
            value: s.to_owned(),
        };
        match s.trim().to_ascii_lowercase().as_str() {
            "sqrt" => Ok(MaxFeatures::Sqrt),
            "log2" => Ok(MaxFeatures::Log2),
            "all" => Ok(MaxFeatures::All),
            other if other.contains('.') => other
                .parse::<f64>()
                .map(MaxFeatures::Fraction)
                .map_err(|_| unknown()),
            other => other.parse::<usize>().map(MaxFeatures::Fixed).map_err(|_| unknown()),
        }
    }
}

/// Whether each sample is re-scored by the trees that never drew it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OobMode {
    Enabled,
    #[default]
    Disabled,
}

impl From<bool> for OobMode {
    fn from(enabled: bool) -> Self {
        if enabled { OobMode::Enabled } else { OobMode::Disabled }
    }
}

/// Random forest hyperparameters.
///
/// `RandomForestConfig::new(n_trees)?` then `with_*` builders; every
/// setting is checked again when [`fit`](Self::fit) sees the data.
///
/// | Setting              | Default     |
/// |----------------------|-------------|
/// | `n_trees`            | 100         |
/// | `max_features`       | `Sqrt`      |
/// | `max_depth`          | unlimited   |
/// | `min_samples_split`  | 2           |
/// | `min_samples_leaf`   | 1           |
/// | `criterion`          | `Gini`      |
/// | `split_method`       | `Exact`     |
/// | `bootstrap_fraction` | 1.0         |
/// | `oob_mode`           | `Disabled`  |
/// | `seed`               | 42          |
#[derive(Debug, Clone)]
pub struct RandomForestConfig {
    pub(crate) n_trees: usize,
    pub(crate) max_features: MaxFeatures,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
    pub(crate) min_samples_leaf: usize,
    pub(crate) criterion: SplitCriterion,
    pub(crate) split_method: SplitMethod,
    pub(crate) bootstrap_fraction: f64,
    pub(crate) oob_mode: OobMode,
    pub(crate) seed: u64,
}

impl Default for RandomForestConfig {
    fn default() -> Self {
        Self {
            n_trees: DEFAULT_TREES,
            max_features: MaxFeatures::Sqrt,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            criterion: SplitCriterion::Gini,
            split_method: SplitMethod::Exact,
            bootstrap_fraction: 1.0,
            oob_mode: OobMode::Disabled,
            seed: 42,
        }
    }
}

impl RandomForestConfig {
    /// # Errors
    ///
    /// [`RfError::InvalidTreeCount`] when `n_trees` is zero.
    pub fn new(n_trees: usize) -> Result<Self, RfError> {
        if n_trees == 0 {
            return Err(RfError::InvalidTreeCount { n_trees });
        }
        Ok(Self {
            n_trees,
            ..Self::default()
        })
    }

    #[must_use]
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// `None` grows every tree until its leaves are pure or too small.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    #[must_use]
    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    #[must_use]
    pub fn with_split_method(mut self, split_method: SplitMethod) -> Self {
        self.split_method = split_method;
        self
    }

    /// Share of the training rows each tree draws (with replacement).
    #[must_use]
    pub fn with_bootstrap_fraction(mut self, bootstrap_fraction: f64) -> Self {
        self.bootstrap_fraction = bootstrap_fraction;
        self
    }

    #[must_use]
    pub fn with_oob_mode(mut self, oob_mode: OobMode) -> Self {
        self.oob_mode = oob_mode;
        self
    }

    /// Master seed; per-tree seeds are drawn from it, so results do not
    /// depend on the rayon pool size.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    #[must_use]
    pub fn oob_mode(&self) -> OobMode {
        self.oob_mode
    }

    /// Check the settings that do not depend on the data.
    pub(crate) fn validate(&self) -> Result<(), RfError> {
        if self.max_depth == Some(0) {
            return Err(RfError::InvalidMaxDepth { max_depth: 0 });
        }
        if self.min_samples_split < 2 {
            return Err(RfError::InvalidMinSamplesSplit {
                min_samples_split: self.min_samples_split,
            });
        }
        if self.min_samples_leaf == 0 {
            return Err(RfError::InvalidMinSamplesLeaf { min_samples_leaf: 0 });
        }
        if !(self.bootstrap_fraction > 0.0 && self.bootstrap_fraction <= 1.0) {
            return Err(RfError::InvalidBootstrapFraction {
                fraction: self.bootstrap_fraction,
            });
        }
        Ok(())
    }

    /// Grow the forest on `features` (one `u8` row per sample) with class
    /// indices `labels`. `n_classes` is passed rather than inferred so a
    /// split that happens to miss a class still yields full-width
    /// distributions.
    ///
    /// # Errors
    ///
    /// | Variant                               | When                                          |
    /// |---------------------------------------|-----------------------------------------------|
    /// | [`RfError::InvalidClassCount`]        | `n_classes` is zero                           |
    /// | [`RfError::EmptyDataset`]             | no rows                                       |
    /// | [`RfError::ZeroFeatures`]             | rows are empty                                |
    /// | [`RfError::FeatureCountMismatch`]     | rows differ in length                         |
    /// | [`RfError::LabelCountMismatch`]       | `labels.len() != features.len()`              |
    /// | [`RfError::LabelOutOfRange`]          | a label `>= n_classes`                        |
    /// | [`RfError::InvalidMaxDepth`]          | `max_depth` is `Some(0)`                      |
    /// | [`RfError::InvalidMinSamplesSplit`]   | `min_samples_split < 2`                       |
    /// | [`RfError::InvalidMinSamplesLeaf`]    | `min_samples_leaf` is zero                    |
    /// | [`RfError::InvalidMaxFeatures`]       | candidate count outside `[1, n_features]`     |
    /// | [`RfError::InvalidBootstrapFraction`] | fraction outside (0.0, 1.0]                   |
    /// | [`RfError::OobEvaluationFailed`]      | OOB requested but every row was drawn by all  |
    pub fn fit<R: AsRef<[u8]> + Sync>(
        &self,
        features: &[R],
        labels: &[usize],
        n_classes: usize,
    ) -> Result<RandomForestResult, RfError> {
        crate::forest::train(self, features, labels, n_classes)
    }
}
