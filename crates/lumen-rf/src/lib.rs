//! Random Forest classification over 8-bit feature rows.
//!
//! Provides a hand-rolled Random Forest classifier with CART decision trees,
//! Gini/Entropy split criteria, exact per-intensity split search, parallel
//! training via rayon, and out-of-bag evaluation. Rows are any
//! `AsRef<[u8]>`, so callers pass their own feature vector type without
//! copying.

mod config;
mod error;
mod forest;
mod node;
mod oob;
mod predict;
mod result;
mod split;
mod tree;

pub use config::{DEFAULT_TREES, MaxFeatures, OobMode, RandomForestConfig};
pub use error::RfError;
pub use forest::RandomForest;
pub use node::{Node, Pixel};
pub use oob::OobScore;
pub use predict::ClassDistribution;
pub use result::{RandomForestResult, TrainingMetadata};
pub use split::{SplitCriterion, SplitMethod};
pub use tree::DecisionTree;
