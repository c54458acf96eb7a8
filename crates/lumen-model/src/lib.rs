//! Backend adapter, model persistence, inference decisions, and evaluation
//! for the lumen pipeline.
//!
//! The two classifier backends (a multilayer perceptron and a random forest)
//! sit behind the [`Classifier`] trait and the tagged [`Model`] enum, so the
//! rest of the pipeline never branches on which one it holds.

mod backend;
mod classifier;
mod confusion;
mod error;
mod eval;
mod model;
mod persist;
mod service;

pub use backend::Backend;
pub use classifier::{Classifier, Probabilities};
pub use confusion::{ClassMetrics, ConfusionMatrix};
pub use error::{InferenceError, ModelError};
pub use eval::Evaluation;
pub use model::{BackendConfig, Model, TrainingSummary};
pub use persist::FORMAT_VERSION;
pub use service::{InferenceService, InferenceSession, ModelPaths, Prediction};
