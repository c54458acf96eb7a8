//! Multilayer perceptron classification over 8-bit feature rows.
//!
//! Fully connected ReLU hidden layers with a softmax output, trained by
//! mini-batch Adam on an L2-penalized cross-entropy loss with loss-plateau
//! early stopping. Inputs are scaled from `[0, 255]` to `[0, 1]` before the
//! first layer. Training is single-threaded and deterministic for a fixed
//! seed.

mod config;
mod error;
mod layer;
mod network;
mod optimizer;
mod result;
mod train;

pub use config::MlpConfig;
pub use error::MlpError;
pub use layer::Layer;
pub use network::Mlp;
pub use result::MlpResult;
