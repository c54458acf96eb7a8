//! Backend selector.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InferenceError;

/// Which classifier family a model belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// Multilayer perceptron.
    NeuralNetwork,
    /// Random forest.
    RandomForest,
}

impl Backend {
    /// Every backend, in report order.
    pub const ALL: [Backend; 2] = [Backend::NeuralNetwork, Backend::RandomForest];

    /// Canonical selector name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Backend::NeuralNetwork => "neural-network",
            Backend::RandomForest => "random-forest",
        }
    }

    /// Prefix used in the fixed-format report.
    #[must_use]
    pub fn short_name(self) -> &'static str {
        match self {
            Backend::NeuralNetwork => "ANN",
            Backend::RandomForest => "RF",
        }
    }

    /// File name of this backend's persisted model.
    #[must_use]
    pub fn model_file_name(self) -> &'static str {
        match self {
            Backend::NeuralNetwork => "neural-network.model",
            Backend::RandomForest => "random-forest.model",
        }
    }

    pub(crate) fn slot(self) -> usize {
        match self {
            Backend::NeuralNetwork => 0,
            Backend::RandomForest => 1,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = InferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "neural-network" | "neural_network" | "nn" | "ann" | "mlp" => {
                Ok(Backend::NeuralNetwork)
            }
            "random-forest" | "random_forest" | "rf" => Ok(Backend::RandomForest),
            _ => Err(InferenceError::UnsupportedBackend {
                name: s.to_string(),
            }),
        }
    }
}
