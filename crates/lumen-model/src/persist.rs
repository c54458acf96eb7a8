//! Model serialization and deserialization via bincode.

use std::path::Path;

use lumen_image::Label;
use tracing::{debug, info, instrument};

use crate::backend::Backend;
use crate::classifier::Classifier;
use crate::error::ModelError;
use crate::model::Model;

/// Current binary format version.
pub const FORMAT_VERSION: u32 = 1;

/// Versioned envelope, borrowed for writing.
///
/// Field order must match [`ModelEnvelope`]; `format_version` comes first so
/// it can be read on its own.
#[derive(serde::Serialize)]
struct ModelEnvelopeRef<'a> {
    format_version: u32,
    backend: Backend,
    n_features: usize,
    n_classes: usize,
    model: &'a Model,
}

/// Versioned envelope, owned for reading.
#[derive(serde::Deserialize)]
struct ModelEnvelope {
    format_version: u32,
    backend: Backend,
    n_features: usize,
    n_classes: usize,
    model: Model,
}

impl Model {
    /// Encode the model in a versioned envelope.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Encode`] if bincode encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ModelError> {
        let envelope = ModelEnvelopeRef {
            format_version: FORMAT_VERSION,
            backend: self.backend(),
            n_features: self.n_features(),
            n_classes: self.n_classes(),
            model: self,
        };
        bincode::serialize(&envelope).map_err(|e| ModelError::Encode {
            backend: self.backend(),
            source: e,
        })
    }

    /// Decode a model written by [`Model::to_bytes`].
    ///
    /// The format version is checked before the payload is decoded.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ModelError::Decode`] | bytes are not a model envelope |
    /// | [`ModelError::IncompatibleModelVersion`] | format version mismatch |
    /// | [`ModelError::CorruptModel`] | header disagrees with the payload, the class count is not two, or the payload cannot be evaluated safely |
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
        let found: u32 = bincode::deserialize(bytes).map_err(|e| ModelError::Decode { source: e })?;
        if found != FORMAT_VERSION {
            return Err(ModelError::IncompatibleModelVersion {
                expected: FORMAT_VERSION,
                found,
            });
        }

        let envelope: ModelEnvelope =
            bincode::deserialize(bytes).map_err(|e| ModelError::Decode { source: e })?;
        let model = envelope.model;

        if envelope.backend != model.backend() {
            return Err(ModelError::CorruptModel {
                reason: format!(
                    "header says {}, payload is {}",
                    envelope.backend,
                    model.backend()
                ),
            });
        }
        if envelope.n_features != model.n_features() {
            return Err(ModelError::CorruptModel {
                reason: format!(
                    "header says {} features, payload has {}",
                    envelope.n_features,
                    model.n_features()
                ),
            });
        }
        if envelope.n_classes != Label::COUNT || model.n_classes() != Label::COUNT {
            return Err(ModelError::CorruptModel {
                reason: format!(
                    "expected {} classes, header says {} and payload has {}",
                    Label::COUNT,
                    envelope.n_classes,
                    model.n_classes()
                ),
            });
        }

        let structure = match &model {
            Model::NeuralNetwork(network) => network.validate().map_err(|e| e.to_string()),
            Model::RandomForest(forest) => forest.validate().map_err(|e| e.to_string()),
        };
        if let Err(reason) = structure {
            return Err(ModelError::CorruptModel { reason });
        }

        debug!(
            format_version = envelope.format_version,
            backend = %envelope.backend,
            n_features = envelope.n_features,
            "model decoded"
        );
        Ok(model)
    }

    /// Save the model to a binary file.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ModelError::Encode`] | bincode encoding failed |
    /// | [`ModelError::WriteModel`] | file write failed |
    #[instrument(skip(self), fields(backend = %self.backend(), path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        std::fs::write(path, &bytes).map_err(|e| ModelError::WriteModel {
            path: path.to_path_buf(),
            source: e,
        })?;
        info!(size_bytes = bytes.len(), "model saved");
        Ok(())
    }

    /// Load a model from a binary file.
    ///
    /// # Errors
    ///
    /// [`ModelError::ReadModel`] if the file cannot be read, otherwise the
    /// errors of [`Model::from_bytes`].
    #[instrument(fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| ModelError::ReadModel {
            path: path.to_path_buf(),
            source: e,
        })?;
        let model = Self::from_bytes(&bytes)?;
        info!(backend = %model.backend(), size_bytes = bytes.len(), "model loaded");
        Ok(model)
    }

    /// Load a model and check it belongs to `expected`.
    ///
    /// # Errors
    ///
    /// [`ModelError::UnexpectedBackend`] on a backend mismatch, otherwise
    /// the errors of [`Model::load`].
    pub fn load_backend(path: impl AsRef<Path>, expected: Backend) -> Result<Self, ModelError> {
        let model = Self::load(path)?;
        if model.backend() != expected {
            return Err(ModelError::UnexpectedBackend {
                expected,
                found: model.backend(),
            });
        }
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use lumen_image::FeatureVector;
    use serde::Serialize;

    use super::*;
    use crate::model::BackendConfig;
    use crate::service::{InferenceService, ModelPaths};
    use crate::test_support::synthetic_dataset;

    // Same bincode layout as the real payload types, with every field open.
    #[derive(Serialize)]
    enum RawNode {
        Split {
            pixel: usize,
            threshold: u8,
            left: usize,
            right: usize,
            n_samples: usize,
        },
        #[allow(dead_code)]
        Leaf { distribution: Vec<f64>, n_samples: usize },
    }

    #[derive(Serialize)]
    struct RawTree {
        nodes: Vec<RawNode>,
        n_features: usize,
        n_classes: usize,
    }

    #[derive(Serialize)]
    struct RawForest {
        trees: Vec<RawTree>,
        n_features: usize,
        n_classes: usize,
    }

    #[derive(Serialize)]
    struct RawLayer {
        weights: Vec<f64>,
        biases: Vec<f64>,
        n_in: usize,
        n_out: usize,
    }

    #[derive(Serialize)]
    struct RawNetwork {
        layers: Vec<RawLayer>,
        n_features: usize,
        n_classes: usize,
    }

    #[derive(Serialize)]
    enum RawModel {
        NeuralNetwork(RawNetwork),
        RandomForest(RawForest),
    }

    #[derive(Serialize)]
    struct RawEnvelope {
        format_version: u32,
        backend: Backend,
        n_features: usize,
        n_classes: usize,
        model: RawModel,
    }

    fn envelope_bytes(backend: Backend, model: RawModel) -> Vec<u8> {
        bincode::serialize(&RawEnvelope {
            format_version: FORMAT_VERSION,
            backend,
            n_features: lumen_image::FEATURE_LEN,
            n_classes: Label::COUNT,
            model,
        })
        .unwrap()
    }

    /// A single split whose children lie outside the arena.
    fn dangling_forest_bytes() -> Vec<u8> {
        let tree = RawTree {
            nodes: vec![RawNode::Split {
                pixel: 0,
                threshold: 0,
                left: 7,
                right: 7,
                n_samples: 2,
            }],
            n_features: lumen_image::FEATURE_LEN,
            n_classes: Label::COUNT,
        };
        envelope_bytes(
            Backend::RandomForest,
            RawModel::RandomForest(RawForest {
                trees: vec![tree],
                n_features: lumen_image::FEATURE_LEN,
                n_classes: Label::COUNT,
            }),
        )
    }

    fn fitted_forest() -> Model {
        BackendConfig::RandomForest(lumen_rf::RandomForestConfig::new(5).unwrap().with_seed(1))
            .fit(&synthetic_dataset(4, 4))
            .unwrap()
    }

    #[test]
    fn version_is_checked_first() {
        let mut bytes = fitted_forest().to_bytes().unwrap();
        bytes[..4].copy_from_slice(&99u32.to_le_bytes());
        assert!(matches!(
            Model::from_bytes(&bytes),
            Err(ModelError::IncompatibleModelVersion { expected: 1, found: 99 })
        ));
    }

    #[test]
    fn truncated_bytes_rejected() {
        let bytes = fitted_forest().to_bytes().unwrap();
        assert!(matches!(
            Model::from_bytes(&bytes[..bytes.len() / 2]),
            Err(ModelError::Decode { .. })
        ));
    }

    #[test]
    fn header_backend_mismatch_is_corrupt() {
        let model = fitted_forest();
        let forged = ModelEnvelopeRef {
            format_version: FORMAT_VERSION,
            backend: Backend::NeuralNetwork,
            n_features: model.n_features(),
            n_classes: 2,
            model: &model,
        };
        let bytes = bincode::serialize(&forged).unwrap();
        assert!(matches!(
            Model::from_bytes(&bytes),
            Err(ModelError::CorruptModel { .. })
        ));
    }

    #[test]
    fn dangling_tree_children_are_corrupt() {
        assert!(matches!(
            Model::from_bytes(&dangling_forest_bytes()),
            Err(ModelError::CorruptModel { .. })
        ));
    }

    #[test]
    fn layerless_network_is_corrupt() {
        let bytes = envelope_bytes(
            Backend::NeuralNetwork,
            RawModel::NeuralNetwork(RawNetwork {
                layers: Vec::new(),
                n_features: lumen_image::FEATURE_LEN,
                n_classes: Label::COUNT,
            }),
        );
        assert!(matches!(
            Model::from_bytes(&bytes),
            Err(ModelError::CorruptModel { .. })
        ));
    }

    #[test]
    fn unchained_layers_are_corrupt() {
        let bytes = envelope_bytes(
            Backend::NeuralNetwork,
            RawModel::NeuralNetwork(RawNetwork {
                layers: vec![RawLayer {
                    weights: vec![0.0; 3],
                    biases: vec![0.0; 2],
                    n_in: 3,
                    n_out: 2,
                }],
                n_features: lumen_image::FEATURE_LEN,
                n_classes: Label::COUNT,
            }),
        );
        assert!(matches!(
            Model::from_bytes(&bytes),
            Err(ModelError::CorruptModel { .. })
        ));
    }

    #[test]
    fn service_reports_corrupt_forest_unavailable() {
        let dir = TempDir::new().unwrap();
        let paths = ModelPaths::in_dir(dir.path());
        std::fs::write(paths.get(Backend::RandomForest), dangling_forest_bytes()).unwrap();

        let service = InferenceService::start(&paths);
        assert!(!service.is_available(Backend::RandomForest));
        assert!(service.unavailable_reason(Backend::RandomForest).is_some());
        assert!(
            service
                .decide(&FeatureVector::filled(0), Backend::RandomForest)
                .is_err()
        );
    }

    #[test]
    fn load_backend_rejects_other_backend() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.bin");
        fitted_forest().save(&path).unwrap();
        assert!(matches!(
            Model::load_backend(&path, Backend::NeuralNetwork),
            Err(ModelError::UnexpectedBackend {
                expected: Backend::NeuralNetwork,
                found: Backend::RandomForest,
            })
        ));
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Model::load(dir.path().join("nope.model")),
            Err(ModelError::ReadModel { .. })
        ));
    }
}
