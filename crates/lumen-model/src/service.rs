//! Inference decisions over loaded models.

use std::fmt;
use std::path::{Path, PathBuf};

use lumen_image::{FeatureVector, Label, Normalizer, error_chain};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::backend::Backend;
use crate::classifier::{Classifier, Probabilities};
use crate::error::{InferenceError, ModelError};
use crate::model::Model;

/// Where each backend's model file lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    /// Neural-network model file.
    pub neural_network: PathBuf,
    /// Random-forest model file.
    pub random_forest: PathBuf,
}

impl ModelPaths {
    /// The fixed per-backend file names inside `dir`.
    #[must_use]
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            neural_network: dir.join(Backend::NeuralNetwork.model_file_name()),
            random_forest: dir.join(Backend::RandomForest.model_file_name()),
        }
    }

    /// Path for one backend.
    #[must_use]
    pub fn get(&self, backend: Backend) -> &Path {
        match backend {
            Backend::NeuralNetwork => &self.neural_network,
            Backend::RandomForest => &self.random_forest,
        }
    }
}

/// A classification decision.
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    /// Most probable label.
    pub label: Label,
    /// Probability of `label`, as a percentage in `[50, 100]`.
    pub confidence: f64,
    /// Full probability per label.
    pub probabilities: Probabilities,
    /// Backend that decided.
    pub backend: Backend,
}

impl Prediction {
    fn from_probabilities(probabilities: Probabilities, backend: Backend) -> Self {
        Self {
            label: probabilities.argmax(),
            confidence: 100.0 * probabilities.max(),
            probabilities,
            backend,
        }
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:.2}% confidence, {})",
            self.label, self.confidence, self.backend
        )
    }
}

#[derive(Debug)]
enum Slot {
    Loaded(Model),
    Unavailable(String),
}

/// Holds at most one loaded model per backend and turns feature vectors
/// into [`Prediction`]s.
///
/// Loaded models are immutable; [`InferenceService::install`] takes
/// `&mut self`, so no decision can observe a half-replaced model.
#[derive(Debug)]
pub struct InferenceService {
    slots: [Slot; 2],
}

impl InferenceService {
    /// A service with no model loaded.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            slots: [
                Slot::Unavailable("not loaded".to_string()),
                Slot::Unavailable("not loaded".to_string()),
            ],
        }
    }

    /// Load both backends from `paths`.
    ///
    /// A backend whose file is missing or invalid is recorded as unavailable
    /// with the reason; startup itself never fails.
    #[instrument(skip_all)]
    pub fn start(paths: &ModelPaths) -> Self {
        let mut service = Self::empty();
        for backend in Backend::ALL {
            let path = paths.get(backend);
            service.slots[backend.slot()] = match Model::load_backend(path, backend) {
                Ok(model) => {
                    info!(%backend, path = %path.display(), "model available");
                    Slot::Loaded(model)
                }
                Err(e) => {
                    let reason = error_chain(&e);
                    warn!(%backend, path = %path.display(), %reason, "model unavailable");
                    Slot::Unavailable(reason)
                }
            };
        }
        service
    }

    /// Replace the model for `backend`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnexpectedBackend`] if `model` belongs to the
    /// other backend.
    pub fn install(&mut self, backend: Backend, model: Model) -> Result<(), ModelError> {
        if model.backend() != backend {
            return Err(ModelError::UnexpectedBackend {
                expected: backend,
                found: model.backend(),
            });
        }
        debug!(%backend, "model installed");
        self.slots[backend.slot()] = Slot::Loaded(model);
        Ok(())
    }

    /// `true` if `backend` has a loaded model.
    #[must_use]
    pub fn is_available(&self, backend: Backend) -> bool {
        matches!(self.slots[backend.slot()], Slot::Loaded(_))
    }

    /// Why `backend` is unavailable, if it is.
    #[must_use]
    pub fn unavailable_reason(&self, backend: Backend) -> Option<&str> {
        match &self.slots[backend.slot()] {
            Slot::Loaded(_) => None,
            Slot::Unavailable(reason) => Some(reason),
        }
    }

    /// The loaded model for `backend`.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::ModelUnavailable`] if it is not loaded.
    pub fn model(&self, backend: Backend) -> Result<&Model, InferenceError> {
        match &self.slots[backend.slot()] {
            Slot::Loaded(model) => Ok(model),
            Slot::Unavailable(reason) => Err(InferenceError::ModelUnavailable {
                backend,
                reason: reason.clone(),
            }),
        }
    }

    /// Classify one feature vector with `backend`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`InferenceError::ModelUnavailable`] | `backend` has no loaded model |
    /// | [`InferenceError::Model`] | the model rejected the input |
    pub fn decide(&self, features: &FeatureVector, backend: Backend) -> Result<Prediction, InferenceError> {
        let model = self.model(backend)?;
        let probabilities = model
            .predict_probabilities(features)
            .map_err(|e| InferenceError::Model { backend, source: e })?;
        let prediction = Prediction::from_probabilities(probabilities, backend);
        debug!(%backend, label = %prediction.label, confidence = prediction.confidence, "decided");
        Ok(prediction)
    }
}

/// The operator flow: load an image, then classify it with a chosen backend.
#[derive(Debug)]
pub struct InferenceSession {
    service: InferenceService,
    normalizer: Normalizer,
    current: Option<FeatureVector>,
}

impl InferenceSession {
    /// Start a session with no image loaded.
    #[must_use]
    pub fn new(service: InferenceService, normalizer: Normalizer) -> Self {
        Self {
            service,
            normalizer,
            current: None,
        }
    }

    /// Normalize the image at `path` and make it the current input.
    ///
    /// On failure the previous input is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::Image`] if the file cannot be normalized.
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn load_image(&mut self, path: impl AsRef<Path>) -> Result<(), InferenceError> {
        self.current = None;
        self.current = Some(self.normalizer.normalize_path(path)?);
        Ok(())
    }

    /// Make an already-normalized vector the current input.
    pub fn set_input(&mut self, features: FeatureVector) {
        self.current = Some(features);
    }

    /// The current input, if any.
    #[must_use]
    pub fn input(&self) -> Option<&FeatureVector> {
        self.current.as_ref()
    }

    /// Classify the current input with `backend`.
    ///
    /// # Errors
    ///
    /// [`InferenceError::NoInput`] if no image has been loaded, otherwise
    /// the errors of [`InferenceService::decide`].
    pub fn classify(&self, backend: Backend) -> Result<Prediction, InferenceError> {
        let features = self.current.as_ref().ok_or(InferenceError::NoInput)?;
        self.service.decide(features, backend)
    }

    /// The underlying service.
    #[must_use]
    pub fn service(&self) -> &InferenceService {
        &self.service
    }

    /// Mutable access for installing models.
    pub fn service_mut(&mut self) -> &mut InferenceService {
        &mut self.service
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::scan;

    #[test]
    fn empty_service_reports_unavailable() {
        let service = InferenceService::empty();
        let err = service
            .decide(&FeatureVector::filled(0), Backend::RandomForest)
            .unwrap_err();
        assert!(matches!(
            err,
            InferenceError::ModelUnavailable { backend: Backend::RandomForest, .. }
        ));
        assert_eq!(service.unavailable_reason(Backend::NeuralNetwork), Some("not loaded"));
    }

    #[test]
    fn start_without_files_records_reasons() {
        let dir = tempfile::TempDir::new().unwrap();
        let service = InferenceService::start(&ModelPaths::in_dir(dir.path()));
        for backend in Backend::ALL {
            assert!(!service.is_available(backend));
            let reason = service.unavailable_reason(backend).unwrap();
            assert!(reason.contains("cannot read model"), "{reason}");
        }
    }

    #[test]
    fn classify_before_load_is_no_input() {
        let session = InferenceSession::new(InferenceService::empty(), Normalizer::new());
        assert!(matches!(
            session.classify(Backend::NeuralNetwork),
            Err(InferenceError::NoInput)
        ));
    }

    #[test]
    fn failed_load_clears_previous_input() {
        let mut session = InferenceSession::new(InferenceService::empty(), Normalizer::new());
        session.set_input(scan(Label::Normal, 0));
        let err = session.load_image("/definitely/not/here.png").unwrap_err();
        assert!(matches!(err, InferenceError::Image { .. }));
        assert!(session.input().is_none());
    }

    #[test]
    fn model_paths_use_fixed_names() {
        let paths = ModelPaths::in_dir("/models");
        assert_eq!(paths.get(Backend::NeuralNetwork), Path::new("/models/neural-network.model"));
        assert_eq!(paths.get(Backend::RandomForest), Path::new("/models/random-forest.model"));
    }

    #[test]
    fn confidence_is_percentage_of_max() {
        let p = Probabilities::from_slice(&[0.3, 0.7]).unwrap();
        let prediction = Prediction::from_probabilities(p, Backend::RandomForest);
        assert_eq!(prediction.label, Label::Covid);
        assert!((prediction.confidence - 70.0).abs() < 1e-9);
    }
}
