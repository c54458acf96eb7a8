//! Fixed-length feature vector type.

use crate::ImageError;
use crate::normalize::CANVAS_SIZE;

/// Number of values in every feature vector (256 × 256).
pub const FEATURE_LEN: usize = (CANVAS_SIZE as usize) * (CANVAS_SIZE as usize);

/// A flattened, row-major 256×256 grid of 8-bit intensities.
///
/// The length is always exactly [`FEATURE_LEN`]; construction rejects
/// anything else.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeatureVector(Vec<u8>);

impl FeatureVector {
    /// Wrap raw intensities.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::FeatureLength`] if `values.len() != FEATURE_LEN`.
    pub fn new(values: Vec<u8>) -> Result<Self, ImageError> {
        if values.len() != FEATURE_LEN {
            return Err(ImageError::FeatureLength {
                expected: FEATURE_LEN,
                got: values.len(),
            });
        }
        Ok(Self(values))
    }

    /// A vector of the given constant intensity.
    #[must_use]
    pub fn filled(value: u8) -> Self {
        Self(vec![value; FEATURE_LEN])
    }

    /// Return the intensities as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Return the number of values (always [`FEATURE_LEN`]).
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Mean intensity in [0, 255].
    #[must_use]
    pub fn mean(&self) -> f64 {
        let sum: u64 = self.0.iter().map(|&v| u64::from(v)).sum();
        sum as f64 / self.0.len() as f64
    }

    /// Consume the vector and return the raw intensities.
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for FeatureVector {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
