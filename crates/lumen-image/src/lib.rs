//! Image normalization for the lumen pipeline.
//!
//! Decodes single-channel X-ray images, resizes them onto a fixed 256×256
//! canvas with cubic interpolation, and flattens the result into a
//! [`FeatureVector`] of exactly [`FEATURE_LEN`] 8-bit intensities.

mod error;
mod feature;
mod label;
mod normalize;

pub use error::{ImageError, error_chain};
pub use feature::{FEATURE_LEN, FeatureVector};
pub use label::Label;
pub use normalize::{CANVAS_SIZE, ChannelPolicy, Normalizer};
