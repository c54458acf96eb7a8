//! Normalization errors and a helper for rendering source chains.

use std::path::PathBuf;

/// Errors from image decoding and normalization.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    /// Returned when the image file cannot be opened or its format sniffed.
    #[error("cannot read image {path}")]
    Read {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the file is not a decodable image.
    #[error("cannot decode image {path}")]
    Decode {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying decoder error.
        source: image::ImageError,
    },

    /// Returned when a decoded image is not single-channel.
    #[error("image {path} has {got} channels, expected {expected}")]
    ChannelCount {
        /// Path of the offending image.
        path: PathBuf,
        /// Required channel count (always 1).
        expected: u8,
        /// Channel count of the decoded image.
        got: u8,
    },

    /// Returned when an image has zero width or height.
    #[error("image has zero extent ({width}x{height})")]
    EmptyImage {
        /// Source width in pixels.
        width: u32,
        /// Source height in pixels.
        height: u32,
    },

    /// Returned when a feature vector does not have the canonical length.
    #[error("feature vector has {got} values, expected {expected}")]
    FeatureLength {
        /// The canonical feature vector length.
        expected: usize,
        /// The length that was supplied.
        got: usize,
    },

    /// Returned when a string does not name a known label.
    #[error("unknown label \"{name}\" (expected normal or covid)")]
    UnknownLabel {
        /// The unrecognized name.
        name: String,
    },
}

impl ImageError {
    /// Return `true` for per-file input problems (unreadable, undecodable,
    /// wrong channel count, empty) as opposed to programming or
    /// configuration errors.
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ImageError::Read { .. }
                | ImageError::Decode { .. }
                | ImageError::ChannelCount { .. }
                | ImageError::EmptyImage { .. }
        )
    }
}

/// Render `err` and every error in its `source()` chain as one
/// `outer: inner: ...` line, for log fields and skip reasons.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_includes_sources() {
        let err = ImageError::Read {
            path: PathBuf::from("a.png"),
            source: std::io::Error::other("disk on fire"),
        };
        let chain = error_chain(&err);
        assert!(chain.starts_with("cannot read image a.png"), "{chain}");
        assert!(chain.ends_with(": disk on fire"), "{chain}");
    }
}
