//! Arena nodes of a fitted decision tree.

use std::fmt;

/// Column of a flattened feature row.
///
/// For a normalized scan this is a pixel offset in row-major order, so
/// [`Pixel::row_col`] recovers its position on the canvas.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct Pixel(usize);

impl Pixel {
    pub(crate) fn new(offset: usize) -> Self {
        Self(offset)
    }

    /// Offset into the feature row.
    #[must_use]
    pub fn offset(self) -> usize {
        self.0
    }

    /// `(row, column)` on a canvas `width` pixels wide.
    #[must_use]
    pub fn row_col(self, width: usize) -> (usize, usize) {
        (self.0 / width.max(1), self.0 % width.max(1))
    }
}

impl fmt::Display for Pixel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "px{}", self.0)
    }
}

/// One entry of a tree arena. Children are arena offsets, never pointers,
/// so a tree round-trips through bincode unchanged.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Node {
    /// Intensity test: rows with `row[pixel] <= threshold` descend left.
    Split {
        /// Tested column.
        pixel: Pixel,
        /// Highest intensity routed left.
        threshold: u8,
        /// Arena offset of the left child.
        left: usize,
        /// Arena offset of the right child.
        right: usize,
        /// Training rows that reached the test.
        n_samples: usize,
    },
    /// Terminal class distribution.
    Leaf {
        /// Class fractions, summing to 1.0.
        distribution: Vec<f64>,
        /// Training rows that ended here.
        n_samples: usize,
    },
}

impl Node {
    /// Training rows that reached this node.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        match self {
            Node::Split { n_samples, .. } | Node::Leaf { n_samples, .. } => *n_samples,
        }
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }
}
