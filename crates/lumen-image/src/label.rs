//! Diagnosis labels and their directory-name spellings.

use std::fmt;
use std::str::FromStr;

use crate::ImageError;

/// Binary diagnosis label.
///
/// The discriminant is the class index used by the classifiers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    /// No finding.
    Normal = 0,
    /// COVID-19 positive.
    Covid = 1,
}

impl Label {
    /// All labels in class-index order.
    pub const ALL: [Label; 2] = [Label::Normal, Label::Covid];

    /// Number of classes.
    pub const COUNT: usize = 2;

    /// Return the zero-based class index.
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Map a class index back to a label.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Human-readable name, matching the dataset directory convention.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Label::Normal => "Normal",
            Label::Covid => "COVID",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Label {
    type Err = ImageError;

    /// Parse a label from a directory or command-line name (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" | "0" => Ok(Label::Normal),
            "covid" | "covid-19" | "covid19" | "1" => Ok(Label::Covid),
            _ => Err(ImageError::UnknownLabel {
                name: s.to_string(),
            }),
        }
    }
}
