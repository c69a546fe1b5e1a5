//! Anchors: shared points on the annotation timeline.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::change::ChangeStatus;

/// Stable anchor identifier.
pub type AnchorId = String;

/// How much an offset can be trusted.
///
/// Ordered: `Unknown < Default < Automatic < Manual`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Confidence {
    #[default]
    Unknown,
    /// Filled in by interpolation.
    Default,
    /// Set by an automatic process such as a forced aligner.
    Automatic,
    /// Set or checked by a person.
    Manual,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Default => "default",
            Self::Automatic => "automatic",
            Self::Manual => "manual",
        }
    }
}

/// A point in the coordinate space of a graph.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Anchor {
    pub id: AnchorId,
    /// `None` while the anchor is unresolved.
    pub offset: Option<f64>,
    pub confidence: Confidence,
    #[cfg_attr(feature = "serde", serde(default))]
    pub change: ChangeStatus,
}

impl Anchor {
    /// An anchor at a known offset.
    ///
    /// Offsets supplied without an explicit confidence are treated as
    /// manually set, so interpolation never overwrites them.
    pub fn at(id: impl Into<String>, offset: f64) -> Self {
        Self {
            id: id.into(),
            offset: Some(offset),
            confidence: Confidence::Manual,
            change: ChangeStatus::NoChange,
        }
    }

    /// An anchor whose offset is not yet known.
    pub fn unresolved(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            offset: None,
            confidence: Confidence::Unknown,
            change: ChangeStatus::NoChange,
        }
    }

    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn is_resolved(&self) -> bool {
        self.offset.is_some()
    }

    /// Offset is set and at least as trustworthy as `threshold`.
    pub fn is_bound(&self, threshold: Confidence) -> bool {
        self.offset.is_some() && self.confidence >= threshold
    }
}
