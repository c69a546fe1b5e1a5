//! Annotations: labeled spans or points on one layer.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::anchor::{AnchorId, Confidence};
use super::change::ChangeStatus;
use super::layer::LayerId;

/// Stable annotation identifier.
pub type AnnotationId = String;

/// A labeled interval (or point) bounded by two anchors.
///
/// Anchors and the parent are held by id; the owning graph resolves them.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Annotation {
    pub id: AnnotationId,
    pub layer_id: LayerId,
    pub label: String,
    pub start_id: AnchorId,
    pub end_id: AnchorId,
    /// Containing annotation, or `None` for annotations on top-level layers.
    pub parent_id: Option<AnnotationId>,
    /// 1-based position among same-layer siblings. Assigned by the graph.
    #[cfg_attr(feature = "serde", serde(default))]
    pub ordinal: u32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub confidence: Confidence,
    #[cfg_attr(feature = "serde", serde(default))]
    pub change: ChangeStatus,
}

impl Annotation {
    pub fn new(
        id: impl Into<String>,
        layer_id: impl Into<String>,
        label: impl Into<String>,
        start_id: impl Into<String>,
        end_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            layer_id: layer_id.into(),
            label: label.into(),
            start_id: start_id.into(),
            end_id: end_id.into(),
            parent_id: None,
            ordinal: 0,
            confidence: Confidence::Unknown,
            change: ChangeStatus::NoChange,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }

    /// Start and end share one anchor.
    pub fn is_instant(&self) -> bool {
        self.start_id == self.end_id
    }

    pub fn is_destroyed(&self) -> bool {
        self.change == ChangeStatus::Destroy
    }

    /// Uses `anchor_id` as either boundary.
    pub fn references(&self, anchor_id: &str) -> bool {
        self.start_id == anchor_id || self.end_id == anchor_id
    }
}
