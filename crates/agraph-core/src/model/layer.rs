//! Layer declarations.
//!
//! A layer is a plain declarative record: it names an annotation type and
//! states the hierarchy constraints its annotations are expected to satisfy.
//! Nothing here enforces those constraints; that is the validator's job.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::schema::ROOT_LAYER_ID;

/// Stable layer identifier.
pub type LayerId = String;

/// How annotations on a layer relate to the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Alignment {
    /// Tags: annotations share their parent's anchors and carry no timing of their own.
    None,
    /// Points: start and end anchors coincide.
    Instant,
    /// Spans with distinct start and end anchors.
    #[default]
    Interval,
}

/// Semantic value type of a layer's labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ValueType {
    #[default]
    String,
    Number,
    IpaPhonetic,
    Boolean,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::IpaPhonetic => "ipa",
            Self::Boolean => "boolean",
        }
    }
}

/// Declaration of one annotation layer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Layer {
    pub id: LayerId,
    pub description: String,
    pub alignment: Alignment,
    /// A parent may have more than one child on this layer.
    pub peers: bool,
    /// Sibling children may overlap in time.
    pub peers_overlap: bool,
    /// Children must exactly tile their parent's span.
    pub saturated: bool,
    /// Parent layer, or `None` for a top-level layer under the graph root.
    pub parent_id: Option<LayerId>,
    /// The parent's span must temporally include the child's span.
    pub parent_includes: bool,
    pub value_type: ValueType,
}

impl Layer {
    /// A top-level interval layer with permissive defaults.
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            alignment: Alignment::Interval,
            peers: true,
            peers_overlap: true,
            saturated: false,
            parent_id: None,
            parent_includes: true,
            value_type: ValueType::String,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_peers(mut self, peers: bool) -> Self {
        self.peers = peers;
        self
    }

    pub fn with_peers_overlap(mut self, peers_overlap: bool) -> Self {
        self.peers_overlap = peers_overlap;
        self
    }

    pub fn with_saturated(mut self, saturated: bool) -> Self {
        self.saturated = saturated;
        self
    }

    pub fn with_parent_includes(mut self, parent_includes: bool) -> Self {
        self.parent_includes = parent_includes;
        self
    }

    pub fn with_value_type(mut self, value_type: ValueType) -> Self {
        self.value_type = value_type;
        self
    }

    /// True when annotations on this layer carry their own timing.
    pub fn is_aligned(&self) -> bool {
        self.alignment != Alignment::None
    }

    /// True for top-level layers directly under the graph root.
    pub fn is_top_level(&self) -> bool {
        self.parent_id
            .as_deref()
            .map_or(true, |p| p == ROOT_LAYER_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_constraints() {
        let l = Layer::new("phone", "Phones")
            .with_parent("word")
            .with_peers_overlap(false)
            .with_saturated(true);
        assert_eq!(l.parent_id.as_deref(), Some("word"));
        assert!(!l.peers_overlap);
        assert!(l.saturated);
        assert!(l.is_aligned());
        assert!(!l.is_top_level());
    }

    #[test]
    fn tag_layers_are_not_aligned() {
        let l = Layer::new("pos", "Part of speech").with_alignment(Alignment::None);
        assert!(!l.is_aligned());
    }
}
