//! Configuration structures for agraph-core.
//!
//! This module defines explicit configuration objects for the graph,
//! the validator, the default offset generator and the edit path engine.
//!
//! The core crate itself does not read environment variables or files. All
//! configuration must be provided explicitly by the caller.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::{AgError, AgResult};
use crate::model::Confidence;

/// Global configuration container.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CoreConfig {
    pub graph: GraphConfig,
    pub offsets: OffsetConfig,
    pub validation: ValidationConfig,
    pub edit_path: EditPathConfig,
}

/// Graph-level behavior.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GraphConfig {
    /// Offsets closer than this are the same point for anchor reuse.
    pub anchor_epsilon: f64,
    /// Prefix for generated ids.
    pub id_prefix: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            anchor_epsilon: 1e-6,
            id_prefix: String::new(),
        }
    }
}

/// Default offset generator behavior.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct OffsetConfig {
    /// Anchors at or above this confidence are never moved.
    pub bound_confidence: Confidence,
    /// Confidence stamped on interpolated offsets.
    pub generated_confidence: Confidence,
}

impl Default for OffsetConfig {
    fn default() -> Self {
        Self {
            bound_confidence: Confidence::Default,
            generated_confidence: Confidence::Default,
        }
    }
}

/// Validator behavior.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ValidationConfig {
    /// Labels longer than this (in chars) are reported.
    pub max_label_length: Option<usize>,
    /// Tolerance when comparing offsets for containment and tiling.
    pub offset_epsilon: f64,
    /// Report gaps in sibling ordinals.
    pub check_ordinals: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_label_length: None,
            offset_epsilon: 1e-6,
            check_ordinals: true,
        }
    }
}

/// Costs for the default edit comparator and the collapse threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EditPathConfig {
    pub change_distance: u32,
    pub insert_distance: u32,
    pub delete_distance: u32,
    /// Collapse an insert/delete pair into a change only when the direct
    /// change costs at most this multiple of the pair.
    pub collapse_ratio: u32,
}

impl Default for EditPathConfig {
    fn default() -> Self {
        Self {
            change_distance: 1,
            insert_distance: 1,
            delete_distance: 1,
            collapse_ratio: 3,
        }
    }
}

/// Validate a full configuration object.
pub fn validate_config(cfg: &CoreConfig) -> AgResult<()> {
    if cfg.graph.anchor_epsilon.is_nan() || cfg.graph.anchor_epsilon < 0.0 {
        return Err(AgError::invalid_configuration(
            "anchor_epsilon must be a non-negative number",
        ));
    }

    if cfg.validation.offset_epsilon.is_nan() || cfg.validation.offset_epsilon < 0.0 {
        return Err(AgError::invalid_configuration(
            "offset_epsilon must be a non-negative number",
        ));
    }

    if cfg.offsets.generated_confidence < cfg.offsets.bound_confidence {
        // interpolated offsets must count as bound on the next pass
        return Err(AgError::invalid_configuration(
            "generated_confidence must not be below bound_confidence",
        ));
    }

    if cfg.offsets.bound_confidence == Confidence::Unknown {
        return Err(AgError::invalid_configuration(
            "bound_confidence must be above unknown",
        ));
    }

    let ep = &cfg.edit_path;
    if ep.change_distance == 0 || ep.insert_distance == 0 || ep.delete_distance == 0 {
        return Err(AgError::invalid_configuration(
            "edit distances must be greater than zero",
        ));
    }

    if ep.collapse_ratio == 0 {
        return Err(AgError::invalid_configuration(
            "collapse_ratio must be greater than zero",
        ));
    }

    if cfg.validation.max_label_length == Some(0) {
        return Err(AgError::invalid_configuration(
            "max_label_length must be greater than zero when set",
        ));
    }

    Ok(())
}
