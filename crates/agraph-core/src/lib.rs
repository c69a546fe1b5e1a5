//! agraph-core
//!
//! Core primitives for annotation graphs:
//! - Schema/Layer declarations and the layer hierarchy
//! - Anchors, annotations and the transactional `Graph` that owns them
//! - Fragments: self-contained deep copies of a time window
//! - Validation reports for structural and temporal invariants
//! - Default offset interpolation for unaligned anchors
//! - Minimum edit paths over arbitrary sequences

pub mod config;
pub mod determinism;
pub mod editpath;
pub mod errors;
pub mod graph;
pub mod model;
pub mod offsets;
pub mod validate;

pub use crate::errors::{AgError, AgResult};

/// Convenience re-exports.
pub mod prelude {
    pub use crate::config::{
        validate_config, CoreConfig, EditPathConfig, GraphConfig, OffsetConfig, ValidationConfig,
    };
    pub use crate::editpath::{
        DefaultEditComparator, EditComparator, EditOperation, EditStep, EqualsComparator,
        MinimumEditPath,
    };
    pub use crate::graph::{FragmentInfo, Graph, Transaction};
    pub use crate::model::{
        canonical, Alignment, Anchor, AnchorId, Annotation, AnnotationId, Change, ChangeStatus,
        ChangeTarget, Confidence, Layer, LayerId, Schema, ValueType, ROOT_LAYER_ID,
    };
    pub use crate::offsets::{DefaultOffsetGenerator, OffsetReport};
    pub use crate::validate::{Finding, FindingLevel, ValidationReport, Validator};
    pub use crate::{AgError, AgResult};
}
