//! Data model: layers and schemas, anchors, annotations, change records.
//!
//! These are plain records. All behavior that keeps them mutually
//! consistent (ordinals, change status, anchor sharing) lives on `Graph`.

pub mod anchor;
pub mod annotation;
pub mod change;
pub mod layer;
pub mod schema;

pub use anchor::{Anchor, AnchorId, Confidence};
pub use annotation::{Annotation, AnnotationId};
pub use change::{Change, ChangeStatus, ChangeTarget};
pub use layer::{Alignment, Layer, LayerId, ValueType};
pub use schema::{canonical, Schema, ROOT_LAYER_ID};
