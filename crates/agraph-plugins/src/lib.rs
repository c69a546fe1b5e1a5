//! agraph-plugins
//!
//! Collaborator boundaries around the annotation graph core:
//! - `Transformer` plus the `TransformRunner` transaction protocol
//! - `Deserializer` / `Serializer` traits for byte formats
//! - parameter specs and a deterministic `TransformerRegistry`
//! - built-in transformers (feature `builtin`)

#[cfg(feature = "builtin")]
pub mod builtin;
pub mod registry;
pub mod runner;
pub mod serialize;
pub mod spec;
pub mod transform;

pub use registry::TransformerRegistry;
pub use runner::{RunError, RunReport, TransformRunner};
pub use spec::{ParameterKind, ParameterSet, ParameterSpec, PluginId, PluginSpec};
pub use transform::{TransformContext, TransformError, TransformResult, Transformer};
