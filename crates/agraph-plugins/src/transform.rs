//! The transformer boundary.
//!
//! A transformer receives a graph that is already inside a transaction and
//! mutates it through the graph's own operations. It never commits or rolls
//! back; `TransformRunner` does that after validating the result.

use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use agraph_core::graph::Graph;
use agraph_core::AgError;

use crate::spec::{ParameterSet, PluginSpec};

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("layer not found: {0}")]
    MissingLayer(String),

    #[error("cancelled")]
    Cancelled,

    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Graph(#[from] AgError),
}

impl TransformError {
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

pub type TransformResult<T> = Result<T, TransformError>;

/// Per-run inputs handed to a transformer.
#[derive(Debug, Clone, Copy)]
pub struct TransformContext<'a> {
    /// Parameters already resolved against the transformer's spec.
    pub params: &'a ParameterSet,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> TransformContext<'a> {
    pub fn new(params: &'a ParameterSet) -> Self {
        Self {
            params,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Advisory; long-running transformers poll this between units of work.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|f| f.load(Ordering::Relaxed))
    }

    pub fn check_cancelled(&self) -> TransformResult<()> {
        if self.is_cancelled() {
            Err(TransformError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// A string parameter that must be present.
    pub fn require_str(&self, name: &str) -> TransformResult<&'a str> {
        self.params
            .get_str(name)
            .ok_or_else(|| TransformError::invalid_configuration(format!("{name} is required")))
    }
}

/// A graph transformer.
pub trait Transformer: Send + Sync {
    fn spec(&self) -> PluginSpec;

    /// Mutate `graph` in place and return non-fatal warnings.
    fn transform(&self, graph: &mut Graph, ctx: &TransformContext<'_>) -> TransformResult<Vec<String>>;
}

/// Layer ids named by parameters must exist in the graph's schema.
pub fn require_layer(graph: &Graph, layer_id: &str) -> TransformResult<()> {
    if graph.layer(layer_id).is_some() {
        Ok(())
    } else {
        Err(TransformError::MissingLayer(layer_id.to_string()))
    }
}
