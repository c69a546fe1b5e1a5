//! Transformer registry.
//!
//! Stores transformers keyed by plugin id. Iteration and listing follow id
//! order, independent of registration order. The registry does not run
//! anything; see `runner`.

use std::collections::BTreeMap;

use crate::spec::PluginSpec;
use crate::transform::Transformer;

/// A transformer instance plus its spec.
pub struct RegisteredTransformer {
    pub spec: PluginSpec,
    pub transformer: Box<dyn Transformer>,
}

#[derive(Default)]
pub struct TransformerRegistry {
    transformers: BTreeMap<String, RegisteredTransformer>,
}

impl TransformerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.transformers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }

    /// Register a transformer under the id of its spec.
    pub fn register(&mut self, transformer: Box<dyn Transformer>) -> anyhow::Result<()> {
        let spec = transformer.spec();
        spec.validate()?;

        let id = spec.id.as_str().to_string();
        if self.transformers.contains_key(&id) {
            anyhow::bail!("transformer id already registered: {id}");
        }

        tracing::debug!(id = %id, version = %spec.version, "register transformer");
        self.transformers
            .insert(id, RegisteredTransformer { spec, transformer });
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&RegisteredTransformer> {
        self.transformers.get(id)
    }

    pub fn list_ids(&self) -> Vec<String> {
        self.transformers.keys().cloned().collect()
    }

    pub fn specs(&self) -> Vec<&PluginSpec> {
        self.transformers.values().map(|r| &r.spec).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RegisteredTransformer)> {
        self.transformers.iter()
    }
}
