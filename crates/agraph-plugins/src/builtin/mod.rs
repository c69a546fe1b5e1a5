//! Built-in transformers.
//!
//! - `builtin.default_offsets`: interpolate offsets of unaligned anchors
//! - `builtin.simple_tokenizer`: split labels of one layer into tokens on another
//! - `builtin.label_mapper`: align labels of one layer to tokens of another

pub mod default_offsets;
pub mod label_mapper;
pub mod simple_tokenizer;

use crate::registry::TransformerRegistry;
use crate::spec::PluginSpec;
use crate::transform::Transformer;

pub use default_offsets::DefaultOffsets;
pub use label_mapper::LabelMapper;
pub use simple_tokenizer::SimpleTokenizer;

/// Ids of the built-in transformers, in registry order.
pub const BUILTIN_IDS: [&str; 3] = [
    default_offsets::ID,
    label_mapper::ID,
    simple_tokenizer::ID,
];

pub fn builtin_specs() -> Vec<PluginSpec> {
    vec![
        DefaultOffsets.spec(),
        LabelMapper.spec(),
        SimpleTokenizer.spec(),
    ]
}

/// Register all built-in transformers.
pub fn register_all(registry: &mut TransformerRegistry) -> anyhow::Result<()> {
    registry.register(Box::new(DefaultOffsets))?;
    registry.register(Box::new(LabelMapper))?;
    registry.register(Box::new(SimpleTokenizer))?;
    Ok(())
}
