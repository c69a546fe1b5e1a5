//! Built-in `simple_tokenizer` transformer.
//!
//! Splits the label of each source annotation on delimiter characters and
//! adds one destination annotation per token. The first token starts at the
//! source's start anchor and the last ends at its end anchor; anchors
//! between tokens are new and unresolved, ready for `default_offsets`.
//!
//! When source and destination layers share a parent layer, tokens become
//! children of the source's parent; otherwise they are children of the
//! source annotation itself.

use agraph_core::graph::Graph;
use agraph_core::model::{Annotation, AnnotationId, Confidence};

use crate::spec::{ParameterKind, ParameterSpec, PluginSpec};
use crate::transform::{require_layer, TransformContext, TransformError, TransformResult, Transformer};

pub const ID: &str = "builtin.simple_tokenizer";

pub const DEFAULT_DELIMITERS: &str = " \n\r\t";

pub struct SimpleTokenizer;

struct Source {
    id: AnnotationId,
    label: String,
    start_id: String,
    end_id: String,
    parent_id: Option<AnnotationId>,
    confidence: Confidence,
}

impl Transformer for SimpleTokenizer {
    fn spec(&self) -> PluginSpec {
        PluginSpec::new(ID, "Simple Tokenizer", "0.1.0")
            .description("Split labels on delimiters into tokens on another layer")
            .parameter(
                ParameterSpec::new("source_layer", ParameterKind::Layer)
                    .required()
                    .hint("Layer whose labels are split"),
            )
            .parameter(
                ParameterSpec::new("destination_layer", ParameterKind::Layer)
                    .required()
                    .hint("Layer that receives one annotation per token"),
            )
            .parameter(
                ParameterSpec::new("delimiters", ParameterKind::String)
                    .default_value(DEFAULT_DELIMITERS)
                    .hint("Every character in this string separates tokens"),
            )
            .meta("category", "tokenization")
    }

    fn transform(&self, graph: &mut Graph, ctx: &TransformContext<'_>) -> TransformResult<Vec<String>> {
        let source_layer = ctx.require_str("source_layer")?;
        let destination_layer = ctx.require_str("destination_layer")?;
        let delimiters = ctx.params.get_str("delimiters").unwrap_or(DEFAULT_DELIMITERS);
        require_layer(graph, source_layer)?;
        require_layer(graph, destination_layer)?;
        if source_layer == destination_layer {
            return Err(TransformError::invalid_configuration(format!(
                "source and destination layer are the same: {source_layer}"
            )));
        }

        let shared_parent = graph.layer(source_layer).map(|l| &l.parent_id)
            == graph.layer(destination_layer).map(|l| &l.parent_id);

        let sources: Vec<Source> = graph
            .all(source_layer)
            .into_iter()
            .filter(|a| !a.is_destroyed())
            .map(|a| Source {
                id: a.id.clone(),
                label: a.label.clone(),
                start_id: a.start_id.clone(),
                end_id: a.end_id.clone(),
                parent_id: a.parent_id.clone(),
                confidence: a.confidence,
            })
            .collect();

        let mut created = 0usize;
        let mut warnings = Vec::new();
        for source in sources {
            ctx.check_cancelled()?;
            let tokens: Vec<&str> = source
                .label
                .split(|c: char| delimiters.contains(c))
                .filter(|t| !t.is_empty())
                .collect();
            if tokens.is_empty() {
                warnings.push(format!("{}: no tokens in label", source.id));
                continue;
            }

            let parent_id = if shared_parent {
                source.parent_id.clone()
            } else {
                Some(source.id.clone())
            };
            let mut start_id = source.start_id.clone();
            for (i, token) in tokens.iter().enumerate() {
                let end_id = if i + 1 == tokens.len() {
                    source.end_id.clone()
                } else {
                    graph.create_unresolved_anchor()
                };
                let mut token = Annotation::new("", destination_layer, *token, &start_id, &end_id)
                    .with_confidence(source.confidence);
                token.parent_id = parent_id.clone();
                graph.add_annotation(token)?;
                created += 1;
                start_id = end_id;
            }
        }

        tracing::debug!(graph = %graph.id, source = source_layer, destination = destination_layer, created, "tokenized");
        Ok(warnings)
    }
}
