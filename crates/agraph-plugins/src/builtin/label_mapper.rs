//! Built-in `label_mapper` transformer.
//!
//! Within each scope annotation, aligns the labels of a source layer with
//! the annotations of a target layer using the minimum edit path (with
//! collapse), and tags every matched or changed target annotation on a
//! mapping layer with the source label it was aligned to.
//!
//! Source labels that align to nothing are appended to the previous tag,
//! or prepended to the next one when no tag exists yet. Target annotations
//! that align to nothing get no tag.

use agraph_core::editpath::{
    DefaultEditComparator, EditComparator, EditOperation, EqualsComparator, MinimumEditPath,
};
use agraph_core::graph::Graph;
use agraph_core::model::{Alignment, Annotation, AnnotationId, Confidence, Layer};

use crate::spec::{ParameterKind, ParameterSpec, PluginSpec};
use crate::transform::{require_layer, TransformContext, TransformError, TransformResult, Transformer};

pub const ID: &str = "builtin.label_mapper";

pub struct LabelMapper;

/// How source labels are turned into alignment elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Split {
    /// One element per source annotation.
    None,
    /// Source labels split on spaces.
    Space,
    /// Source labels split into characters.
    Char,
}

impl Split {
    fn parse(s: &str) -> TransformResult<Self> {
        match s {
            "" | "none" => Ok(Self::None),
            "space" => Ok(Self::Space),
            "char" => Ok(Self::Char),
            other => Err(TransformError::invalid_configuration(format!(
                "unknown split_labels: {other}"
            ))),
        }
    }

    fn elements(self, label: &str, out: &mut Vec<String>) {
        match self {
            Self::None => out.push(label.to_string()),
            Self::Space => out.extend(label.split(' ').filter(|s| !s.is_empty()).map(str::to_string)),
            Self::Char => out.extend(label.chars().map(String::from)),
        }
    }

    fn joiner(self) -> &'static str {
        match self {
            Self::Char => "",
            _ => " ",
        }
    }
}

struct Token {
    id: AnnotationId,
    label: String,
    start_id: String,
    end_id: String,
}

impl Transformer for LabelMapper {
    fn spec(&self) -> PluginSpec {
        PluginSpec::new(ID, "Label Mapper", "0.1.0")
            .description("Align labels of one layer to the annotations of another")
            .parameter(
                ParameterSpec::new("source_layer", ParameterKind::Layer)
                    .required()
                    .hint("Layer providing the labels"),
            )
            .parameter(
                ParameterSpec::new("target_layer", ParameterKind::Layer)
                    .required()
                    .hint("Layer whose annotations are tagged"),
            )
            .parameter(
                ParameterSpec::new("mapping_layer", ParameterKind::Layer)
                    .required()
                    .hint("Tag layer under the target layer; created when missing"),
            )
            .parameter(
                ParameterSpec::new("scope_layer", ParameterKind::Layer)
                    .hint("Defaults to the nearest common ancestor of source and target"),
            )
            .parameter(
                ParameterSpec::new("split_labels", ParameterKind::String)
                    .default_value("none")
                    .possible("none")
                    .possible("space")
                    .possible("char"),
            )
            .parameter(
                ParameterSpec::new("comparator", ParameterKind::String)
                    .default_value("strict")
                    .possible("strict")
                    .possible("loose")
                    .hint("loose ignores case and whitespace"),
            )
            .meta("category", "alignment")
    }

    fn transform(&self, graph: &mut Graph, ctx: &TransformContext<'_>) -> TransformResult<Vec<String>> {
        let source_layer = ctx.require_str("source_layer")?;
        let target_layer = ctx.require_str("target_layer")?;
        let mapping_layer = ctx.require_str("mapping_layer")?;
        let split = Split::parse(ctx.params.get_str("split_labels").unwrap_or("none"))?;
        require_layer(graph, source_layer)?;
        require_layer(graph, target_layer)?;

        let scope_layer = match ctx.params.get_str("scope_layer") {
            Some(id) => {
                require_layer(graph, id)?;
                id.to_string()
            }
            None => graph
                .schema()
                .first_common_ancestor(source_layer, target_layer)
                .map(|l| l.id.clone())
                .ok_or_else(|| {
                    TransformError::invalid_configuration(format!(
                        "{source_layer} and {target_layer} have no common scope layer"
                    ))
                })?,
        };

        prepare_mapping_layer(graph, mapping_layer, target_layer)?;

        let strict = DefaultEditComparator::default();
        let loose = EqualsComparator::<String>::loose();
        let comparator: &dyn EditComparator<String> = match ctx.params.get_str("comparator") {
            Some("loose") => &loose,
            _ => &strict,
        };
        let mp = MinimumEditPath::new(comparator);

        let scopes: Vec<AnnotationId> = graph
            .all(&scope_layer)
            .into_iter()
            .filter(|a| !a.is_destroyed())
            .map(|a| a.id.clone())
            .collect();

        let mut warnings = Vec::new();
        let mut tagged = 0usize;
        for scope_id in &scopes {
            ctx.check_cancelled()?;

            let tokens: Vec<Token> = live(graph.list(scope_id, target_layer))
                .map(|a| Token {
                    id: a.id.clone(),
                    label: a.label.clone(),
                    start_id: a.start_id.clone(),
                    end_id: a.end_id.clone(),
                })
                .collect();
            if tokens.is_empty() {
                warnings.push(format!("{scope_id}: no {target_layer}"));
                continue;
            }
            let token_labels: Vec<String> = tokens.iter().map(|t| t.label.clone()).collect();

            let mut labels = Vec::new();
            for a in live(graph.list(scope_id, source_layer)) {
                split.elements(&a.label, &mut labels);
            }
            if labels.is_empty() {
                warnings.push(format!("{scope_id}: no {source_layer}"));
                continue;
            }

            let path = mp.collapse(mp.minimum_edit_path(&labels, &token_labels));
            tracing::trace!(scope = %scope_id, steps = path.len(), "label mapping path");

            let mut last_tag: Option<AnnotationId> = None;
            let mut pending = String::new();
            for step in &path {
                match step.operation {
                    EditOperation::None | EditOperation::Change => {
                        let (Some(from), Some(token)) = (step.from, tokens.get(step.to_index)) else {
                            continue;
                        };
                        let label = format!("{pending}{from}");
                        pending.clear();
                        let tag = Annotation::new("", mapping_layer, label, &token.start_id, &token.end_id)
                            .with_parent(token.id.clone())
                            .with_confidence(Confidence::Automatic);
                        last_tag = Some(graph.add_annotation(tag)?);
                        tagged += 1;
                    }
                    EditOperation::Delete => {
                        let Some(from) = step.from else {
                            continue;
                        };
                        match last_tag.as_deref().and_then(|id| graph.get_annotation(id)) {
                            Some(tag) => {
                                let label = format!("{}{}{from}", tag.label, split.joiner());
                                let id = tag.id.clone();
                                graph.set_label(&id, label)?;
                            }
                            None => {
                                pending.push_str(from);
                                pending.push_str(split.joiner());
                            }
                        }
                    }
                    EditOperation::Insert => {}
                }
            }
            if !pending.is_empty() {
                warnings.push(format!("{scope_id}: unmapped {}", pending.trim_end()));
            }
        }

        tracing::debug!(graph = %graph.id, scopes = scopes.len(), tagged, "label mapping");
        Ok(warnings)
    }
}

fn live<'a>(items: Vec<&'a Annotation>) -> impl Iterator<Item = &'a Annotation> {
    items.into_iter().filter(|a| !a.is_destroyed())
}

/// Create the mapping layer under the target layer, or clear the existing one.
fn prepare_mapping_layer(graph: &mut Graph, mapping_layer: &str, target_layer: &str) -> TransformResult<()> {
    match graph.layer(mapping_layer) {
        Some(layer) if layer.parent_id.as_deref() != Some(target_layer) => {
            Err(TransformError::invalid_configuration(format!(
                "mapping layer {mapping_layer} is not a child of {target_layer}"
            )))
        }
        Some(_) => {
            graph.destroy_all(mapping_layer);
            Ok(())
        }
        None => {
            graph.schema_mut().add_layer(
                Layer::new(mapping_layer, format!("{target_layer} label mapping"))
                    .with_parent(target_layer)
                    .with_alignment(Alignment::None)
                    .with_peers(false),
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agraph_core::model::{Anchor, Schema};
    use assert_matches::assert_matches;

    use crate::spec::ParameterSet;

    fn graph(utterance: &str, words: &[&str]) -> Graph {
        let mut g = Graph::new("g", Schema::default_transcript());
        let n = words.len();
        for i in 0..=n {
            g.add_anchor(Anchor::at(format!("a{i}"), i as f64)).unwrap();
        }
        let end = format!("a{n}");
        g.add_annotation(Annotation::new("p", "participant", "Ann", "a0", &end))
            .unwrap();
        g.add_annotation(Annotation::new("t", "turn", "Ann", "a0", &end).with_parent("p"))
            .unwrap();
        g.add_annotation(Annotation::new("u", "utterance", utterance, "a0", &end).with_parent("t"))
            .unwrap();
        for (i, w) in words.iter().enumerate() {
            g.add_annotation(
                Annotation::new(format!("w{i}"), "word", *w, format!("a{i}"), format!("a{}", i + 1))
                    .with_parent("t"),
            )
            .unwrap();
        }
        g.commit();
        g
    }

    fn params(split: &str, comparator: &str) -> ParameterSet {
        ParameterSet::new()
            .with("source_layer", "utterance")
            .with("target_layer", "word")
            .with("mapping_layer", "mapped")
            .with("split_labels", split)
            .with("comparator", comparator)
            .resolve(&LabelMapper.spec())
            .unwrap()
    }

    fn tags(g: &Graph) -> Vec<(String, String)> {
        g.all("mapped")
            .into_iter()
            .map(|a| (a.parent_id.clone().unwrap_or_default(), a.label.clone()))
            .collect()
    }

    #[test]
    fn tags_matches_and_changes() {
        let mut g = graph("the cat sat", &["the", "cat", "sit"]);
        let warnings = LabelMapper
            .transform(&mut g, &TransformContext::new(&params("space", "strict")))
            .unwrap();
        assert!(warnings.is_empty());
        assert!(g.layer("mapped").is_some_and(|l| l.parent_id.as_deref() == Some("word")));
        assert_eq!(
            tags(&g),
            vec![
                ("w0".to_string(), "the".to_string()),
                ("w1".to_string(), "cat".to_string()),
                ("w2".to_string(), "sat".to_string()),
            ]
        );
    }

    #[test]
    fn leading_deletes_prefix_the_first_tag() {
        let mut g = graph("oh the cat", &["the", "cat"]);
        LabelMapper
            .transform(&mut g, &TransformContext::new(&params("space", "strict")))
            .unwrap();
        assert_eq!(tags(&g)[0], ("w0".to_string(), "oh the".to_string()));
    }

    #[test]
    fn char_split_concatenates_without_spaces() {
        let mut g = graph("abxc", &["a", "b", "c"]);
        LabelMapper
            .transform(&mut g, &TransformContext::new(&params("char", "strict")))
            .unwrap();
        let labels: Vec<String> = tags(&g).into_iter().map(|(_, l)| l).collect();
        assert_eq!(labels, vec!["a", "bx", "c"]);
    }

    #[test]
    fn loose_comparison_changes_the_alignment() {
        let mut g = graph("CAT", &["cat", "dog"]);
        LabelMapper
            .transform(&mut g, &TransformContext::new(&params("space", "strict")))
            .unwrap();
        assert_eq!(tags(&g), vec![("w1".to_string(), "CAT".to_string())]);

        let mut g = graph("CAT", &["cat", "dog"]);
        LabelMapper
            .transform(&mut g, &TransformContext::new(&params("space", "loose")))
            .unwrap();
        assert_eq!(tags(&g), vec![("w0".to_string(), "CAT".to_string())]);
    }

    #[test]
    fn rerun_replaces_previous_tags() {
        let mut g = graph("the cat", &["the", "cat"]);
        let p = params("space", "strict");
        LabelMapper.transform(&mut g, &TransformContext::new(&p)).unwrap();
        g.commit();
        LabelMapper.transform(&mut g, &TransformContext::new(&p)).unwrap();
        g.commit();
        assert_eq!(g.all("mapped").len(), 2);
    }

    #[test]
    fn mapping_layer_must_hang_off_the_target() {
        let mut g = graph("the", &["the"]);
        let p = ParameterSet::new()
            .with("source_layer", "utterance")
            .with("target_layer", "word")
            .with("mapping_layer", "turn");
        assert_matches!(
            LabelMapper.transform(&mut g, &TransformContext::new(&p)),
            Err(TransformError::InvalidConfiguration(_))
        );
    }
}
