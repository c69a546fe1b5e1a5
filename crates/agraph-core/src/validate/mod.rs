//! Structural and temporal validation of a graph.
//!
//! The validator never mutates and never stops at the first problem: every
//! violation becomes a `Finding` in one `ValidationReport`, and the caller
//! decides whether a report with errors is fatal.
//!
//! Layers are walked in hierarchy order. Checks per annotation:
//! - the layer is declared and both anchors exist
//! - the parent exists and lies on the parent layer
//! - start is not after end, instants share an offset
//! - the parent contains it when the layer declares `parent_includes`
//! - the label fits the configured maximum length
//!
//! Checks per sibling group (same parent, same layer):
//! - `peers = false` allows one child
//! - `peers_overlap = false` forbids overlap between consecutive children
//! - `saturated` children tile the parent span exactly
//! - ordinals run 1..n
//!
//! Layers with alignment `None` skip every temporal check.

use std::collections::BTreeSet;

use itertools::Itertools;
use tracing::debug;

use crate::config::ValidationConfig;
use crate::graph::Graph;
use crate::model::{Alignment, Annotation, ChangeStatus, Layer};

mod report;

pub use report::{Finding, FindingLevel, ValidationReport};

use report::finding;

pub mod codes {
    pub const SCHEMA_PARENT: &str = "schema.parent";
    pub const LAYER_UNKNOWN: &str = "layer.unknown";
    pub const ANCHOR_MISSING: &str = "anchor.missing";
    pub const ANCHOR_ORDER: &str = "anchor.order";
    pub const INSTANT_MISMATCH: &str = "instant.mismatch";
    pub const PARENT_MISSING: &str = "parent.missing";
    pub const PARENT_ORPHAN: &str = "parent.orphan";
    pub const PARENT_LAYER: &str = "parent.layer";
    pub const PARENT_INCLUDES: &str = "parent.includes";
    pub const LABEL_LENGTH: &str = "label.length";
    pub const PEERS_MULTIPLE: &str = "peers.multiple";
    pub const PEERS_OVERLAP: &str = "peers.overlap";
    pub const SATURATED_BOUNDS: &str = "saturated.bounds";
    pub const SATURATED_GAP: &str = "saturated.gap";
    pub const SATURATED_OVERLAP: &str = "saturated.overlap";
    pub const ORDINAL_GAP: &str = "ordinal.gap";
}

#[derive(Debug, Clone, Default)]
pub struct Validator {
    config: ValidationConfig,
}

impl Validator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validate a graph. Annotations pending destruction are ignored.
    pub fn validate(&self, graph: &Graph) -> ValidationReport {
        let mut report = ValidationReport::new(graph.id.clone());

        self.check_schema(graph, &mut report);
        self.check_unknown_layers(graph, &mut report);

        for layer in graph.schema().layers_top_down() {
            let annotations: Vec<&Annotation> = graph
                .all(&layer.id)
                .into_iter()
                .filter(|a| !a.is_destroyed())
                .collect();

            let mut groups: BTreeSet<Option<&str>> = BTreeSet::new();
            for a in &annotations {
                self.check_annotation(graph, layer, a, &mut report);
                groups.insert(a.parent_id.as_deref());
            }
            for parent_id in groups {
                self.check_siblings(graph, layer, parent_id, &mut report);
            }
        }

        debug!(
            graph = %graph.id,
            findings = report.findings.len(),
            errors = report.errors().count(),
            "validate"
        );
        report
    }

    fn check_schema(&self, graph: &Graph, report: &mut ValidationReport) {
        for (layer, parent) in graph.schema().unresolved_parents() {
            report.push(
                finding(
                    FindingLevel::Error,
                    codes::SCHEMA_PARENT,
                    format!("layer {layer} has undeclared parent layer {parent}"),
                )
                .with("layer", layer)
                .with("parent", parent),
            );
        }
    }

    fn check_unknown_layers(&self, graph: &Graph, report: &mut ValidationReport) {
        for a in graph.annotations() {
            if a.is_destroyed() || graph.schema().contains(&a.layer_id) {
                continue;
            }
            report.push(
                finding(
                    FindingLevel::Error,
                    codes::LAYER_UNKNOWN,
                    format!("annotation {} is on undeclared layer {}", a.id, a.layer_id),
                )
                .with("annotation", a.id.clone())
                .with("layer", a.layer_id.clone()),
            );
        }
    }

    fn check_annotation(
        &self,
        graph: &Graph,
        layer: &Layer,
        a: &Annotation,
        report: &mut ValidationReport,
    ) {
        let mut anchors_ok = true;
        for anchor_id in [&a.start_id, &a.end_id] {
            let exists = graph
                .get_anchor(anchor_id)
                .is_some_and(|x| x.change != ChangeStatus::Destroy);
            if !exists {
                anchors_ok = false;
                report.push(
                    finding(
                        FindingLevel::Error,
                        codes::ANCHOR_MISSING,
                        format!("annotation {} refers to missing anchor {anchor_id}", a.id),
                    )
                    .with("annotation", a.id.clone())
                    .with("anchor", anchor_id.clone()),
                );
            }
        }

        let parent = self.check_parent(graph, layer, a, report);

        if let Some(max) = self.config.max_label_length {
            let len = a.label.chars().count();
            if len > max {
                report.push(
                    finding(
                        FindingLevel::Error,
                        codes::LABEL_LENGTH,
                        format!("label of {} has {len} characters, maximum is {max}", a.id),
                    )
                    .with("annotation", a.id.clone())
                    .with("layer", layer.id.clone()),
                );
            }
        }

        if !layer.is_aligned() || !anchors_ok {
            return;
        }
        let eps = self.config.offset_epsilon;
        let (start, end) = (graph.offset_of(&a.start_id), graph.offset_of(&a.end_id));

        if let (Some(s), Some(e)) = (start, end) {
            if s > e + eps {
                report.push(
                    finding(
                        FindingLevel::Error,
                        codes::ANCHOR_ORDER,
                        format!("annotation {} starts at {s} after it ends at {e}", a.id),
                    )
                    .with("annotation", a.id.clone())
                    .with("start", a.start_id.clone())
                    .with("end", a.end_id.clone()),
                );
            }
            if layer.alignment == Alignment::Instant && (s - e).abs() > eps {
                report.push(
                    finding(
                        FindingLevel::Warning,
                        codes::INSTANT_MISMATCH,
                        format!("instant {} spans {s}..{e}", a.id),
                    )
                    .with("annotation", a.id.clone())
                    .with("layer", layer.id.clone()),
                );
            }
        }

        let Some(parent) = parent else {
            return;
        };
        let parent_aligned = graph.layer(&parent.layer_id).is_some_and(Layer::is_aligned);
        if !layer.parent_includes || !parent_aligned {
            return;
        }
        let (ps, pe) = (
            graph.offset_of(&parent.start_id),
            graph.offset_of(&parent.end_id),
        );
        let starts_early = matches!((ps, start), (Some(p), Some(s)) if s < p - eps);
        let ends_late = matches!((pe, end), (Some(p), Some(e)) if e > p + eps);
        if starts_early || ends_late {
            report.push(
                finding(
                    FindingLevel::Error,
                    codes::PARENT_INCLUDES,
                    format!("annotation {} extends outside its parent {}", a.id, parent.id),
                )
                .with("annotation", a.id.clone())
                .with("parent", parent.id.clone()),
            );
        }
    }

    fn check_parent<'g>(
        &self,
        graph: &'g Graph,
        layer: &Layer,
        a: &Annotation,
        report: &mut ValidationReport,
    ) -> Option<&'g Annotation> {
        let expected = layer.parent_id.as_deref().filter(|_| !layer.is_top_level())?;

        let Some(parent_id) = a.parent_id.as_deref() else {
            report.push(
                finding(
                    FindingLevel::Error,
                    codes::PARENT_MISSING,
                    format!("annotation {} on {} has no parent", a.id, layer.id),
                )
                .with("annotation", a.id.clone())
                .with("layer", layer.id.clone()),
            );
            return None;
        };

        let parent = graph.get_annotation(parent_id).filter(|p| !p.is_destroyed());
        let Some(parent) = parent else {
            report.push(
                finding(
                    FindingLevel::Error,
                    codes::PARENT_ORPHAN,
                    format!("annotation {} refers to missing parent {parent_id}", a.id),
                )
                .with("annotation", a.id.clone())
                .with("parent", parent_id),
            );
            return None;
        };

        if parent.layer_id != expected {
            report.push(
                finding(
                    FindingLevel::Error,
                    codes::PARENT_LAYER,
                    format!(
                        "parent {} of {} is on {}, expected {expected}",
                        parent.id, a.id, parent.layer_id
                    ),
                )
                .with("annotation", a.id.clone())
                .with("parent", parent.id.clone())
                .with("layer", parent.layer_id.clone()),
            );
            return None;
        }
        Some(parent)
    }

    fn check_siblings(
        &self,
        graph: &Graph,
        layer: &Layer,
        parent_id: Option<&str>,
        report: &mut ValidationReport,
    ) {
        let siblings: Vec<&Annotation> = graph
            .children(parent_id, &layer.id)
            .into_iter()
            .filter(|a| !a.is_destroyed())
            .collect();
        if siblings.is_empty() {
            return;
        }
        let group = parent_id.unwrap_or("");

        if !layer.peers && siblings.len() > 1 {
            report.push(
                finding(
                    FindingLevel::Error,
                    codes::PEERS_MULTIPLE,
                    format!(
                        "layer {} allows one annotation per parent, {group} has {}",
                        layer.id,
                        siblings.len()
                    ),
                )
                .with("layer", layer.id.clone())
                .with("parent", group),
            );
        }

        if self.config.check_ordinals {
            let mut ordinals: Vec<u32> = siblings.iter().map(|a| a.ordinal).collect();
            ordinals.sort_unstable();
            let dense = ordinals.iter().zip(1u32..).all(|(o, n)| *o == n);
            if !dense {
                report.push(
                    finding(
                        FindingLevel::Warning,
                        codes::ORDINAL_GAP,
                        format!("ordinals of {} under {group} are not 1..n", layer.id),
                    )
                    .with("layer", layer.id.clone())
                    .with("parent", group),
                );
            }
        }

        if !layer.is_aligned() {
            return;
        }
        let eps = self.config.offset_epsilon;
        let span = |a: &Annotation| (graph.offset_of(&a.start_id), graph.offset_of(&a.end_id));

        if !layer.peers_overlap {
            // compare each sibling with the furthest-reaching one before it
            let mut reach: Option<(&Annotation, f64)> = None;
            for next in siblings.iter().copied() {
                let (start, end) = span(next);
                if let (Some((prev, pe)), Some(ns)) = (reach, start) {
                    if pe > ns + eps {
                        report.push(
                            finding(
                                FindingLevel::Error,
                                codes::PEERS_OVERLAP,
                                format!("{} overlaps {} on {}", prev.id, next.id, layer.id),
                            )
                            .with("annotation", next.id.clone())
                            .with("previous", prev.id.clone())
                            .with("layer", layer.id.clone()),
                        );
                    }
                }
                if let Some(ne) = end {
                    if reach.map_or(true, |(_, pe)| ne > pe) {
                        reach = Some((next, ne));
                    }
                }
            }
        }

        if layer.saturated {
            self.check_tiling(graph, layer, parent_id, &siblings, report);
        }
    }

    fn check_tiling(
        &self,
        graph: &Graph,
        layer: &Layer,
        parent_id: Option<&str>,
        siblings: &[&Annotation],
        report: &mut ValidationReport,
    ) {
        let eps = self.config.offset_epsilon;
        let offset = |id: &str| graph.offset_of(id);

        for (prev, next) in siblings.iter().tuple_windows() {
            let (Some(pe), Some(ns)) = (offset(prev.end_id.as_str()), offset(next.start_id.as_str()))
            else {
                continue;
            };
            let code = if ns > pe + eps {
                codes::SATURATED_GAP
            } else if pe > ns + eps {
                codes::SATURATED_OVERLAP
            } else {
                continue;
            };
            report.push(
                finding(
                    FindingLevel::Error,
                    code,
                    format!("{} and {} do not meet on saturated {}", prev.id, next.id, layer.id),
                )
                .with("annotation", next.id.clone())
                .with("previous", prev.id.clone())
                .with("layer", layer.id.clone()),
            );
        }

        let Some(parent) = parent_id.and_then(|id| graph.get_annotation(id)) else {
            return;
        };
        let (Some(first), Some(last)) = (siblings.first(), siblings.last()) else {
            return;
        };
        let starts = offset(first.start_id.as_str()).zip(offset(parent.start_id.as_str()));
        let ends = offset(last.end_id.as_str()).zip(offset(parent.end_id.as_str()));
        let off = |pair: Option<(f64, f64)>| pair.is_some_and(|(c, p)| (c - p).abs() > eps);
        if off(starts) || off(ends) {
            report.push(
                finding(
                    FindingLevel::Error,
                    codes::SATURATED_BOUNDS,
                    format!("children on {} do not cover parent {}", layer.id, parent.id),
                )
                .with("parent", parent.id.clone())
                .with("layer", layer.id.clone()),
            );
        }
    }
}
