//! Default offset generation.
//!
//! Anchors without an offset get one by linear interpolation between the
//! nearest bound anchors around them. An anchor is bound when it has an
//! offset and its confidence is at least the configured bound confidence;
//! offsets generated earlier in the same pass count as bound too.
//!
//! Work is organised per scope annotation. Scope layers are the highest
//! non-top-level layers with a child layer whose annotations form a chain
//! (peers, no peer overlap, aligned, contained by the parent). Under each
//! scope annotation the chains are processed finest layer first, so phones
//! place word boundaries before the words themselves are looked at.
//!
//! Generated offsets are stamped with the generated confidence, which never
//! ranks below the bound confidence. A second pass therefore sees nothing
//! to do.

use std::cmp::Reverse;
use std::collections::BTreeSet;

use tracing::{debug, trace, warn};

use crate::config::OffsetConfig;
use crate::errors::AgResult;
use crate::graph::Graph;
use crate::model::{AnchorId, Annotation, AnnotationId, Layer, LayerId};

/// Outcome of one generator pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OffsetReport {
    /// Anchors that received an offset.
    pub generated: usize,
    /// Anchors that could not be bounded, and skipped intervals.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DefaultOffsetGenerator {
    config: OffsetConfig,
}

struct Pass {
    generated: BTreeSet<AnchorId>,
    warned: BTreeSet<AnchorId>,
    report: OffsetReport,
}

impl DefaultOffsetGenerator {
    pub fn new(config: OffsetConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OffsetConfig {
        &self.config
    }

    /// Assign offsets to every anchor that can be bounded.
    pub fn transform(&self, graph: &mut Graph) -> AgResult<OffsetReport> {
        let mut pass = Pass {
            generated: BTreeSet::new(),
            warned: BTreeSet::new(),
            report: OffsetReport::default(),
        };

        let threshold = self.config.bound_confidence;
        if graph.anchors().all(|a| a.is_bound(threshold)) {
            debug!(graph = %graph.id, "no anchors below bound confidence");
            return Ok(pass.report);
        }

        for (scope, chain_layers) in scope_layers(graph) {
            let parents: Vec<AnnotationId> = graph
                .all(&scope)
                .into_iter()
                .filter(|a| !a.is_destroyed() && !a.is_instant())
                .map(|a| a.id.clone())
                .collect();
            for parent_id in parents {
                for layer_id in &chain_layers {
                    let chain = chain_anchors(graph, &parent_id, layer_id);
                    self.interpolate(graph, &chain, &mut pass)?;
                }
            }
        }

        // anchors no chain reached
        let stragglers: Vec<AnchorId> = graph
            .anchors()
            .filter(|a| a.offset.is_none() && !pass.warned.contains(&a.id))
            .map(|a| a.id.clone())
            .collect();
        for id in stragglers {
            unresolved(&mut pass, &id, "is not on any chain");
        }

        pass.report.generated = pass.generated.len();
        debug!(
            graph = %graph.id,
            generated = pass.report.generated,
            warnings = pass.report.warnings.len(),
            "default offsets"
        );
        Ok(pass.report)
    }

    fn bound_offset(&self, graph: &Graph, id: &str, pass: &Pass) -> Option<f64> {
        let anchor = graph.get_anchor(id)?;
        let offset = anchor.offset?;
        (anchor.is_bound(self.config.bound_confidence) || pass.generated.contains(id))
            .then_some(offset)
    }

    fn interpolate(&self, graph: &mut Graph, chain: &[AnchorId], pass: &mut Pass) -> AgResult<()> {
        let mut last: Option<(&str, f64)> = None;
        let mut run: Vec<&str> = Vec::new();

        for id in chain {
            let id = id.as_str();
            let Some(offset) = self.bound_offset(graph, id, pass) else {
                run.push(id);
                continue;
            };
            if !run.is_empty() {
                match last {
                    Some(lo) => self.fill(graph, lo, &run, (id, offset), pass)?,
                    None => {
                        for u in &run {
                            unresolved(pass, u, "has no bound anchor before it");
                        }
                    }
                }
                run.clear();
            }
            last = Some((id, offset));
        }
        for u in &run {
            unresolved(pass, u, "has no bound anchor after it");
        }
        Ok(())
    }

    /// Place `run` between the bound anchors `lo` and `hi`.
    fn fill<'c>(
        &self,
        graph: &mut Graph,
        mut lo: (&'c str, f64),
        mut run: &[&'c str],
        mut hi: (&'c str, f64),
        pass: &mut Pass,
    ) -> AgResult<()> {
        // no annotation between them: they are the same point in time
        if let Some((first, rest)) = run.split_first() {
            if !graph.has_annotation_between(lo.0, first) {
                self.assign(graph, first, lo.1, pass)?;
                lo = (*first, lo.1);
                run = rest;
            }
        }
        if let Some((last, rest)) = run.split_last() {
            if !graph.has_annotation_between(last, hi.0) {
                self.assign(graph, last, hi.1, pass)?;
                hi = (*last, hi.1);
                run = rest;
            }
        }
        if run.is_empty() {
            return Ok(());
        }

        let duration = hi.1 - lo.1;
        if duration < 0.0 {
            let msg = format!(
                "skipped {} anchors between {} ({}) and {} ({}): negative duration",
                run.len(),
                lo.0,
                lo.1,
                hi.0,
                hi.1
            );
            warn!(from = lo.0, to = hi.0, "{msg}");
            pass.report.warnings.push(msg);
            for u in run {
                pass.warned.insert(u.to_string());
            }
            return Ok(());
        }

        let step = duration / (run.len() + 1) as f64;
        for (i, id) in run.iter().enumerate() {
            self.assign(graph, id, lo.1 + step * (i + 1) as f64, pass)?;
        }
        Ok(())
    }

    fn assign(&self, graph: &mut Graph, id: &str, offset: f64, pass: &mut Pass) -> AgResult<()> {
        trace!(anchor = id, offset, "generate offset");
        graph.set_anchor_offset(id, Some(offset))?;
        graph.set_anchor_confidence(id, self.config.generated_confidence)?;
        pass.generated.insert(id.to_string());
        Ok(())
    }
}

fn unresolved(pass: &mut Pass, id: &str, why: &str) {
    if !pass.warned.insert(id.to_string()) {
        return;
    }
    debug!(anchor = id, "unresolved anchor {why}");
    pass.report.warnings.push(format!("anchor {id} {why}"));
}

fn chains(layer: &Layer) -> bool {
    layer.peers && !layer.peers_overlap && layer.is_aligned() && layer.parent_includes
}

/// Scope layers with their chain layers, finest first.
fn scope_layers(graph: &Graph) -> Vec<(LayerId, Vec<LayerId>)> {
    let schema = graph.schema();
    let top_down = schema.layers_top_down();
    let mut scopes: Vec<&Layer> = Vec::new();

    for layer in &top_down {
        if layer.is_top_level() || !schema.children_of(Some(&layer.id)).into_iter().any(chains) {
            continue;
        }
        let covered = schema
            .ancestors(&layer.id)
            .iter()
            .any(|a| scopes.iter().any(|s| s.id == a.id));
        if !covered {
            scopes.push(layer);
        }
    }

    scopes
        .into_iter()
        .map(|scope| {
            let mut layers: Vec<(usize, usize, LayerId)> = top_down
                .iter()
                .enumerate()
                .filter(|(_, l)| chains(l))
                .filter_map(|(pos, l)| {
                    let depth = schema.descendant_depth(&scope.id, &l.id)?;
                    (depth > 0).then(|| (depth, pos, l.id.clone()))
                })
                .collect();
            layers.sort_by_key(|(depth, pos, _)| (Reverse(*depth), *pos));
            (
                scope.id.clone(),
                layers.into_iter().map(|(_, _, id)| id).collect(),
            )
        })
        .collect()
}

/// Anchors of the scope's descendants on a layer, bracketed by the scope's
/// own boundaries, in timeline order without repeats.
fn chain_anchors(graph: &Graph, parent_id: &str, layer_id: &str) -> Vec<AnchorId> {
    let Some(parent) = graph.get_annotation(parent_id) else {
        return Vec::new();
    };
    let mut members: Vec<&Annotation> = graph
        .descendants_on(parent, layer_id)
        .into_iter()
        .filter(|a| !a.is_destroyed())
        .collect();
    graph.sort_annotations(&mut members);

    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut out = Vec::new();
    let ids = std::iter::once(parent.start_id.as_str())
        .chain(
            members
                .iter()
                .flat_map(|a| [a.start_id.as_str(), a.end_id.as_str()]),
        )
        .chain(std::iter::once(parent.end_id.as_str()));
    for id in ids {
        if graph.get_anchor(id).is_some() && seen.insert(id) {
            out.push(id.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Anchor, Confidence, Schema};

    /// turn [0,10] with three words on unresolved interior anchors.
    fn graph() -> Graph {
        let mut g = Graph::new("g", Schema::default_transcript());
        g.add_anchor(Anchor::at("a0", 0.0)).unwrap();
        g.add_anchor(Anchor::at("a9", 9.0)).unwrap();
        g.add_anchor(Anchor::unresolved("x1")).unwrap();
        g.add_anchor(Anchor::unresolved("x2")).unwrap();
        g.add_annotation(Annotation::new("p", "participant", "Ann", "a0", "a9"))
            .unwrap();
        g.add_annotation(Annotation::new("t", "turn", "Ann", "a0", "a9").with_parent("p"))
            .unwrap();
        for (id, s, e) in [("w1", "a0", "x1"), ("w2", "x1", "x2"), ("w3", "x2", "a9")] {
            g.add_annotation(Annotation::new(id, "word", id, s, e).with_parent("t"))
                .unwrap();
        }
        g.commit();
        g
    }

    #[test]
    fn spreads_evenly_and_stamps_default_confidence() {
        let mut g = graph();
        let report = DefaultOffsetGenerator::default().transform(&mut g).unwrap();
        assert_eq!(report.generated, 2);
        assert!(report.warnings.is_empty());
        assert_eq!(g.offset_of("x1"), Some(3.0));
        assert_eq!(g.offset_of("x2"), Some(6.0));
        assert_eq!(g.get_anchor("x1").unwrap().confidence, Confidence::Default);
    }

    #[test]
    fn second_pass_changes_nothing() {
        let mut g = graph();
        let gen = DefaultOffsetGenerator::default();
        gen.transform(&mut g).unwrap();
        g.commit();
        let report = gen.transform(&mut g).unwrap();
        assert_eq!(report.generated, 0);
        assert!(!g.has_pending_changes());
    }

    #[test]
    fn pause_collapses_onto_neighbour() {
        let mut g = Graph::new("g", Schema::default_transcript());
        g.add_anchor(Anchor::at("a0", 0.0)).unwrap();
        g.add_anchor(Anchor::at("a10", 10.0)).unwrap();
        g.add_anchor(Anchor::unresolved("b1")).unwrap();
        g.add_anchor(Anchor::unresolved("b2")).unwrap();
        g.add_annotation(Annotation::new("p", "participant", "Ann", "a0", "a10"))
            .unwrap();
        g.add_annotation(Annotation::new("t", "turn", "Ann", "a0", "a10").with_parent("p"))
            .unwrap();
        g.add_annotation(Annotation::new("w", "word", "hi", "b1", "b2").with_parent("t"))
            .unwrap();

        DefaultOffsetGenerator::default().transform(&mut g).unwrap();
        assert_eq!(g.offset_of("b1"), Some(0.0));
        assert_eq!(g.offset_of("b2"), Some(10.0));
    }

    #[test]
    fn unbounded_anchor_is_a_warning() {
        let mut g = graph();
        g.add_anchor(Anchor::unresolved("lost")).unwrap();
        let report = DefaultOffsetGenerator::default().transform(&mut g).unwrap();
        assert_eq!(g.offset_of("lost"), None);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("lost"));
    }

    #[test]
    fn manual_offsets_are_never_moved() {
        let mut g = graph();
        g.set_anchor_offset("x1", Some(1.0)).unwrap();
        g.set_anchor_confidence("x1", Confidence::Manual).unwrap();
        DefaultOffsetGenerator::default().transform(&mut g).unwrap();
        assert_eq!(g.offset_of("x1"), Some(1.0));
        assert_eq!(g.offset_of("x2"), Some(5.0));
    }
}
