//! Fragment extraction and merge-back.
//!
//! A fragment is a deep copy of part of a graph: the annotations on selected
//! layers that lie inside a time window, plus whatever ancestors they need to
//! stay self-contained. Fragments share nothing with their source, so they
//! can be handed to another thread or process.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::errors::AgResult;
use crate::model::{
    canonical, Alignment, Anchor, AnchorId, Annotation, AnnotationId, ChangeStatus, Confidence,
    LayerId,
};

use super::Graph;

/// Where a fragment came from.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentInfo {
    pub source_graph_id: String,
    pub start: f64,
    pub end: f64,
    pub layer_ids: Vec<LayerId>,
    /// Total applied by `shift_anchors` since extraction.
    pub shift: f64,
    /// Ancestor anchors whose offsets were clamped to the window.
    pub clamped_anchors: BTreeSet<AnchorId>,
}

impl FragmentInfo {
    /// `{graph}__{start}-{end}` with millisecond precision.
    pub fn fragment_id(graph_id: &str, start: f64, end: f64) -> String {
        format!("{graph_id}__{start:.3}-{end:.3}")
    }
}

impl Graph {
    /// Extract the annotations on `layer_ids` that lie within `[start, end]`.
    ///
    /// Ancestors of included annotations are copied as stand-ins even when
    /// they extend past the window; their anchors outside the window are
    /// clamped to it. Top-level tag layers other than the participant layer
    /// are copied whole. The fragment always has an anchor at `end`.
    pub fn get_fragment(&self, start: f64, end: f64, layer_ids: &[&str]) -> Graph {
        let id = FragmentInfo::fragment_id(&self.id, start, end);
        let mut fragment = Graph::with_config(id, self.schema.clone(), self.config.clone());
        fragment.next_id = self.next_id;

        let eps = self.config.anchor_epsilon;
        let mut clamped = BTreeSet::new();
        let wanted: BTreeSet<&str> = layer_ids.iter().copied().collect();
        let participant = self
            .schema
            .participant_layer_id
            .as_deref()
            .unwrap_or(canonical::PARTICIPANT);

        for layer in self.schema.layers_top_down() {
            if !wanted.contains(layer.id.as_str()) {
                continue;
            }
            let attribute_layer = layer.is_top_level()
                && layer.alignment == Alignment::None
                && layer.id != participant;

            for a in self.all(&layer.id) {
                if a.is_destroyed() {
                    continue;
                }
                let inside = attribute_layer
                    || matches!(
                        (self.offset_min(&a.start_id), self.offset_max(&a.end_id)),
                        (Some(s), Some(e)) if s >= start - eps && e <= end + eps
                    );
                if !inside {
                    continue;
                }
                let window = (start, end);
                self.copy_into(&mut fragment, a, window, &mut clamped);
                self.copy_ancestors_into(&mut fragment, a, window, &mut clamped);
            }
        }

        if fragment.find_anchor_at(end, Confidence::Unknown).is_none() {
            fragment.create_anchor_at(end, Confidence::Manual);
        }

        fragment.fragment = Some(FragmentInfo {
            source_graph_id: self.id.clone(),
            start,
            end,
            layer_ids: layer_ids.iter().map(|s| s.to_string()).collect(),
            shift: 0.0,
            clamped_anchors: clamped,
        });
        // start tracking from a clean state
        fragment.commit();

        debug!(
            graph = %self.id,
            fragment = %fragment.id,
            annotations = fragment.annotation_count(),
            anchors = fragment.anchor_count(),
            "extract fragment"
        );
        fragment
    }

    fn copy_into(
        &self,
        fragment: &mut Graph,
        a: &Annotation,
        (start, end): (f64, f64),
        clamped: &mut BTreeSet<AnchorId>,
    ) {
        if fragment.annotations.contains_key(&a.id) {
            return;
        }
        for anchor_id in [&a.start_id, &a.end_id] {
            if fragment.anchors.contains_key(anchor_id) {
                continue;
            }
            if let Some(anchor) = self.anchors.get(anchor_id) {
                let mut copy = anchor.clone();
                if let Some(o) = copy.offset {
                    let inside = o.max(start).min(end);
                    if inside != o {
                        copy.offset = Some(inside);
                        clamped.insert(copy.id.clone());
                    }
                }
                fragment.insert_anchor_copy(copy);
            }
        }
        fragment.insert_copy(a.clone());
    }

    fn copy_ancestors_into(
        &self,
        fragment: &mut Graph,
        a: &Annotation,
        window: (f64, f64),
        clamped: &mut BTreeSet<AnchorId>,
    ) {
        let mut current = a;
        for _ in 0..self.annotations.len() {
            let Some(parent) = current
                .parent_id
                .as_deref()
                .and_then(|pid| self.annotations.get(pid))
            else {
                break;
            };
            if fragment.annotations.contains_key(&parent.id) {
                break;
            }
            self.copy_into(fragment, parent, window, clamped);
            current = parent;
        }
    }

    /// Apply the pending changes of an edited fragment to this graph.
    ///
    /// Offsets are mapped back through any shift applied to the fragment.
    /// Offsets of clamped stand-in anchors are never written back. Created
    /// entities keep their fragment id unless it is already taken here, in
    /// which case a fresh id is generated and references are
    /// remapped. Returns the number of changes applied.
    pub fn merge_fragment(&mut self, fragment: &Graph) -> AgResult<usize> {
        let shift = fragment.fragment.as_ref().map_or(0.0, |f| f.shift);
        let clamped = fragment.fragment.as_ref().map(|f| &f.clamped_anchors);
        let eps = self.config.anchor_epsilon;
        let mut anchor_map: BTreeMap<AnchorId, AnchorId> = BTreeMap::new();
        let mut annotation_map: BTreeMap<AnnotationId, AnnotationId> = BTreeMap::new();
        let mut applied = 0usize;

        for anchor in fragment.anchors.values() {
            let offset = anchor.offset.map(|o| o - shift);
            match anchor.change {
                ChangeStatus::Create => {
                    let mut copy = Anchor {
                        offset,
                        ..anchor.clone()
                    };
                    if self.anchors.contains_key(&copy.id) {
                        copy.id = self.new_id();
                        anchor_map.insert(anchor.id.clone(), copy.id.clone());
                    }
                    self.add_anchor(copy)?;
                    applied += 1;
                }
                ChangeStatus::Update => {
                    let Some(current) = self.anchors.get(&anchor.id) else {
                        continue;
                    };
                    let stand_in = clamped.is_some_and(|c| c.contains(&anchor.id));
                    let moved = !stand_in
                        && match (current.offset, offset) {
                            (Some(a), Some(b)) => (a - b).abs() > eps,
                            (a, b) => a.is_some() != b.is_some(),
                        };
                    let reconfident = current.confidence != anchor.confidence;
                    if moved {
                        self.set_anchor_offset(&anchor.id, offset)?;
                    }
                    if reconfident {
                        self.set_anchor_confidence(&anchor.id, anchor.confidence)?;
                    }
                    if moved || reconfident {
                        applied += 1;
                    }
                }
                ChangeStatus::Destroy => {
                    if self.anchors.contains_key(&anchor.id) {
                        self.destroy_anchor(&anchor.id)?;
                        applied += 1;
                    }
                }
                ChangeStatus::NoChange => {}
            }
        }

        let remap_anchor = |id: &str, map: &BTreeMap<AnchorId, AnchorId>| {
            map.get(id).cloned().unwrap_or_else(|| id.to_string())
        };

        // creates in hierarchy order so new parents exist before children
        let mut created: Vec<&Annotation> = fragment
            .annotations
            .values()
            .filter(|a| a.change == ChangeStatus::Create)
            .collect();
        let depth = |a: &Annotation| self.schema.ancestors(&a.layer_id).len();
        created.sort_by_key(|a| (depth(a), fragment.sort_key(a)));
        let created: Vec<Annotation> = created.into_iter().cloned().collect();

        for a in created {
            let original_id = a.id.clone();
            let mut copy = a;
            if self.annotations.contains_key(&copy.id) {
                copy.id = self.new_id();
                annotation_map.insert(original_id, copy.id.clone());
            }
            copy.start_id = remap_anchor(&copy.start_id, &anchor_map);
            copy.end_id = remap_anchor(&copy.end_id, &anchor_map);
            copy.parent_id = copy
                .parent_id
                .map(|p| annotation_map.get(&p).cloned().unwrap_or(p));
            self.add_annotation(copy)?;
            applied += 1;
        }

        for a in fragment.annotations.values() {
            match a.change {
                ChangeStatus::Update => {
                    if !self.annotations.contains_key(&a.id) {
                        continue;
                    }
                    self.set_label(&a.id, a.label.clone())?;
                    self.set_confidence(&a.id, a.confidence)?;
                    self.set_start(&a.id, &remap_anchor(&a.start_id, &anchor_map))?;
                    self.set_end(&a.id, &remap_anchor(&a.end_id, &anchor_map))?;
                    let parent = a
                        .parent_id
                        .as_ref()
                        .map(|p| annotation_map.get(p).cloned().unwrap_or_else(|| p.clone()));
                    self.set_parent(&a.id, parent.as_deref())?;
                    applied += 1;
                }
                ChangeStatus::Destroy => {
                    if self.annotations.contains_key(&a.id) {
                        self.destroy(&a.id)?;
                        applied += 1;
                    }
                }
                ChangeStatus::Create | ChangeStatus::NoChange => {}
            }
        }

        debug!(graph = %self.id, fragment = %fragment.id, applied, "merge fragment");
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::Graph;
    use crate::model::{Anchor, Annotation, Confidence, Schema};

    fn two_utterances() -> Graph {
        let mut g = Graph::new("g", Schema::default_transcript());
        for (id, o) in [("a0", 0.0), ("a2", 2.0), ("a3", 3.0), ("a5", 5.0), ("a9", 9.0)] {
            g.add_anchor(Anchor::at(id, o)).unwrap();
        }
        g.add_annotation(Annotation::new("p", "participant", "Ann", "a0", "a9"))
            .unwrap();
        g.add_annotation(Annotation::new("t", "turn", "Ann", "a0", "a9").with_parent("p"))
            .unwrap();
        g.add_annotation(Annotation::new("u1", "utterance", "x y", "a0", "a5").with_parent("t"))
            .unwrap();
        g.add_annotation(Annotation::new("u2", "utterance", "z", "a5", "a9").with_parent("t"))
            .unwrap();
        g.add_annotation(Annotation::new("w1", "word", "x", "a2", "a3").with_parent("t"))
            .unwrap();
        g.add_annotation(Annotation::new("w2", "word", "y", "a3", "a5").with_parent("t"))
            .unwrap();
        g.add_annotation(Annotation::new("w3", "word", "z", "a5", "a9").with_parent("t"))
            .unwrap();
        g.commit();
        g
    }

    #[test]
    fn fragment_keeps_window_and_ancestors() {
        let g = two_utterances();
        let f = g.get_fragment(2.0, 5.0, &["word"]);

        assert_eq!(f.id, "g__2.000-5.000");
        assert!(f.get_annotation("w1").is_some());
        assert!(f.get_annotation("w2").is_some());
        assert!(f.get_annotation("w3").is_none());
        // stand-in ancestors
        assert!(f.get_annotation("t").is_some());
        assert!(f.get_annotation("p").is_some());
        // turn anchors clamped to the window
        assert_eq!(f.offset_of("a0"), Some(2.0));
        assert_eq!(f.offset_of("a9"), Some(5.0));
        assert!(!f.has_pending_changes());
        assert_eq!(f.fragment_info().unwrap().source_graph_id, "g");
    }

    #[test]
    fn fragment_is_independent_of_source() {
        let g = two_utterances();
        let mut f = g.get_fragment(0.0, 5.0, &["word", "utterance"]);
        f.set_label("w1", "changed").unwrap();
        assert_eq!(g.get_annotation("w1").unwrap().label, "x");
    }

    #[test]
    fn shifted_fragment_preserves_distances() {
        let g = two_utterances();
        let mut f = g.get_fragment(2.0, 5.0, &["word"]);
        f.shift_anchors(-2.0);
        assert_eq!(f.offset_of("a2"), Some(0.0));
        assert_eq!(f.offset_of("a3"), Some(1.0));
        assert_eq!(f.offset_of("a5"), Some(3.0));
    }

    #[test]
    fn merge_applies_fragment_edits() {
        let mut g = two_utterances();
        let mut f = g.get_fragment(2.0, 5.0, &["word"]);
        f.shift_anchors(-2.0);

        f.set_label("w1", "ex").unwrap();
        f.destroy("w2").unwrap();
        let mid = f.create_anchor_at(2.0, Confidence::Automatic);
        f.add_annotation(Annotation::new("n1", "word", "new", "a3", &mid).with_parent("t"))
            .unwrap();

        let applied = g.merge_fragment(&f).unwrap();
        assert_eq!(applied, 4);
        assert_eq!(g.get_annotation("w1").unwrap().label, "ex");
        assert!(g.get_annotation("w2").unwrap().is_destroyed());
        let n1 = g.get_annotation("n1").unwrap();
        assert_eq!(g.offset_of(&n1.end_id), Some(4.0));
        // unshifted anchors were not touched
        assert_eq!(g.get_anchor("a2").unwrap().change, crate::model::ChangeStatus::NoChange);
    }
}
