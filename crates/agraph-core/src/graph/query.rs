//! Ordered queries over a graph.
//!
//! Every list returned here is sorted by `AnnotationKey`: start offset,
//! ordinal, id. An unresolved start is replaced by the nearest bound
//! reachable through preceding annotations (`offset_min`) so partially
//! aligned sequences still sort in timeline order.

use std::collections::BTreeSet;

use crate::determinism::ordering::{compare_offsets, AnnotationKey};
use crate::model::{Anchor, Annotation, ChangeStatus, ROOT_LAYER_ID};

use super::Graph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Backward,
    Forward,
}

impl Graph {
    /// Earliest resolved anchor.
    pub fn start(&self) -> Option<&Anchor> {
        self.index
            .by_offset
            .values()
            .flat_map(|ids| ids.iter())
            .find_map(|id| self.anchors.get(id).filter(|a| a.change != ChangeStatus::Destroy))
    }

    /// Latest resolved anchor.
    pub fn end(&self) -> Option<&Anchor> {
        self.index
            .by_offset
            .values()
            .rev()
            .flat_map(|ids| ids.iter().rev())
            .find_map(|id| self.anchors.get(id).filter(|a| a.change != ChangeStatus::Destroy))
    }

    /// All anchors sorted by offset (unresolved last), then id.
    pub fn sorted_anchors(&self) -> Vec<&Anchor> {
        let mut out: Vec<&Anchor> = self.anchors.values().collect();
        out.sort_by(|a, b| compare_offsets(a.offset, b.offset).then_with(|| a.id.cmp(&b.id)));
        out
    }

    /// Greatest lower bound for an anchor's offset.
    ///
    /// The anchor's own offset if resolved, otherwise the latest resolved
    /// offset reachable by walking backwards through annotations that end
    /// at it.
    pub fn offset_min(&self, anchor_id: &str) -> Option<f64> {
        self.offset_bound(anchor_id, Direction::Backward)
    }

    /// Least upper bound for an anchor's offset, walking forwards.
    pub fn offset_max(&self, anchor_id: &str) -> Option<f64> {
        self.offset_bound(anchor_id, Direction::Forward)
    }

    fn offset_bound(&self, anchor_id: &str, dir: Direction) -> Option<f64> {
        let mut best: Option<f64> = None;
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut stack: Vec<&str> = vec![anchor_id];

        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let Some(anchor) = self.anchors.get(id) else {
                continue;
            };
            if let Some(o) = anchor.offset {
                best = Some(match (best, dir) {
                    (None, _) => o,
                    (Some(b), Direction::Backward) => b.max(o),
                    (Some(b), Direction::Forward) => b.min(o),
                });
                continue;
            }
            for ann_id in self.index.anchor_refs.get(id).into_iter().flatten() {
                let Some(a) = self.annotations.get(ann_id) else {
                    continue;
                };
                if a.is_instant() {
                    continue;
                }
                match dir {
                    Direction::Backward if a.end_id == id => stack.push(&a.start_id),
                    Direction::Forward if a.start_id == id => stack.push(&a.end_id),
                    _ => {}
                }
            }
        }
        best
    }

    /// Sort key used by every ordered query.
    pub fn sort_key(&self, a: &Annotation) -> AnnotationKey {
        AnnotationKey {
            start: self.offset_min(&a.start_id),
            ordinal: a.ordinal,
            id: a.id.clone(),
        }
    }

    /// Sort annotations in place by `sort_key`.
    pub fn sort_annotations(&self, items: &mut [&Annotation]) {
        items.sort_by_cached_key(|a| self.sort_key(a));
    }

    /// Every annotation on a layer, in timeline order.
    pub fn all(&self, layer_id: &str) -> Vec<&Annotation> {
        let mut out: Vec<&Annotation> = self
            .index
            .by_layer
            .get(layer_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.annotations.get(id))
            .collect();
        self.sort_annotations(&mut out);
        out
    }

    /// Annotations on a layer in id order, without sorting.
    pub fn annotations_on<'a>(&'a self, layer_id: &str) -> impl Iterator<Item = &'a Annotation> + 'a {
        self.index
            .by_layer
            .get(layer_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.annotations.get(id))
    }

    /// True when some live annotation runs from anchor `from` to anchor `to`.
    pub fn has_annotation_between(&self, from: &str, to: &str) -> bool {
        self.index
            .anchor_refs
            .get(from)
            .into_iter()
            .flatten()
            .filter_map(|id| self.annotations.get(id))
            .any(|a| !a.is_destroyed() && a.start_id == from && a.end_id == to)
    }

    /// Children of `parent_id` (`None` for top-level) on a layer, in order.
    pub fn children(&self, parent_id: Option<&str>, layer_id: &str) -> Vec<&Annotation> {
        let mut out: Vec<&Annotation> = self
            .index
            .siblings(parent_id, layer_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.annotations.get(id))
            .collect();
        self.sort_annotations(&mut out);
        out
    }

    /// Annotations on `layer_id` related to the scope annotation.
    ///
    /// - same layer: the scope itself
    /// - ancestor layer: the scope's ancestor on that layer
    /// - descendant layer: the scope's descendants on that layer
    /// - otherwise: annotations on the layer under the nearest common
    ///   ancestor that overlap the scope in time
    pub fn list(&self, scope_id: &str, layer_id: &str) -> Vec<&Annotation> {
        let Some(scope) = self.annotations.get(scope_id) else {
            return Vec::new();
        };
        if scope.layer_id == layer_id {
            return vec![scope];
        }
        if layer_id == ROOT_LAYER_ID {
            return Vec::new();
        }
        let schema = &self.schema;

        if schema.is_ancestor(layer_id, &scope.layer_id) {
            return self.ancestor_on(scope, layer_id).into_iter().collect();
        }

        let mut out = if schema.is_ancestor(&scope.layer_id, layer_id) {
            self.descendants_on(scope, layer_id)
        } else {
            let candidates = match schema.first_common_ancestor(&scope.layer_id, layer_id) {
                Some(common) => match self.ancestor_on(scope, &common.id) {
                    Some(anc) => self.descendants_on(anc, layer_id),
                    None => Vec::new(),
                },
                None => self.all(layer_id),
            };
            let window = self.span_of(scope);
            candidates
                .into_iter()
                .filter(|a| match (window, self.span_of(a)) {
                    (Some(w), Some(s)) => spans_overlap(w, s),
                    _ => true,
                })
                .collect()
        };
        self.sort_annotations(&mut out);
        out
    }

    /// First of `list(scope_id, layer_id)`.
    pub fn first(&self, scope_id: &str, layer_id: &str) -> Option<&Annotation> {
        self.list(scope_id, layer_id).into_iter().next()
    }

    /// Last of `list(scope_id, layer_id)`.
    pub fn last(&self, scope_id: &str, layer_id: &str) -> Option<&Annotation> {
        self.list(scope_id, layer_id).into_iter().last()
    }

    /// The scope's own annotation on a layer. Same as `first`.
    pub fn my(&self, scope_id: &str, layer_id: &str) -> Option<&Annotation> {
        self.first(scope_id, layer_id)
    }

    /// Labels on a layer in timeline order.
    pub fn labels(&self, layer_id: &str) -> Vec<&str> {
        self.all(layer_id).into_iter().map(|a| a.label.as_str()).collect()
    }

    /// Resolved annotations on a layer whose span overlaps `[start, end]`.
    pub fn overlapping(&self, start: f64, end: f64, layer_id: &str) -> Vec<&Annotation> {
        self.all(layer_id)
            .into_iter()
            .filter(|a| {
                match (self.offset_of(&a.start_id), self.offset_of(&a.end_id)) {
                    (Some(s), Some(e)) => spans_overlap((start, end), (s, e)),
                    _ => false,
                }
            })
            .collect()
    }

    /// True when `outer` temporally includes `inner`. Unresolved is false.
    pub fn includes(&self, outer_id: &str, inner_id: &str) -> bool {
        let (Some(outer), Some(inner)) = (
            self.annotations.get(outer_id),
            self.annotations.get(inner_id),
        ) else {
            return false;
        };
        match (self.resolved_span(outer), self.resolved_span(inner)) {
            (Some((os, oe)), Some((is, ie))) => os <= is && ie <= oe,
            _ => false,
        }
    }

    /// True when `offset` falls within the annotation's resolved span.
    pub fn includes_offset(&self, annotation_id: &str, offset: f64) -> bool {
        self.annotations
            .get(annotation_id)
            .and_then(|a| self.resolved_span(a))
            .is_some_and(|(s, e)| s <= offset && offset <= e)
    }

    /// Walk up the parent chain to the annotation on `layer_id`.
    pub fn ancestor_on<'a>(&'a self, a: &'a Annotation, layer_id: &str) -> Option<&'a Annotation> {
        let mut current = a;
        // bounded walk: parent links may form a cycle in malformed input
        for _ in 0..=self.annotations.len() {
            if current.layer_id == layer_id {
                return Some(current);
            }
            current = self.annotations.get(current.parent_id.as_deref()?)?;
        }
        None
    }

    /// Descendants of `a` on `layer_id`, following the layer hierarchy down.
    pub fn descendants_on<'a>(&'a self, a: &'a Annotation, layer_id: &str) -> Vec<&'a Annotation> {
        let mut path: Vec<&str> = self
            .schema
            .ancestors(layer_id)
            .iter()
            .map(|l| l.id.as_str())
            .take_while(|id| *id != a.layer_id)
            .collect();
        path.reverse();
        path.push(layer_id);

        let mut frontier: Vec<&Annotation> = vec![a];
        for step in path {
            frontier = frontier
                .iter()
                .flat_map(|p| self.index.siblings(Some(p.id.as_str()), step).into_iter().flatten())
                .filter_map(|id| self.annotations.get(id))
                .collect();
        }
        frontier
    }

    fn resolved_span(&self, a: &Annotation) -> Option<(f64, f64)> {
        Some((self.offset_of(&a.start_id)?, self.offset_of(&a.end_id)?))
    }

    fn span_of(&self, a: &Annotation) -> Option<(f64, f64)> {
        Some((self.offset_min(&a.start_id)?, self.offset_max(&a.end_id)?))
    }
}

/// Interval overlap; a point overlaps an interval that contains it.
fn spans_overlap(a: (f64, f64), b: (f64, f64)) -> bool {
    if a.0 == a.1 || b.0 == b.1 {
        a.0 <= b.1 && b.0 <= a.1
    } else {
        a.0 < b.1 && b.0 < a.1
    }
}
