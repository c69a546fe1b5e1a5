//! Lookup indices maintained alongside the anchor and annotation arenas.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::model::{Anchor, AnchorId, Annotation, AnnotationId, LayerId};

/// `f64` wrapper ordered by `total_cmp`, usable as a map key.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OffsetKey(pub f64);

impl PartialEq for OffsetKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OffsetKey {}

impl PartialOrd for OffsetKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OffsetKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Siblings are grouped by (parent, layer).
pub(crate) type ChildKey = (Option<AnnotationId>, LayerId);

#[derive(Debug, Clone, Default)]
pub(crate) struct GraphIndex {
    pub by_offset: BTreeMap<OffsetKey, BTreeSet<AnchorId>>,
    pub by_layer: BTreeMap<LayerId, BTreeSet<AnnotationId>>,
    pub by_parent: BTreeMap<ChildKey, BTreeSet<AnnotationId>>,
    pub anchor_refs: BTreeMap<AnchorId, BTreeSet<AnnotationId>>,
}

impl GraphIndex {
    pub fn insert_anchor(&mut self, anchor: &Anchor) {
        if let Some(o) = anchor.offset {
            self.by_offset
                .entry(OffsetKey(o))
                .or_default()
                .insert(anchor.id.clone());
        }
    }

    pub fn remove_anchor(&mut self, anchor: &Anchor) {
        if let Some(o) = anchor.offset {
            remove_from(&mut self.by_offset, &OffsetKey(o), &anchor.id);
        }
    }

    pub fn insert_annotation(&mut self, a: &Annotation) {
        self.by_layer
            .entry(a.layer_id.clone())
            .or_default()
            .insert(a.id.clone());
        self.by_parent
            .entry(child_key(a))
            .or_default()
            .insert(a.id.clone());
        self.insert_refs(a);
    }

    pub fn remove_annotation(&mut self, a: &Annotation) {
        remove_from(&mut self.by_layer, &a.layer_id, &a.id);
        remove_from(&mut self.by_parent, &child_key(a), &a.id);
        self.remove_refs(a);
    }

    pub fn insert_refs(&mut self, a: &Annotation) {
        for anchor_id in [&a.start_id, &a.end_id] {
            self.anchor_refs
                .entry(anchor_id.clone())
                .or_default()
                .insert(a.id.clone());
        }
    }

    pub fn remove_refs(&mut self, a: &Annotation) {
        for anchor_id in [&a.start_id, &a.end_id] {
            remove_from(&mut self.anchor_refs, anchor_id, &a.id);
        }
    }

    pub fn siblings(&self, parent_id: Option<&str>, layer_id: &str) -> Option<&BTreeSet<AnnotationId>> {
        self.by_parent
            .get(&(parent_id.map(str::to_string), layer_id.to_string()))
    }

    pub fn is_referenced(&self, anchor_id: &str) -> bool {
        self.anchor_refs
            .get(anchor_id)
            .is_some_and(|refs| !refs.is_empty())
    }
}

pub(crate) fn child_key(a: &Annotation) -> ChildKey {
    (a.parent_id.clone(), a.layer_id.clone())
}

fn remove_from<K: Ord>(map: &mut BTreeMap<K, BTreeSet<String>>, key: &K, id: &str) {
    if let Some(set) = map.get_mut(key) {
        set.remove(id);
        if set.is_empty() {
            map.remove(key);
        }
    }
}
