//! The annotation graph aggregate.
//!
//! A `Graph` owns every anchor and annotation of one transcript together
//! with its `Schema` and the log of changes since the last commit. The first
//! mutation after a commit keeps a copy of the committed state so
//! `rollback` can return to it.
//!
//! Ownership model:
//! - anchors and annotations live in id-keyed arenas owned by the graph
//! - annotations refer to anchors, parents and layers by id only
//! - all mutation goes through graph methods so ordinals, change status and
//!   the lookup indices stay consistent
//!
//! The graph is permissive: dangling anchor ids, unknown layers and missing
//! parents are legal intermediate states. They are reported by the
//! validator, never rejected here.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, trace};

use crate::config::GraphConfig;
use crate::errors::{AgError, AgResult};
use crate::model::{
    Anchor, AnchorId, Annotation, AnnotationId, Change, ChangeStatus, ChangeTarget, Confidence,
    Layer, Schema,
};

mod fragment;
mod index;
mod query;
mod transaction;

pub use fragment::FragmentInfo;
pub use transaction::Transaction;

use index::{child_key, ChildKey, GraphIndex, OffsetKey};

#[derive(Debug, Clone)]
pub struct Graph {
    pub id: String,
    config: GraphConfig,
    schema: Schema,
    anchors: BTreeMap<AnchorId, Anchor>,
    annotations: BTreeMap<AnnotationId, Annotation>,
    index: GraphIndex,
    changes: Vec<Change>,
    next_id: u64,
    fragment: Option<FragmentInfo>,
    committed: Option<Box<Committed>>,
}

/// State as of the last commit, captured on the first mutation after it.
#[derive(Debug, Clone)]
struct Committed {
    schema: Schema,
    anchors: BTreeMap<AnchorId, Anchor>,
    annotations: BTreeMap<AnnotationId, Annotation>,
    index: GraphIndex,
    next_id: u64,
    fragment: Option<FragmentInfo>,
}

impl Graph {
    pub fn new(id: impl Into<String>, schema: Schema) -> Self {
        Self::with_config(id, schema, GraphConfig::default())
    }

    pub fn with_config(id: impl Into<String>, schema: Schema, config: GraphConfig) -> Self {
        Self {
            id: id.into(),
            config,
            schema,
            anchors: BTreeMap::new(),
            annotations: BTreeMap::new(),
            index: GraphIndex::default(),
            changes: Vec::new(),
            next_id: 0,
            fragment: None,
            committed: None,
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn schema_mut(&mut self) -> &mut Schema {
        self.checkpoint();
        &mut self.schema
    }

    /// Shortcut for `schema().get_layer(id)`.
    pub fn layer(&self, id: &str) -> Option<&Layer> {
        self.schema.get_layer(id)
    }

    /// Window and source of this graph when it was produced by `get_fragment`.
    pub fn fragment_info(&self) -> Option<&FragmentInfo> {
        self.fragment.as_ref()
    }

    /// Changes recorded since the last commit, oldest first.
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Generate an id not used by any anchor or annotation.
    ///
    /// Ids are the configured prefix followed by a base-36 counter.
    pub fn new_id(&mut self) -> String {
        self.checkpoint();
        loop {
            self.next_id += 1;
            let candidate = format!("{}{}", self.config.id_prefix, base36(self.next_id));
            if !self.anchors.contains_key(&candidate) && !self.annotations.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    // ---- anchors -------------------------------------------------------

    pub fn get_anchor(&self, id: &str) -> Option<&Anchor> {
        self.anchors.get(id)
    }

    /// Anchors in id order.
    pub fn anchors(&self) -> impl Iterator<Item = &Anchor> {
        self.anchors.values()
    }

    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }

    /// Offset of an anchor, if the anchor exists and is resolved.
    pub fn offset_of(&self, anchor_id: &str) -> Option<f64> {
        self.anchors.get(anchor_id).and_then(|a| a.offset)
    }

    /// Add an anchor. An empty id is replaced with a generated one.
    pub fn add_anchor(&mut self, mut anchor: Anchor) -> AgResult<AnchorId> {
        self.checkpoint();
        if anchor.id.is_empty() {
            anchor.id = self.new_id();
        } else if self.anchors.contains_key(&anchor.id) {
            return Err(AgError::invariant(format!(
                "anchor id already present: {}",
                anchor.id
            )));
        }
        Ok(self.push_anchor(anchor))
    }

    fn push_anchor(&mut self, mut anchor: Anchor) -> AnchorId {
        self.checkpoint();
        anchor.change = ChangeStatus::Create;
        let id = anchor.id.clone();
        trace!(anchor = %id, offset = ?anchor.offset, "add anchor");

        self.index.insert_anchor(&anchor);
        self.changes
            .push(Change::new(ChangeStatus::Create, ChangeTarget::Anchor(id.clone())));
        self.anchors.insert(id.clone(), anchor);
        id
    }

    /// Create a new anchor at `offset`, even if one already exists there.
    pub fn create_anchor_at(&mut self, offset: f64, confidence: Confidence) -> AnchorId {
        let id = self.new_id();
        self.push_anchor(Anchor::at(id, offset).with_confidence(confidence))
    }

    /// Create a new anchor with no offset.
    pub fn create_unresolved_anchor(&mut self) -> AnchorId {
        let id = self.new_id();
        self.push_anchor(Anchor::unresolved(id))
    }

    /// Existing anchor within `anchor_epsilon` of `offset` whose confidence
    /// is at least `min_confidence`. The closest one wins, then the lowest id.
    pub fn find_anchor_at(&self, offset: f64, min_confidence: Confidence) -> Option<&Anchor> {
        let eps = self.config.anchor_epsilon;
        let lo = OffsetKey(offset - eps);
        let hi = OffsetKey(offset + eps);
        if hi < lo {
            return None;
        }

        self.index
            .by_offset
            .range(lo..=hi)
            .flat_map(|(_, ids)| ids.iter())
            .filter_map(|id| self.anchors.get(id))
            .filter(|a| a.confidence >= min_confidence && a.change != ChangeStatus::Destroy)
            .min_by(|a, b| {
                let da = (a.offset.unwrap_or(offset) - offset).abs();
                let db = (b.offset.unwrap_or(offset) - offset).abs();
                da.total_cmp(&db).then_with(|| a.id.cmp(&b.id))
            })
    }

    /// Reuse an anchor near `offset` with at least `confidence`, or create one.
    pub fn get_or_create_anchor_at(&mut self, offset: f64, confidence: Confidence) -> AnchorId {
        if let Some(existing) = self.find_anchor_at(offset, confidence) {
            return existing.id.clone();
        }
        self.create_anchor_at(offset, confidence)
    }

    /// Set (or clear) an anchor's offset.
    pub fn set_anchor_offset(&mut self, id: &str, offset: Option<f64>) -> AgResult<()> {
        self.checkpoint();
        let anchor = self
            .anchors
            .get_mut(id)
            .ok_or_else(|| AgError::not_found(format!("anchor {id}")))?;
        if anchor.offset == offset {
            return Ok(());
        }
        self.index.remove_anchor(anchor);
        anchor.offset = offset;
        anchor.change = anchor.change.updated();
        self.index.insert_anchor(anchor);
        self.changes
            .push(Change::update(ChangeTarget::Anchor(id.to_string()), "offset"));
        Ok(())
    }

    pub fn set_anchor_confidence(&mut self, id: &str, confidence: Confidence) -> AgResult<()> {
        self.checkpoint();
        let anchor = self
            .anchors
            .get_mut(id)
            .ok_or_else(|| AgError::not_found(format!("anchor {id}")))?;
        if anchor.confidence == confidence {
            return Ok(());
        }
        anchor.confidence = confidence;
        anchor.change = anchor.change.updated();
        self.changes
            .push(Change::update(ChangeTarget::Anchor(id.to_string()), "confidence"));
        Ok(())
    }

    /// Mark an anchor for removal at the next commit.
    pub fn destroy_anchor(&mut self, id: &str) -> AgResult<()> {
        self.checkpoint();
        let anchor = self
            .anchors
            .get_mut(id)
            .ok_or_else(|| AgError::not_found(format!("anchor {id}")))?;
        if anchor.change != ChangeStatus::Destroy {
            anchor.change = ChangeStatus::Destroy;
            self.changes
                .push(Change::new(ChangeStatus::Destroy, ChangeTarget::Anchor(id.to_string())));
        }
        Ok(())
    }

    /// Add `delta` to every resolved offset.
    pub fn shift_anchors(&mut self, delta: f64) {
        if delta == 0.0 {
            return;
        }
        let ids: Vec<AnchorId> = self
            .anchors
            .values()
            .filter(|a| a.offset.is_some())
            .map(|a| a.id.clone())
            .collect();
        debug!(graph = %self.id, delta, anchors = ids.len(), "shift anchors");
        self.checkpoint();
        if let Some(info) = self.fragment.as_mut() {
            info.shift += delta;
        }
        for id in ids {
            let shifted = self.offset_of(&id).map(|o| o + delta);
            // every id was collected from the arena above
            let _ = self.set_anchor_offset(&id, shifted);
        }
    }

    // ---- annotations ---------------------------------------------------

    pub fn get_annotation(&self, id: &str) -> Option<&Annotation> {
        self.annotations.get(id)
    }

    /// Annotations in id order, including ones pending destruction.
    pub fn annotations(&self) -> impl Iterator<Item = &Annotation> {
        self.annotations.values()
    }

    pub fn annotation_count(&self) -> usize {
        self.annotations.len()
    }

    /// Insert an annotation as a new child of its parent.
    ///
    /// The ordinal is one past the current maximum among same-layer,
    /// same-parent siblings. An empty id is replaced with a generated one.
    pub fn add_annotation(&mut self, mut annotation: Annotation) -> AgResult<AnnotationId> {
        self.checkpoint();
        if annotation.id.is_empty() {
            annotation.id = self.new_id();
        } else if self.annotations.contains_key(&annotation.id) {
            return Err(AgError::invariant(format!(
                "annotation id already present: {}",
                annotation.id
            )));
        }
        annotation.ordinal =
            self.max_ordinal(annotation.parent_id.as_deref(), &annotation.layer_id) + 1;
        annotation.change = ChangeStatus::Create;
        let id = annotation.id.clone();
        trace!(
            annotation = %id,
            layer = %annotation.layer_id,
            ordinal = annotation.ordinal,
            "add annotation"
        );

        self.index.insert_annotation(&annotation);
        self.changes.push(Change::new(
            ChangeStatus::Create,
            ChangeTarget::Annotation(id.clone()),
        ));
        self.annotations.insert(id.clone(), annotation);
        Ok(id)
    }

    /// Insert without touching ordinal or change status.
    pub(crate) fn insert_copy(&mut self, annotation: Annotation) {
        self.checkpoint();
        if let Some(old) = self.annotations.remove(&annotation.id) {
            self.index.remove_annotation(&old);
        }
        self.index.insert_annotation(&annotation);
        self.annotations.insert(annotation.id.clone(), annotation);
    }

    pub(crate) fn insert_anchor_copy(&mut self, anchor: Anchor) {
        self.checkpoint();
        if let Some(old) = self.anchors.remove(&anchor.id) {
            self.index.remove_anchor(&old);
        }
        self.index.insert_anchor(&anchor);
        self.anchors.insert(anchor.id.clone(), anchor);
    }

    /// Mark an annotation for removal at the next commit.
    ///
    /// It stays visible to queries until then.
    pub fn destroy(&mut self, id: &str) -> AgResult<()> {
        self.checkpoint();
        let a = self
            .annotations
            .get_mut(id)
            .ok_or_else(|| AgError::not_found(format!("annotation {id}")))?;
        if a.change != ChangeStatus::Destroy {
            a.change = ChangeStatus::Destroy;
            trace!(annotation = %id, "destroy annotation");
            self.changes.push(Change::new(
                ChangeStatus::Destroy,
                ChangeTarget::Annotation(id.to_string()),
            ));
        }
        Ok(())
    }

    /// Destroy every annotation on a layer. Returns how many were marked.
    pub fn destroy_all(&mut self, layer_id: &str) -> usize {
        let ids: Vec<AnnotationId> = self
            .index
            .by_layer
            .get(layer_id)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default();
        let mut n = 0;
        for id in ids {
            if self.annotations.get(&id).is_some_and(|a| !a.is_destroyed()) {
                let _ = self.destroy(&id);
                n += 1;
            }
        }
        n
    }

    pub fn set_label(&mut self, id: &str, label: impl Into<String>) -> AgResult<()> {
        self.checkpoint();
        let label = label.into();
        let a = self
            .annotations
            .get_mut(id)
            .ok_or_else(|| AgError::not_found(format!("annotation {id}")))?;
        if a.label == label {
            return Ok(());
        }
        a.label = label;
        a.change = a.change.updated();
        self.changes
            .push(Change::update(ChangeTarget::Annotation(id.to_string()), "label"));
        Ok(())
    }

    pub fn set_confidence(&mut self, id: &str, confidence: Confidence) -> AgResult<()> {
        self.checkpoint();
        let a = self
            .annotations
            .get_mut(id)
            .ok_or_else(|| AgError::not_found(format!("annotation {id}")))?;
        if a.confidence == confidence {
            return Ok(());
        }
        a.confidence = confidence;
        a.change = a.change.updated();
        self.changes
            .push(Change::update(ChangeTarget::Annotation(id.to_string()), "confidence"));
        Ok(())
    }

    pub fn set_start(&mut self, id: &str, anchor_id: &str) -> AgResult<()> {
        self.set_boundary(id, anchor_id, true)
    }

    pub fn set_end(&mut self, id: &str, anchor_id: &str) -> AgResult<()> {
        self.set_boundary(id, anchor_id, false)
    }

    fn set_boundary(&mut self, id: &str, anchor_id: &str, start: bool) -> AgResult<()> {
        self.checkpoint();
        let a = self
            .annotations
            .get_mut(id)
            .ok_or_else(|| AgError::not_found(format!("annotation {id}")))?;
        let slot = if start { &a.start_id } else { &a.end_id };
        if slot == anchor_id {
            return Ok(());
        }
        self.index.remove_refs(a);
        if start {
            a.start_id = anchor_id.to_string();
        } else {
            a.end_id = anchor_id.to_string();
        }
        a.change = a.change.updated();
        self.index.insert_refs(a);
        let key = if start { "start" } else { "end" };
        self.changes
            .push(Change::update(ChangeTarget::Annotation(id.to_string()), key));
        Ok(())
    }

    /// Move an annotation under a new parent.
    ///
    /// It becomes the last child of the new parent and the old siblings are
    /// renumbered so both groups stay dense.
    pub fn set_parent(&mut self, id: &str, parent_id: Option<&str>) -> AgResult<()> {
        self.checkpoint();
        let a = self
            .annotations
            .get_mut(id)
            .ok_or_else(|| AgError::not_found(format!("annotation {id}")))?;
        if a.parent_id.as_deref() == parent_id {
            return Ok(());
        }
        let old_key = child_key(a);
        self.index.remove_annotation(a);
        a.parent_id = parent_id.map(str::to_string);
        a.ordinal = 0;
        let layer_id = a.layer_id.clone();

        let ordinal = self.max_ordinal(parent_id, &layer_id) + 1;
        if let Some(a) = self.annotations.get_mut(id) {
            a.ordinal = ordinal;
            a.change = a.change.updated();
            self.index.insert_annotation(a);
        }
        self.changes
            .push(Change::update(ChangeTarget::Annotation(id.to_string()), "parent"));
        self.renumber(&old_key, true);
        Ok(())
    }

    fn max_ordinal(&self, parent_id: Option<&str>, layer_id: &str) -> u32 {
        self.index
            .siblings(parent_id, layer_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.annotations.get(id))
            .map(|a| a.ordinal)
            .max()
            .unwrap_or(0)
    }

    /// Reassign ordinals 1..n within a sibling group, keeping relative order.
    fn renumber(&mut self, key: &ChildKey, log: bool) {
        let Some(ids) = self.index.by_parent.get(key) else {
            return;
        };
        let mut members: Vec<(u32, AnnotationId)> = ids
            .iter()
            .filter_map(|id| self.annotations.get(id).map(|a| (a.ordinal, a.id.clone())))
            .collect();
        members.sort();

        for (i, (old, id)) in members.into_iter().enumerate() {
            let ordinal = i as u32 + 1;
            if old == ordinal {
                continue;
            }
            if let Some(a) = self.annotations.get_mut(&id) {
                a.ordinal = ordinal;
                if log {
                    a.change = a.change.updated();
                    self.changes
                        .push(Change::update(ChangeTarget::Annotation(id), "ordinal"));
                }
            }
        }
    }

    // ---- commit --------------------------------------------------------

    /// Finalize pending changes.
    ///
    /// Destroyed annotations are removed together with anchors that no
    /// surviving annotation references, explicitly destroyed anchors are
    /// removed, sibling ordinals are made dense again and every change
    /// status is reset. Returns the drained change log.
    pub fn commit(&mut self) -> Vec<Change> {
        let destroyed: Vec<AnnotationId> = self
            .annotations
            .values()
            .filter(|a| a.is_destroyed())
            .map(|a| a.id.clone())
            .collect();

        let mut groups: BTreeSet<ChildKey> = BTreeSet::new();
        let mut released: BTreeSet<AnchorId> = BTreeSet::new();
        for id in &destroyed {
            if let Some(a) = self.annotations.remove(id) {
                self.index.remove_annotation(&a);
                groups.insert(child_key(&a));
                released.insert(a.start_id);
                released.insert(a.end_id);
            }
        }

        let mut removed_anchors = 0usize;
        let doomed: Vec<AnchorId> = self
            .anchors
            .values()
            .filter(|a| {
                a.change == ChangeStatus::Destroy
                    || (released.contains(&a.id) && !self.index.is_referenced(&a.id))
            })
            .map(|a| a.id.clone())
            .collect();
        for id in doomed {
            if let Some(anchor) = self.anchors.remove(&id) {
                self.index.remove_anchor(&anchor);
                removed_anchors += 1;
            }
        }

        for key in &groups {
            self.renumber(key, false);
        }

        for a in self.anchors.values_mut() {
            a.change = ChangeStatus::NoChange;
        }
        for a in self.annotations.values_mut() {
            a.change = ChangeStatus::NoChange;
        }

        self.committed = None;
        let log = std::mem::take(&mut self.changes);
        debug!(
            graph = %self.id,
            changes = log.len(),
            removed_annotations = destroyed.len(),
            removed_anchors,
            "commit"
        );
        log
    }

    /// Discard every change since the last commit.
    ///
    /// Returns how many logged changes were discarded.
    pub fn rollback(&mut self) -> usize {
        let discarded = self.changes.len();
        if let Some(committed) = self.committed.take() {
            let Committed {
                schema,
                anchors,
                annotations,
                index,
                next_id,
                fragment,
            } = *committed;
            self.schema = schema;
            self.anchors = anchors;
            self.annotations = annotations;
            self.index = index;
            self.next_id = next_id;
            self.fragment = fragment;
        }
        self.changes.clear();
        debug!(graph = %self.id, discarded, "rollback");
        discarded
    }

    fn checkpoint(&mut self) {
        if self.committed.is_some() {
            return;
        }
        self.committed = Some(Box::new(Committed {
            schema: self.schema.clone(),
            anchors: self.anchors.clone(),
            annotations: self.annotations.clone(),
            index: self.index.clone(),
            next_id: self.next_id,
            fragment: self.fragment.clone(),
        }));
    }

    /// Open a transaction. Dropping it without `commit` rolls back to the
    /// last commit.
    pub fn begin_transaction(&mut self) -> Transaction<'_> {
        Transaction::begin(self)
    }
}

fn base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut rev = Vec::new();
    while n > 0 {
        rev.push(DIGITS[(n % 36) as usize] as char);
        n /= 36;
    }
    rev.iter().rev().collect()
}
