//! Schema: the complete, ordered set of layers for a transcript.
//!
//! Layers are kept in declaration order. Hierarchy queries walk the
//! `parent_id` links and are guarded against cycles, because schemas come
//! from outside the core and may be malformed. Reference problems are not
//! rejected here; `Schema::unresolved_parents` reports them and the
//! validator turns them into findings.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use std::collections::BTreeSet;

use super::layer::{Alignment, Layer, LayerId};

/// Id of the implicit root layer every top-level layer hangs from.
pub const ROOT_LAYER_ID: &str = "graph";

/// Conventional ids for the canonical transcript layers.
pub mod canonical {
    pub const PARTICIPANT: &str = "participant";
    pub const TURN: &str = "turn";
    pub const UTTERANCE: &str = "utterance";
    pub const WORD: &str = "word";
    pub const EPISODE: &str = "episode";
    pub const CORPUS: &str = "corpus";
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Schema {
    layers: Vec<Layer>,
    pub participant_layer_id: Option<LayerId>,
    pub turn_layer_id: Option<LayerId>,
    pub utterance_layer_id: Option<LayerId>,
    pub word_layer_id: Option<LayerId>,
    pub episode_layer_id: Option<LayerId>,
    pub corpus_layer_id: Option<LayerId>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// The conventional participant → turn → utterance → word hierarchy.
    ///
    /// Turns are children of participants, utterances and words children of
    /// turns. Utterances and words must not overlap their peers.
    pub fn default_transcript() -> Self {
        let mut schema = Self::new();
        schema.add_layer(
            Layer::new(canonical::PARTICIPANT, "Speakers")
                .with_alignment(Alignment::None)
                .with_peers_overlap(true),
        );
        schema.add_layer(
            Layer::new(canonical::TURN, "Speaker turns")
                .with_parent(canonical::PARTICIPANT)
                .with_peers_overlap(false),
        );
        schema.add_layer(
            Layer::new(canonical::UTTERANCE, "Lines")
                .with_parent(canonical::TURN)
                .with_peers_overlap(false)
                .with_saturated(true),
        );
        schema.add_layer(
            Layer::new(canonical::WORD, "Words")
                .with_parent(canonical::TURN)
                .with_peers_overlap(false),
        );
        schema.participant_layer_id = Some(canonical::PARTICIPANT.to_string());
        schema.turn_layer_id = Some(canonical::TURN.to_string());
        schema.utterance_layer_id = Some(canonical::UTTERANCE.to_string());
        schema.word_layer_id = Some(canonical::WORD.to_string());
        schema
    }

    /// Add a layer, replacing any existing layer with the same id in place.
    pub fn add_layer(&mut self, layer: Layer) -> &mut Self {
        match self.layers.iter_mut().find(|l| l.id == layer.id) {
            Some(existing) => *existing = layer,
            None => self.layers.push(layer),
        }
        self
    }

    /// Remove a layer by id. Children keep their dangling `parent_id`.
    pub fn remove_layer(&mut self, id: &str) -> Option<Layer> {
        let pos = self.layers.iter().position(|l| l.id == id)?;
        Some(self.layers.remove(pos))
    }

    pub fn get_layer(&self, id: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get_layer(id).is_some()
    }

    /// Layers in declaration order.
    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Ancestors of a layer, nearest first, excluding the root.
    ///
    /// Stops at the first dangling parent reference or revisited layer.
    pub fn ancestors(&self, layer_id: &str) -> Vec<&Layer> {
        let mut out = Vec::new();
        let mut seen = BTreeSet::new();
        seen.insert(layer_id.to_string());

        let mut current = self.get_layer(layer_id).and_then(|l| l.parent_id.as_deref());
        while let Some(pid) = current {
            if !seen.insert(pid.to_string()) {
                break;
            }
            let Some(parent) = self.get_layer(pid) else {
                break;
            };
            out.push(parent);
            current = parent.parent_id.as_deref();
        }
        out
    }

    /// True when `ancestor_id` is a strict ancestor of `layer_id`.
    /// The root is an ancestor of every known layer.
    pub fn is_ancestor(&self, ancestor_id: &str, layer_id: &str) -> bool {
        if ancestor_id == ROOT_LAYER_ID {
            return self.contains(layer_id);
        }
        self.ancestors(layer_id).iter().any(|l| l.id == ancestor_id)
    }

    /// Nearest layer that is `a`, `b` or an ancestor of both.
    /// `None` means the two layers only meet at the root.
    pub fn first_common_ancestor(&self, a: &str, b: &str) -> Option<&Layer> {
        let mut a_line: Vec<&Layer> = self.get_layer(a).into_iter().collect();
        a_line.extend(self.ancestors(a));

        let mut b_ids: BTreeSet<&str> = self.ancestors(b).iter().map(|l| l.id.as_str()).collect();
        b_ids.insert(b);

        a_line.into_iter().find(|l| b_ids.contains(l.id.as_str()))
    }

    /// Number of parent steps from `descendant_id` up to `ancestor_id`,
    /// or `None` if it is not a descendant.
    pub fn descendant_depth(&self, ancestor_id: &str, descendant_id: &str) -> Option<usize> {
        if ancestor_id == descendant_id {
            return Some(0);
        }
        let ancestors = self.ancestors(descendant_id);
        if ancestor_id == ROOT_LAYER_ID {
            return self.contains(descendant_id).then_some(ancestors.len() + 1);
        }
        ancestors
            .iter()
            .position(|l| l.id == ancestor_id)
            .map(|p| p + 1)
    }

    /// Direct children of a layer (`None` for the root), in declaration order.
    pub fn children_of(&self, parent_id: Option<&str>) -> Vec<&Layer> {
        match parent_id.filter(|p| *p != ROOT_LAYER_ID) {
            None => self.layers.iter().filter(|l| l.is_top_level()).collect(),
            Some(pid) => self
                .layers
                .iter()
                .filter(|l| l.parent_id.as_deref() == Some(pid))
                .collect(),
        }
    }

    /// All layers in hierarchy order: parents before children, siblings in
    /// declaration order. Layers unreachable from the root come last.
    pub fn layers_top_down(&self) -> Vec<&Layer> {
        let mut out: Vec<&Layer> = Vec::with_capacity(self.layers.len());
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut frontier = self.children_of(None);

        while !frontier.is_empty() {
            let mut next = Vec::new();
            for layer in frontier {
                if seen.insert(layer.id.as_str()) {
                    out.push(layer);
                    next.extend(self.children_of(Some(&layer.id)));
                }
            }
            frontier = next;
        }

        for layer in &self.layers {
            if seen.insert(layer.id.as_str()) {
                out.push(layer);
            }
        }
        out
    }

    /// Layers satisfying a predicate, in declaration order.
    pub fn matching_layers<F>(&self, mut pred: F) -> Vec<&Layer>
    where
        F: FnMut(&Layer) -> bool,
    {
        self.layers.iter().filter(|l| pred(l)).collect()
    }

    /// `(layer, missing parent)` pairs for parent references that do not resolve.
    pub fn unresolved_parents(&self) -> Vec<(LayerId, LayerId)> {
        self.layers
            .iter()
            .filter_map(|l| {
                let pid = l.parent_id.as_ref()?;
                if pid == ROOT_LAYER_ID || self.contains(pid) {
                    None
                } else {
                    Some((l.id.clone(), pid.clone()))
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_phones() -> Schema {
        let mut s = Schema::default_transcript();
        s.add_layer(Layer::new("phone", "Phones").with_parent("word"));
        s.add_layer(
            Layer::new("pos", "Part of speech")
                .with_parent("word")
                .with_alignment(Alignment::None),
        );
        s
    }

    #[test]
    fn unknown_layer_is_not_found() {
        let s = Schema::default_transcript();
        assert!(s.get_layer("nope").is_none());
        assert!(s.ancestors("nope").is_empty());
    }

    #[test]
    fn ancestors_are_nearest_first() {
        let s = with_phones();
        let ids: Vec<&str> = s.ancestors("phone").iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["word", "turn", "participant"]);
        assert!(s.is_ancestor("turn", "phone"));
        assert!(s.is_ancestor(ROOT_LAYER_ID, "phone"));
        assert!(!s.is_ancestor("utterance", "phone"));
    }

    #[test]
    fn common_ancestor_and_depth() {
        let s = with_phones();
        assert_eq!(
            s.first_common_ancestor("phone", "utterance").map(|l| l.id.as_str()),
            Some("turn")
        );
        assert_eq!(
            s.first_common_ancestor("phone", "word").map(|l| l.id.as_str()),
            Some("word")
        );
        assert_eq!(s.descendant_depth("turn", "phone"), Some(2));
        assert_eq!(s.descendant_depth("utterance", "phone"), None);
        assert_eq!(s.descendant_depth(ROOT_LAYER_ID, "turn"), Some(2));
    }

    #[test]
    fn cycles_do_not_loop() {
        let mut s = Schema::new();
        s.add_layer(Layer::new("a", "A").with_parent("b"));
        s.add_layer(Layer::new("b", "B").with_parent("a"));
        assert_eq!(s.ancestors("a").len(), 1);
        // unreachable from the root, still listed
        assert_eq!(s.layers_top_down().len(), 2);
    }

    #[test]
    fn top_down_puts_parents_first() {
        let s = with_phones();
        let ids: Vec<&str> = s.layers_top_down().iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["participant", "turn", "utterance", "word", "phone", "pos"]);
    }

    #[test]
    fn unresolved_parents_are_reported() {
        let mut s = Schema::new();
        s.add_layer(Layer::new("x", "X").with_parent("missing"));
        assert_eq!(
            s.unresolved_parents(),
            vec![("x".to_string(), "missing".to_string())]
        );
    }

    #[test]
    fn matching_layers_filters_in_order() {
        let s = with_phones();
        let aligned: Vec<&str> = s
            .matching_layers(|l| l.is_aligned() && l.parent_id.is_some())
            .iter()
            .map(|l| l.id.as_str())
            .collect();
        assert_eq!(aligned, vec!["turn", "utterance", "word", "phone"]);
    }
}
