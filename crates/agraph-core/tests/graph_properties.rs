//! Graph-level properties: ordering, containment, tiling, ordinals,
//! transactions, offset generation and fragments.

use agraph_core::offsets::DefaultOffsetGenerator;
use agraph_core::prelude::*;
use agraph_core::validate::codes;
use proptest::prelude::*;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// participant p / turn t over [0, 10], with the given utterances and words
/// under t. Anchors are named `a{offset}`.
fn transcript(utterances: &[(u32, u32)], words: &[(&str, u32, u32)]) -> Graph {
    let mut g = Graph::new("interview", Schema::default_transcript());
    let anchor = |g: &mut Graph, o: u32| {
        let id = format!("a{o}");
        if g.get_anchor(&id).is_none() {
            g.add_anchor(Anchor::at(id.clone(), f64::from(o))).unwrap();
        }
        id
    };
    let (s, e) = (anchor(&mut g, 0), anchor(&mut g, 10));
    g.add_annotation(Annotation::new("p", "participant", "Ann", &s, &e))
        .unwrap();
    g.add_annotation(Annotation::new("t", "turn", "Ann", &s, &e).with_parent("p"))
        .unwrap();
    for (i, (from, to)) in utterances.iter().enumerate() {
        let (s, e) = (anchor(&mut g, *from), anchor(&mut g, *to));
        g.add_annotation(Annotation::new(format!("u{i}"), "utterance", "", s, e).with_parent("t"))
            .unwrap();
    }
    for (i, (label, from, to)) in words.iter().enumerate() {
        let (s, e) = (anchor(&mut g, *from), anchor(&mut g, *to));
        g.add_annotation(Annotation::new(format!("w{i}"), "word", *label, s, e).with_parent("t"))
            .unwrap();
    }
    g.commit();
    g
}

fn codes_of(report: &ValidationReport) -> Vec<&str> {
    report.findings.iter().map(|f| f.code.as_str()).collect()
}

#[test]
fn saturated_children_tile_their_parent() {
    init_tracing();
    let g = transcript(&[(0, 4), (4, 7), (7, 10)], &[]);
    let report = Validator::default().validate(&g);
    assert!(report.is_clean(), "{:?}", report.messages());

    let gappy = transcript(&[(0, 4), (5, 7), (7, 10)], &[]);
    let report = Validator::default().validate(&gappy);
    assert!(codes_of(&report).contains(&codes::SATURATED_GAP));

    let overlapping = transcript(&[(0, 5), (4, 7), (7, 10)], &[]);
    let report = Validator::default().validate(&overlapping);
    assert!(report.has_errors());
}

#[test]
fn monotonicity_and_containment_are_reported() {
    let mut g = transcript(&[(0, 10)], &[("hello", 2, 6)]);
    assert!(Validator::default().validate(&g).is_clean());

    g.set_anchor_offset("a6", Some(1.0)).unwrap();
    let report = Validator::default().validate(&g);
    assert!(codes_of(&report).contains(&codes::ANCHOR_ORDER));

    g.set_anchor_offset("a6", Some(12.0)).unwrap();
    let report = Validator::default().validate(&g);
    assert!(codes_of(&report).contains(&codes::PARENT_INCLUDES));
}

#[test]
fn unresolved_anchors_are_not_ordering_errors() {
    let mut g = transcript(&[(0, 10)], &[("hello", 2, 6)]);
    g.set_anchor_offset("a6", None).unwrap();
    let report = Validator::default().validate(&g);
    assert!(!codes_of(&report).contains(&codes::ANCHOR_ORDER));
}

#[test]
fn ordered_queries_follow_the_timeline() {
    let g = transcript(&[(0, 10)], &[("c", 6, 9), ("a", 0, 3), ("b", 3, 6)]);
    assert_eq!(g.labels("word"), vec!["a", "b", "c"]);
    assert_eq!(g.first("t", "word").map(|a| a.label.as_str()), Some("a"));
    assert_eq!(g.last("t", "word").map(|a| a.label.as_str()), Some("c"));
    assert_eq!(g.my("w0", "turn").map(|a| a.id.as_str()), Some("t"));
    let in_utterance: Vec<&str> = g.list("u0", "word").iter().map(|a| a.label.as_str()).collect();
    assert_eq!(in_utterance, vec!["a", "b", "c"]);
}

#[test]
fn shared_anchor_ties_break_by_ordinal() {
    let mut g = transcript(&[(0, 10)], &[]);
    g.add_annotation(Annotation::new("x", "word", "first", "a0", "a10").with_parent("t"))
        .unwrap();
    g.add_annotation(Annotation::new("y", "word", "second", "a0", "a10").with_parent("t"))
        .unwrap();
    assert_eq!(g.labels("word"), vec!["first", "second"]);
}

#[test]
fn shared_start_ignores_end_and_keeps_ordinal_order() {
    let g = transcript(&[(0, 10)], &[("long", 4, 10), ("short", 4, 7)]);
    let words: Vec<(&str, u32)> = g
        .all("word")
        .iter()
        .map(|w| (w.label.as_str(), w.ordinal))
        .collect();
    assert_eq!(words, vec![("long", 1), ("short", 2)]);
    assert_eq!(g.first("t", "word").map(|w| w.label.as_str()), Some("long"));
}

#[test]
fn rollback_discards_changes_pending_before_a_transaction() {
    let mut g = transcript(&[(0, 10)], &[("hi", 0, 4)]);
    g.set_label("t", "Bob").unwrap();
    {
        let mut tx = g.begin_transaction();
        tx.set_label("p", "Bob").unwrap();
        tx.rollback();
    }
    assert_eq!(g.get_annotation("t").map(|a| a.label.as_str()), Some("Ann"));
    assert_eq!(g.get_annotation("p").map(|a| a.label.as_str()), Some("Ann"));
    assert!(!g.has_pending_changes());
}

#[cfg(feature = "fingerprint")]
#[test]
fn rollback_is_indistinguishable_from_no_mutation() {
    let mut g = transcript(&[(0, 4), (4, 10)], &[("hi", 0, 4), ("there", 4, 10)]);
    let before = g.fingerprint();
    {
        let mut tx = g.begin_transaction();
        tx.set_label("w0", "hello").unwrap();
        tx.destroy("w1").unwrap();
        let x = tx.create_anchor_at(5.0, Confidence::Automatic);
        tx.add_annotation(Annotation::new("", "word", "new", "a4", x).with_parent("t"))
            .unwrap();
        tx.set_anchor_offset("a4", Some(3.5)).unwrap();
        tx.rollback();
    }
    assert_eq!(g.fingerprint(), before);
    assert!(!g.has_pending_changes());
}

#[test]
fn default_offsets_are_idempotent() {
    init_tracing();
    let mut g = transcript(&[(0, 10)], &[]);
    let mut prev = "a0".to_string();
    for (i, label) in ["one", "two", "three", "four"].iter().enumerate() {
        let next = if i == 3 {
            "a10".to_string()
        } else {
            g.create_unresolved_anchor()
        };
        g.add_annotation(Annotation::new("", "word", *label, &prev, &next).with_parent("t"))
            .unwrap();
        prev = next;
    }
    g.commit();

    let generator = DefaultOffsetGenerator::default();
    let first = generator.transform(&mut g).unwrap();
    assert_eq!(first.generated, 3);
    let offsets: Vec<Option<f64>> = g
        .all("word")
        .iter()
        .map(|w| g.offset_of(&w.end_id))
        .collect();
    assert_eq!(offsets, vec![Some(2.5), Some(5.0), Some(7.5), Some(10.0)]);

    g.commit();
    let second = generator.transform(&mut g).unwrap();
    assert_eq!(second.generated, 0);
    assert!(!g.has_pending_changes());
}

#[test]
fn fragment_keeps_relative_distances() {
    let mut g = transcript(
        &[(0, 4), (4, 10)],
        &[("a", 0, 2), ("b", 2, 4), ("c", 4, 7), ("d", 7, 10)],
    );
    let fragment = g.get_fragment(4.0, 10.0, &["word"]);
    let info = fragment.fragment_info().cloned().unwrap();
    assert_eq!(info.source_graph_id, "interview");
    assert_eq!(fragment.labels("word"), vec!["c", "d"]);

    let before: Vec<f64> = fragment
        .sorted_anchors()
        .iter()
        .filter_map(|a| a.offset)
        .collect();
    let mut shifted = fragment.clone();
    shifted.shift_anchors(-4.0);
    let after: Vec<f64> = shifted
        .sorted_anchors()
        .iter()
        .filter_map(|a| a.offset)
        .collect();
    assert_eq!(after[0], 0.0);
    let gaps = |v: &[f64]| v.windows(2).map(|w| w[1] - w[0]).collect::<Vec<_>>();
    assert_eq!(gaps(&before), gaps(&after));

    // edits made in the fragment flow back
    let mut edited = fragment;
    let id = edited.first("t", "word").map(|w| w.id.clone()).unwrap();
    edited.set_label(&id, "see").unwrap();
    assert_eq!(g.merge_fragment(&edited).unwrap(), 1);
    assert_eq!(g.labels("word"), vec!["a", "b", "see", "d"]);
}

proptest! {
    #[test]
    fn ordinals_stay_dense(
        starts in proptest::collection::vec(0u32..9, 1..12),
        doomed in proptest::collection::vec(any::<bool>(), 12),
    ) {
        let words: Vec<(&str, u32, u32)> = starts.iter().map(|s| ("w", *s, *s + 1)).collect();
        let mut g = transcript(&[], &words);
        for (i, kill) in doomed.iter().enumerate().take(words.len()) {
            if *kill {
                g.destroy(&format!("w{i}")).unwrap();
            }
        }
        g.commit();

        let mut ordinals: Vec<u32> = g.children(Some("t"), "word").iter().map(|w| w.ordinal).collect();
        ordinals.sort_unstable();
        let expected: Vec<u32> = (1..=ordinals.len() as u32).collect();
        prop_assert_eq!(ordinals, expected);
    }
}
