//! Contract tests that apply to every transformer and serializer.
//!
//! - registry listing is deterministic
//! - runs either commit cleanly or leave the graph untouched
//! - one failing graph never stops a batch
//! - serializers report per-graph problems on the sink

use agraph_core::prelude::*;
use agraph_plugins::builtin::{self, BUILTIN_IDS};
use agraph_plugins::serialize::{CollectingSink, FormatDescriptor, NamedStream, SerializeSink, Serializer};
use agraph_plugins::{ParameterSet, RunError, TransformRunner, TransformerRegistry};
use assert_matches::assert_matches;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn registry() -> TransformerRegistry {
    let mut r = TransformerRegistry::new();
    builtin::register_all(&mut r).unwrap();
    r
}

fn utterance_graph(id: &str, text: &str) -> Graph {
    let mut g = Graph::new(id, Schema::default_transcript());
    g.add_anchor(Anchor::at("a0", 0.0)).unwrap();
    g.add_anchor(Anchor::at("a6", 6.0)).unwrap();
    g.add_annotation(Annotation::new("p", "participant", "Ann", "a0", "a6"))
        .unwrap();
    g.add_annotation(Annotation::new("t", "turn", "Ann", "a0", "a6").with_parent("p"))
        .unwrap();
    g.add_annotation(Annotation::new("u", "utterance", text, "a0", "a6").with_parent("t"))
        .unwrap();
    g.commit();
    g
}

#[test]
fn empty_registry_is_stable() {
    let r1 = TransformerRegistry::new();
    let r2 = TransformerRegistry::default();
    assert!(r1.is_empty());
    assert_eq!(r1.list_ids(), r2.list_ids());
}

#[test]
fn registry_order_is_deterministic() {
    let r = registry();
    let ids = r.list_ids();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);
    assert_eq!(ids, BUILTIN_IDS);
}

#[test]
fn specs_serialize_to_json() {
    let r = registry();
    for spec in r.specs() {
        let v = serde_json::to_value(spec).unwrap();
        assert_eq!(v["id"], spec.id.as_str());
        assert!(v["parameters"].is_array());
    }
}

#[test]
fn tokenize_then_interpolate() {
    init_tracing();
    let r = registry();
    let runner = TransformRunner::default().fail_on_validation_errors(true);
    let mut g = utterance_graph("g", "one two three");

    let tokenize = ParameterSet::new()
        .with("source_layer", "utterance")
        .with("destination_layer", "word");
    let report = runner
        .run(&r, "builtin.simple_tokenizer", &mut g, &tokenize)
        .unwrap();
    assert!(report.changes > 0);
    assert_eq!(g.labels("word"), vec!["one", "two", "three"]);

    runner
        .run(&r, "builtin.default_offsets", &mut g, &ParameterSet::new())
        .unwrap();
    let ends: Vec<Option<f64>> = g
        .all("word")
        .iter()
        .map(|w| g.offset_of(&w.end_id))
        .collect();
    assert_eq!(ends, vec![Some(2.0), Some(4.0), Some(6.0)]);
    assert!(Validator::default().validate(&g).is_clean());
}

#[test]
fn failed_run_leaves_graph_untouched() {
    let r = registry();
    let mut g = utterance_graph("g", "one two");
    let before = g.fingerprint();

    let bad = ParameterSet::new()
        .with("source_layer", "utterance")
        .with("destination_layer", "phone");
    let err = TransformRunner::default()
        .run(&r, "builtin.simple_tokenizer", &mut g, &bad)
        .unwrap_err();
    assert_matches!(err, RunError::TransformationFailed { .. });
    assert_eq!(g.fingerprint(), before);

    let err = TransformRunner::default()
        .run(&r, "builtin.nothing", &mut g, &ParameterSet::new())
        .unwrap_err();
    assert_matches!(err, RunError::UnknownTransformer(_));
}

#[test]
fn batch_continues_past_failures() {
    let r = registry();
    let mut no_words = utterance_graph("g2", "c d");
    no_words.schema_mut().remove_layer("word");
    let mut graphs = vec![
        utterance_graph("g1", "a b"),
        no_words,
        utterance_graph("g3", "   "),
    ];
    let params = ParameterSet::new()
        .with("source_layer", "utterance")
        .with("destination_layer", "word");
    let results = TransformRunner::default().run_batch(&r, "builtin.simple_tokenizer", &mut graphs, &params);

    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert_matches!(&results[1], Err(RunError::TransformationFailed { graph_id, .. }) if graph_id == "g2");
    let empty = results[2].as_ref().unwrap();
    assert_eq!(empty.warnings().count(), 1);
    assert_eq!(graphs[0].labels("word"), vec!["a", "b"]);
    assert!(graphs[2].labels("word").is_empty());
}

#[test]
fn validation_errors_are_reported_not_fatal_by_default() {
    let r = registry();
    let runner = TransformRunner::new(ValidationConfig {
        max_label_length: Some(3),
        ..ValidationConfig::default()
    });
    let mut g = utterance_graph("g", "tiny enormous");
    let params = ParameterSet::new()
        .with("source_layer", "utterance")
        .with("destination_layer", "word");
    let report = runner
        .run(&r, "builtin.simple_tokenizer", &mut g, &params)
        .unwrap();
    assert!(report.has_errors());
    assert_eq!(g.labels("word"), vec!["tiny", "enormous"]);

    let mut g = utterance_graph("g", "tiny enormous");
    let err = runner
        .fail_on_validation_errors(true)
        .run(&r, "builtin.simple_tokenizer", &mut g, &params)
        .unwrap_err();
    assert_matches!(err, RunError::ValidationFailed { .. });
    assert!(g.labels("word").is_empty());
}

/// Writes one line per annotation on the requested layers.
struct LineSerializer;

impl Serializer for LineSerializer {
    fn descriptor(&self) -> FormatDescriptor {
        FormatDescriptor {
            name: "Lines".into(),
            mime_type: "text/plain".into(),
            version: "1".into(),
            file_suffixes: vec![".txt".into()],
        }
    }

    fn serialize(
        &self,
        graphs: &mut dyn Iterator<Item = Graph>,
        layer_ids: &[&str],
        sink: &mut dyn SerializeSink,
    ) {
        for g in graphs {
            let report = Validator::default().validate(&g);
            if report.has_errors() {
                sink.error(&g.id, AgError::invariant(report.messages().join("; ")));
                continue;
            }
            let mut out = String::new();
            for layer in layer_ids {
                if g.layer(layer).is_none() {
                    sink.warning(&g.id, format!("no layer {layer}"));
                    continue;
                }
                for label in g.labels(layer) {
                    out.push_str(label);
                    out.push('\n');
                }
            }
            sink.stream(NamedStream::new(format!("{}.txt", g.id), out).with_mime_type("text/plain"));
        }
    }
}

#[test]
fn serializer_reports_per_graph() {
    let mut broken = utterance_graph("broken", "x");
    broken.set_anchor_offset("a6", Some(-1.0)).unwrap();
    broken.commit();
    let graphs = vec![utterance_graph("ok", "hello"), broken];

    let mut sink = CollectingSink::new();
    LineSerializer.serialize(&mut graphs.into_iter(), &["utterance", "phone"], &mut sink);

    assert_eq!(sink.streams.len(), 1);
    assert_eq!(sink.streams[0].name, "ok.txt");
    assert_eq!(sink.streams[0].bytes, b"hello\n");
    assert_eq!(sink.warnings, vec![("ok".to_string(), "no layer phone".to_string())]);
    assert_eq!(sink.errors.len(), 1);
    assert_eq!(sink.errors[0].0, "broken");
}
