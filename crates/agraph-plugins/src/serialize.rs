//! Deserializer and serializer boundaries.
//!
//! Byte formats are defined by implementors. The core only defines what a
//! resulting graph must satisfy, which `Validator` checks.
//!
//! Serializers report per-graph warnings and errors through a
//! `SerializeSink` so that one bad graph does not stop the rest of a batch.

use serde::{Deserialize, Serialize};

use agraph_core::graph::Graph;
use agraph_core::model::Schema;
use agraph_core::AgError;

/// A named byte stream: one input or output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedStream {
    pub name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl NamedStream {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            mime_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// What a (de)serializer handles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    pub name: String,
    pub mime_type: String,
    pub version: String,
    #[serde(default)]
    pub file_suffixes: Vec<String>,
}

impl FormatDescriptor {
    pub fn matches_file(&self, file_name: &str) -> bool {
        let lower = file_name.to_ascii_lowercase();
        self.file_suffixes
            .iter()
            .any(|s| lower.ends_with(&s.to_ascii_lowercase()))
    }
}

/// Graphs produced from a set of streams, plus non-fatal warnings.
#[derive(Debug, Clone, Default)]
pub struct Deserialized {
    pub graphs: Vec<Graph>,
    pub warnings: Vec<String>,
}

pub trait Deserializer {
    fn descriptor(&self) -> FormatDescriptor;

    /// Build zero or more graphs conforming to `schema` from `streams`.
    ///
    /// Malformed content that still yields a graph is a warning. Errors are
    /// for input that yields nothing usable.
    fn deserialize(&self, streams: &[NamedStream], schema: &Schema) -> anyhow::Result<Deserialized>;
}

/// Receives serializer output on separate channels.
pub trait SerializeSink {
    fn stream(&mut self, stream: NamedStream);
    fn warning(&mut self, graph_id: &str, message: String);
    fn error(&mut self, graph_id: &str, error: AgError);
}

pub trait Serializer {
    fn descriptor(&self) -> FormatDescriptor;

    /// Serialize each graph, restricted to `layer_ids`.
    ///
    /// `graphs` may be lazy. A failure on one graph goes to
    /// `sink.error` and serialization continues with the next.
    fn serialize(
        &self,
        graphs: &mut dyn Iterator<Item = Graph>,
        layer_ids: &[&str],
        sink: &mut dyn SerializeSink,
    );
}

/// A sink that keeps everything in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub streams: Vec<NamedStream>,
    pub warnings: Vec<(String, String)>,
    pub errors: Vec<(String, AgError)>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty() && self.errors.is_empty()
    }
}

impl SerializeSink for CollectingSink {
    fn stream(&mut self, stream: NamedStream) {
        self.streams.push(stream);
    }

    fn warning(&mut self, graph_id: &str, message: String) {
        tracing::warn!(graph = %graph_id, %message, "serialization warning");
        self.warnings.push((graph_id.to_string(), message));
    }

    fn error(&mut self, graph_id: &str, error: AgError) {
        tracing::warn!(graph = %graph_id, %error, "serialization failed");
        self.errors.push((graph_id.to_string(), error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_matches_suffix_case_insensitively() {
        let d = FormatDescriptor {
            name: "Praat TextGrid".into(),
            mime_type: "text/praat-textgrid".into(),
            version: "1".into(),
            file_suffixes: vec![".TextGrid".into()],
        };
        assert!(d.matches_file("interview.textgrid"));
        assert!(!d.matches_file("interview.txt"));
    }

    #[test]
    fn sink_keeps_channels_apart() {
        let mut sink = CollectingSink::new();
        sink.stream(NamedStream::new("a.txt", "hi").with_mime_type("text/plain"));
        sink.warning("g1", "no words".into());
        sink.error("g2", AgError::serialization("bad"));
        assert_eq!(sink.streams.len(), 1);
        assert_eq!(sink.warnings[0].0, "g1");
        assert_eq!(sink.errors[0].0, "g2");
        assert!(!sink.is_clean());
    }
}
