//! Deterministic graph state digests.
//!
//! A fingerprint covers the content of a graph, not its bookkeeping:
//! - layer ids in schema order
//! - anchors in id order (offset bits and confidence)
//! - annotations in id order (layer, label, anchors, parent, ordinal, confidence)
//!
//! Change statuses and the pending change log are excluded, so a graph and
//! its committed copy fingerprint identically.

use sha2::{Digest, Sha256};

use crate::graph::Graph;

const DOMAIN: &[u8] = b"agraph.v1.graph";
const FIELD: u8 = 0x1f;
const RECORD: u8 = 0x1e;

/// Hash raw bytes with sha256 and return lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}

struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    fn field(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(FIELD);
    }

    fn end_record(&mut self) {
        self.buf.push(RECORD);
    }
}

impl Graph {
    /// Sha256 hex digest of the graph content.
    pub fn fingerprint(&self) -> String {
        let mut enc = Encoder {
            buf: DOMAIN.to_vec(),
        };

        enc.field(&self.id);
        enc.end_record();

        for layer in self.schema().layers() {
            enc.field(&layer.id);
            enc.field(layer.parent_id.as_deref().unwrap_or(""));
        }
        enc.end_record();

        for anchor in self.anchors() {
            enc.field(&anchor.id);
            match anchor.offset {
                Some(o) => enc.field(&format!("{:016x}", o.to_bits())),
                None => enc.field("-"),
            }
            enc.field(anchor.confidence.as_str());
            enc.end_record();
        }

        for a in self.annotations() {
            enc.field(&a.id);
            enc.field(&a.layer_id);
            enc.field(&a.label);
            enc.field(&a.start_id);
            enc.field(&a.end_id);
            enc.field(a.parent_id.as_deref().unwrap_or(""));
            enc.field(&a.ordinal.to_string());
            enc.field(a.confidence.as_str());
            enc.end_record();
        }

        sha256_hex(&enc.buf)
    }
}
