//! Determinism helpers.
//!
//! Everything downstream of the graph depends on iteration order being
//! stable: ordered queries, validator reports, edit paths over labels and
//! state fingerprints. The helpers here make those ordering rules explicit.

#[cfg(feature = "fingerprint")]
pub mod fingerprint;
pub mod normalize_label;
pub mod ordering;
