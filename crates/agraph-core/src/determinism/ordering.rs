//! Total ordering over offsets and annotation sort keys.
//!
//! Offsets are `f64` and may be unresolved. Sorting with them must never
//! depend on `partial_cmp` returning `None`, so comparisons go through
//! `f64::total_cmp` and unresolved offsets sort after every resolved one.

use std::cmp::Ordering;

/// Compare two optional offsets: resolved ascending, then unresolved.
pub fn compare_offsets(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sort key for same-layer annotations.
///
/// Ordered by start offset, then ordinal, then id. Annotations sharing a
/// start anchor keep the order in which they were added under their parent
/// regardless of where they end.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationKey {
    pub start: Option<f64>,
    pub ordinal: u32,
    pub id: String,
}

impl Eq for AnnotationKey {}

impl PartialOrd for AnnotationKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AnnotationKey {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_offsets(self.start, other.start)
            .then_with(|| self.ordinal.cmp(&other.ordinal))
            .then_with(|| self.id.cmp(&other.id))
    }
}
