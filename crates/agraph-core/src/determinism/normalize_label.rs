//! Label normalization for loose comparisons.
//!
//! Labels from different layers often disagree only in case, surrounding
//! whitespace or runs of internal whitespace. Loose equality compares the
//! normalized forms.

/// Normalize a label for loose comparison.
///
/// Rules:
/// - strip a leading BOM
/// - trim leading and trailing whitespace
/// - collapse internal whitespace runs to one space
/// - lowercase
pub fn normalize_label(input: &str) -> String {
    let s = input.trim_start_matches('\u{FEFF}');
    let mut out = String::with_capacity(s.len());
    for (i, word) in s.split_whitespace().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.extend(word.chars().flat_map(char::to_lowercase));
    }
    out
}

/// Loose label equality.
pub fn labels_match_loosely(a: &str, b: &str) -> bool {
    a == b || normalize_label(a) == normalize_label(b)
}
