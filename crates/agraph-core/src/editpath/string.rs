//! Character-level helpers.

use super::{EditStep, MinimumEditPath};

/// Minimum edit path between the characters of two strings.
pub fn string_edit_path<'a>(from: &'a [char], to: &'a [char]) -> Vec<EditStep<&'a char>> {
    MinimumEditPath::default().minimum_edit_path(from, to)
}

/// Levenshtein distance over Unicode scalar values.
pub fn levenshtein_distance(from: &str, to: &str) -> u32 {
    let from: Vec<char> = from.chars().collect();
    let to: Vec<char> = to.chars().collect();
    MinimumEditPath::default().minimum_edit_distance(&from, &to)
}

/// Render a character path as two aligned lines, `·` marking gaps.
pub fn print_path(path: &[EditStep<&char>]) -> String {
    let mut from = String::with_capacity(path.len());
    let mut to = String::with_capacity(path.len());
    for step in path {
        from.push(step.from.copied().unwrap_or('·'));
        to.push(step.to.copied().unwrap_or('·'));
    }
    format!("{from}\n{to}")
}
