//! Edit steps.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum EditOperation {
    /// Elements are equal.
    None,
    /// `from` is replaced by `to`.
    Change,
    /// `from` is removed.
    Delete,
    /// `to` is added.
    Insert,
}

impl EditOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditOperation::None => "NONE",
            EditOperation::Change => "CHANGE",
            EditOperation::Delete => "DELETE",
            EditOperation::Insert => "INSERT",
        }
    }
}

impl fmt::Display for EditOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of a minimum edit path.
///
/// `from_index` and `to_index` point into the input sequences. For an
/// insert, `from_index` is the position of the last consumed `from`
/// element (clamped to 0); deletes mirror that on `to_index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditStep<T> {
    pub operation: EditOperation,
    pub from: Option<T>,
    pub to: Option<T>,
    pub from_index: usize,
    pub to_index: usize,
    /// Cost of this step alone.
    pub step_distance: u32,
    /// Cost of the path up to and including this step.
    pub total_distance: u32,
    /// Position of the preceding step in the same path; `None` for the first.
    pub backtrace: Option<usize>,
}

impl<T> EditStep<T> {
    pub fn is_edit(&self) -> bool {
        self.operation != EditOperation::None
    }
}

impl<T: fmt::Display> fmt::Display for EditStep<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t", self.operation)?;
        match (&self.from, self.operation) {
            (Some(from), _) => write!(f, "{from}")?,
            (None, EditOperation::Insert) => f.write_str("·")?,
            (None, _) => f.write_str("<none>")?,
        }
        f.write_str("\t→\t")?;
        match (&self.to, self.operation) {
            (Some(to), _) => write!(f, "{to}"),
            (None, EditOperation::Delete) => f.write_str("·"),
            (None, _) => f.write_str("<none>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step<T>(operation: EditOperation, from: Option<T>, to: Option<T>) -> EditStep<T> {
        EditStep {
            operation,
            from,
            to,
            from_index: 0,
            to_index: 0,
            step_distance: 1,
            total_distance: 1,
            backtrace: None,
        }
    }

    #[test]
    fn display_marks_gaps() {
        let delete = step(EditOperation::Delete, Some("b"), None);
        assert_eq!(delete.to_string(), "DELETE\tb\t→\t·");

        let insert = step(EditOperation::Insert, None, Some('x'));
        assert_eq!(insert.to_string(), "INSERT\t·\t→\tx");

        let change = step(EditOperation::Change, Some(1), Some(2));
        assert_eq!(change.to_string(), "CHANGE\t1\t→\t2");
        assert!(change.is_edit());
    }
}
