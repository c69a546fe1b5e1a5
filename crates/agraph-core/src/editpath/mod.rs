//! Minimum edit paths between two sequences.
//!
//! Wagner–Fischer dynamic programming over a full `(n+1) x (m+1)` table.
//! Each cell stores the operation that reached it, its own cost, the
//! cumulative cost and the index of the cell it came from, so the final
//! path is read back from the last cell without recomputing totals.
//!
//! Tie-break: when several moves reach a cell at the same total cost the
//! diagonal move (none/change) wins, then delete, then insert. Output is
//! stable for equal inputs, which diff displays depend on.

use tracing::{debug, trace};

use crate::config::EditPathConfig;

mod comparator;
mod step;
mod string;

pub use comparator::{DefaultEditComparator, EditComparator, EqualsComparator};
pub use step::{EditOperation, EditStep};
pub use string::{levenshtein_distance, print_path, string_edit_path};

/// Collapse threshold used when none is configured.
pub const DEFAULT_COLLAPSE_RATIO: u32 = 3;

#[derive(Debug, Clone, Copy)]
struct Cell {
    operation: EditOperation,
    step: u32,
    total: u32,
    back: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct MinimumEditPath<C> {
    comparator: C,
    collapse_ratio: u32,
}

impl Default for MinimumEditPath<DefaultEditComparator> {
    fn default() -> Self {
        Self::new(DefaultEditComparator::default())
    }
}

impl MinimumEditPath<DefaultEditComparator> {
    pub fn from_config(cfg: &EditPathConfig) -> Self {
        Self::new(DefaultEditComparator::from_config(cfg)).with_collapse_ratio(cfg.collapse_ratio)
    }
}

impl<C> MinimumEditPath<C> {
    pub fn new(comparator: C) -> Self {
        Self {
            comparator,
            collapse_ratio: DEFAULT_COLLAPSE_RATIO,
        }
    }

    /// Collapse only when the direct change costs at most `ratio` times the
    /// insert/delete pair it replaces.
    pub fn with_collapse_ratio(mut self, ratio: u32) -> Self {
        self.collapse_ratio = ratio;
        self
    }

    pub fn comparator(&self) -> &C {
        &self.comparator
    }

    /// Lowest-cost sequence of steps turning `from` into `to`.
    pub fn minimum_edit_path<'a, T>(&self, from: &'a [T], to: &'a [T]) -> Vec<EditStep<&'a T>>
    where
        C: EditComparator<T>,
    {
        let (n, m) = (from.len(), to.len());
        let width = m + 1;
        let idx = |i: usize, j: usize| i * width + j;

        let mut table: Vec<Cell> = Vec::with_capacity((n + 1) * width);
        table.push(Cell {
            operation: EditOperation::None,
            step: 0,
            total: 0,
            back: None,
        });
        for (j, t) in to.iter().enumerate() {
            let step = self.comparator.insert(t);
            table.push(Cell {
                operation: EditOperation::Insert,
                step,
                total: table[j].total.saturating_add(step),
                back: Some(j),
            });
        }

        for (i, f) in from.iter().enumerate().map(|(i, f)| (i + 1, f)) {
            let above = idx(i - 1, 0);
            let step = self.comparator.delete(f);
            table.push(Cell {
                operation: EditOperation::Delete,
                step,
                total: table[above].total.saturating_add(step),
                back: Some(above),
            });

            for (j, t) in to.iter().enumerate().map(|(j, t)| (j + 1, t)) {
                let diagonal = idx(i - 1, j - 1);
                let up = idx(i - 1, j);
                let left = idx(i, j - 1);

                let change = self.comparator.compare(f, t);
                let mut best = Cell {
                    operation: if change == 0 {
                        EditOperation::None
                    } else {
                        EditOperation::Change
                    },
                    step: change,
                    total: table[diagonal].total.saturating_add(change),
                    back: Some(diagonal),
                };

                let delete = self.comparator.delete(f);
                let delete_total = table[up].total.saturating_add(delete);
                if delete_total < best.total {
                    best = Cell {
                        operation: EditOperation::Delete,
                        step: delete,
                        total: delete_total,
                        back: Some(up),
                    };
                }

                let insert = self.comparator.insert(t);
                let insert_total = table[left].total.saturating_add(insert);
                if insert_total < best.total {
                    best = Cell {
                        operation: EditOperation::Insert,
                        step: insert,
                        total: insert_total,
                        back: Some(left),
                    };
                }
                table.push(best);
            }
        }

        let mut path = Vec::with_capacity(n.max(m));
        let mut current = idx(n, m);
        while current != 0 {
            let cell = table[current];
            let (i, j) = (current / width, current % width);
            path.push(step_at(cell, i, j, from, to));
            match cell.back {
                Some(back) => current = back,
                None => break,
            }
        }
        path.reverse();
        link_backtraces(&mut path);

        debug!(
            from = n,
            to = m,
            steps = path.len(),
            distance = path.last().map_or(0, |s| s.total_distance),
            "minimum edit path"
        );
        path
    }

    /// Total cost of the minimum edit path; 0 for two empty sequences.
    pub fn minimum_edit_distance<T>(&self, from: &[T], to: &[T]) -> u32
    where
        C: EditComparator<T>,
    {
        self.minimum_edit_path(from, to)
            .last()
            .map_or(0, |s| s.total_distance)
    }

    /// Merge each delete immediately followed by an insert (or the reverse)
    /// into a single change.
    ///
    /// A pair is merged only when the direct change between its elements
    /// costs no more than the collapse ratio times the pair's combined
    /// cost. Applying this twice gives the same result as applying it once.
    pub fn collapse<'a, T>(&self, path: Vec<EditStep<&'a T>>) -> Vec<EditStep<&'a T>>
    where
        C: EditComparator<T>,
    {
        let mut out: Vec<EditStep<&'a T>> = Vec::with_capacity(path.len());

        for step in path {
            let Some(last) = out.last_mut() else {
                out.push(step);
                continue;
            };
            let (deleted, inserted) = match (last.operation, step.operation) {
                (EditOperation::Delete, EditOperation::Insert) => (last.from, step.to),
                (EditOperation::Insert, EditOperation::Delete) => (step.from, last.to),
                _ => {
                    out.push(step);
                    continue;
                }
            };
            let (Some(f), Some(t)) = (deleted, inserted) else {
                out.push(step);
                continue;
            };

            let pair = last.step_distance.saturating_add(step.step_distance);
            let change = self.comparator.compare(f, t);
            if change > self.collapse_ratio.saturating_mul(pair) {
                trace!(change, pair, "insert/delete pair kept");
                out.push(step);
                continue;
            }

            if last.operation == EditOperation::Delete {
                last.to = step.to;
                last.to_index = step.to_index;
            } else {
                last.from = step.from;
                last.from_index = step.from_index;
            }
            last.operation = EditOperation::Change;
            last.step_distance = pair;
            last.total_distance = step.total_distance;
        }
        link_backtraces(&mut out);
        out
    }
}

fn link_backtraces<T>(path: &mut [EditStep<T>]) {
    for (k, step) in path.iter_mut().enumerate() {
        step.backtrace = k.checked_sub(1);
    }
}

fn step_at<'a, T>(cell: Cell, i: usize, j: usize, from: &'a [T], to: &'a [T]) -> EditStep<&'a T> {
    let (from_item, to_item, from_index, to_index) = match cell.operation {
        EditOperation::Insert => (None, to.get(j - 1), i.saturating_sub(1), j - 1),
        EditOperation::Delete => (from.get(i - 1), None, i - 1, j.saturating_sub(1)),
        EditOperation::None | EditOperation::Change => {
            (from.get(i - 1), to.get(j - 1), i - 1, j - 1)
        }
    };
    EditStep {
        operation: cell.operation,
        from: from_item,
        to: to_item,
        from_index,
        to_index,
        step_distance: cell.step,
        total_distance: cell.total,
        backtrace: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ops<T>(path: &[EditStep<T>]) -> Vec<EditOperation> {
        path.iter().map(|s| s.operation).collect()
    }

    #[test]
    fn single_change_between_equal_ends() {
        let mp = MinimumEditPath::default();
        let path = mp.minimum_edit_path(&["a", "b", "c"], &["a", "x", "c"]);
        assert_eq!(
            ops(&path),
            vec![EditOperation::None, EditOperation::Change, EditOperation::None]
        );
        assert_eq!(path[1].from, Some(&"b"));
        assert_eq!(path[1].to, Some(&"x"));
        assert_eq!(path.last().unwrap().total_distance, 1);
    }

    #[test]
    fn trailing_delete() {
        let mp = MinimumEditPath::default();
        let path = mp.minimum_edit_path(&["a", "b"], &["a"]);
        assert_eq!(ops(&path), vec![EditOperation::None, EditOperation::Delete]);
        assert_eq!((path[1].from_index, path[1].to_index), (1, 0));
        assert_eq!(mp.minimum_edit_distance(&["a", "b"], &["a"]), 1);
    }

    #[test]
    fn empty_sequences() {
        let mp = MinimumEditPath::default();
        let empty: [&str; 0] = [];
        assert!(mp.minimum_edit_path(&empty, &empty).is_empty());
        assert_eq!(mp.minimum_edit_distance(&empty, &empty), 0);

        let inserts = mp.minimum_edit_path(&empty, &["x", "y"]);
        assert_eq!(ops(&inserts), vec![EditOperation::Insert, EditOperation::Insert]);
        assert_eq!(inserts[1].total_distance, 2);
        assert_eq!((inserts[1].from_index, inserts[1].to_index), (0, 1));
    }

    #[test]
    fn ties_prefer_the_diagonal() {
        let mp = MinimumEditPath::default();
        let path = mp.minimum_edit_path(&['a', 'b'], &['b', 'a']);
        assert_eq!(ops(&path), vec![EditOperation::Change, EditOperation::Change]);
        assert_eq!(path[1].total_distance, 2);
    }

    #[test]
    fn each_step_links_to_its_predecessor() {
        let mp = MinimumEditPath::default();
        let path = mp.minimum_edit_path(&["a", "b", "c"], &["x", "c", "d"]);
        let links: Vec<Option<usize>> = path.iter().map(|s| s.backtrace).collect();
        let expected: Vec<Option<usize>> = (0..path.len()).map(|k| k.checked_sub(1)).collect();
        assert_eq!(links, expected);
        assert_eq!(path[0].backtrace, None);
    }

    #[test]
    fn cumulative_distance_follows_the_path() {
        let mp = MinimumEditPath::default();
        let path = mp.minimum_edit_path(&[1, 2, 3, 5, 8], &[2, 4, 5, 8, 13]);
        let mut running = 0;
        for step in &path {
            running += step.step_distance;
            assert_eq!(step.total_distance, running);
        }
        assert_eq!(running, 3);
    }

    fn expensive_change() -> MinimumEditPath<DefaultEditComparator> {
        MinimumEditPath::new(DefaultEditComparator {
            change_distance: 5,
            insert_distance: 1,
            delete_distance: 1,
        })
    }

    #[test]
    fn collapse_merges_insert_delete_pairs() {
        let mp = expensive_change();
        let path = mp.minimum_edit_path(&["a", "b"], &["a", "c"]);
        assert_eq!(
            ops(&path),
            vec![EditOperation::None, EditOperation::Insert, EditOperation::Delete]
        );

        let collapsed = mp.collapse(path);
        assert_eq!(ops(&collapsed), vec![EditOperation::None, EditOperation::Change]);
        let change = &collapsed[1];
        assert_eq!((change.from, change.to), (Some(&"b"), Some(&"c")));
        assert_eq!((change.from_index, change.to_index), (1, 1));
        assert_eq!((change.step_distance, change.total_distance), (2, 2));
        assert_eq!(change.backtrace, Some(0));
    }

    #[test]
    fn collapse_respects_ratio() {
        let mp = expensive_change().with_collapse_ratio(2);
        let path = mp.minimum_edit_path(&["a", "b"], &["a", "c"]);
        let collapsed = mp.collapse(path.clone());
        assert_eq!(collapsed, path);
    }

    proptest! {
        #[test]
        fn collapse_is_idempotent(
            a in proptest::collection::vec(0u8..4, 0..8),
            b in proptest::collection::vec(0u8..4, 0..8),
        ) {
            let mp = MinimumEditPath::new(DefaultEditComparator {
                change_distance: 3,
                insert_distance: 1,
                delete_distance: 1,
            });
            let once = mp.collapse(mp.minimum_edit_path(&a, &b));
            let twice = mp.collapse(once.clone());
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn path_replays_both_sequences(
            a in proptest::collection::vec(0u8..4, 0..8),
            b in proptest::collection::vec(0u8..4, 0..8),
        ) {
            let path = MinimumEditPath::default().minimum_edit_path(&a, &b);
            let from: Vec<u8> = path.iter().filter_map(|s| s.from.copied()).collect();
            let to: Vec<u8> = path.iter().filter_map(|s| s.to.copied()).collect();
            prop_assert_eq!(from, a);
            prop_assert_eq!(to, b);
        }
    }
}
