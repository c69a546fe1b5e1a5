//! Element comparators driving the edit path.

use std::fmt;

use crate::config::EditPathConfig;
use crate::determinism::normalize_label::labels_match_loosely;

/// Costs of the three elementary edits.
///
/// `compare` returns 0 when the elements count as equal; any positive
/// value makes the diagonal move a change.
pub trait EditComparator<T: ?Sized> {
    fn compare(&self, from: &T, to: &T) -> u32;
    fn delete(&self, from: &T) -> u32;
    fn insert(&self, to: &T) -> u32;
}

impl<T: ?Sized, C: EditComparator<T> + ?Sized> EditComparator<T> for &C {
    fn compare(&self, from: &T, to: &T) -> u32 {
        (**self).compare(from, to)
    }

    fn delete(&self, from: &T) -> u32 {
        (**self).delete(from)
    }

    fn insert(&self, to: &T) -> u32 {
        (**self).insert(to)
    }
}

/// `PartialEq` comparison with fixed costs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultEditComparator {
    pub change_distance: u32,
    pub insert_distance: u32,
    pub delete_distance: u32,
}

impl DefaultEditComparator {
    /// Same cost for every edit.
    pub fn uniform(distance: u32) -> Self {
        Self {
            change_distance: distance,
            insert_distance: distance,
            delete_distance: distance,
        }
    }

    pub fn from_config(cfg: &EditPathConfig) -> Self {
        Self {
            change_distance: cfg.change_distance,
            insert_distance: cfg.insert_distance,
            delete_distance: cfg.delete_distance,
        }
    }
}

impl Default for DefaultEditComparator {
    fn default() -> Self {
        Self::uniform(1)
    }
}

impl<T: PartialEq + ?Sized> EditComparator<T> for DefaultEditComparator {
    fn compare(&self, from: &T, to: &T) -> u32 {
        if from == to {
            0
        } else {
            self.change_distance
        }
    }

    fn delete(&self, _from: &T) -> u32 {
        self.delete_distance
    }

    fn insert(&self, _to: &T) -> u32 {
        self.insert_distance
    }
}

/// Equality test with 0/1 costs.
///
/// It can only say "equal" or "not equal", so it is not a metric: every
/// mismatch costs the same, however close the elements are.
pub struct EqualsComparator<T: ?Sized + 'static> {
    equals: Box<dyn Fn(&T, &T) -> bool + Send + Sync>,
}

impl<T: ?Sized + 'static> EqualsComparator<T> {
    pub fn new<F>(equals: F) -> Self
    where
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        Self {
            equals: Box::new(equals),
        }
    }

    /// Plain `==`.
    pub fn strict() -> Self
    where
        T: PartialEq,
    {
        Self::new(|a: &T, b: &T| a == b)
    }

    /// Case-, whitespace- and BOM-insensitive string equality.
    pub fn loose() -> Self
    where
        T: AsRef<str>,
    {
        Self::new(|a: &T, b: &T| labels_match_loosely(a.as_ref(), b.as_ref()))
    }
}

impl<T: ?Sized + 'static> fmt::Debug for EqualsComparator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EqualsComparator").finish_non_exhaustive()
    }
}

impl<T: ?Sized + 'static> EditComparator<T> for EqualsComparator<T> {
    fn compare(&self, from: &T, to: &T) -> u32 {
        u32::from(!(self.equals)(from, to))
    }

    fn delete(&self, _from: &T) -> u32 {
        1
    }

    fn insert(&self, _to: &T) -> u32 {
        1
    }
}
