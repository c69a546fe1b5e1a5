//! Change tracking records.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Pending state of an anchor or annotation relative to the last commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ChangeStatus {
    #[default]
    NoChange,
    Create,
    Update,
    Destroy,
}

impl ChangeStatus {
    /// Status after an in-place edit: new entities stay `Create`,
    /// destroyed ones stay `Destroy`.
    pub fn updated(self) -> Self {
        match self {
            Self::NoChange | Self::Update => Self::Update,
            other => other,
        }
    }
}

/// What a change record refers to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", content = "id", rename_all = "snake_case"))]
pub enum ChangeTarget {
    Anchor(String),
    Annotation(String),
}

/// One entry of the transaction log.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Change {
    pub operation: ChangeStatus,
    pub target: ChangeTarget,
    /// Attribute touched by an update (`label`, `offset`, `parent`, ...).
    pub key: Option<String>,
}

impl Change {
    pub fn new(operation: ChangeStatus, target: ChangeTarget) -> Self {
        Self {
            operation,
            target,
            key: None,
        }
    }

    pub fn update(target: ChangeTarget, key: impl Into<String>) -> Self {
        Self {
            operation: ChangeStatus::Update,
            target,
            key: Some(key.into()),
        }
    }
}
