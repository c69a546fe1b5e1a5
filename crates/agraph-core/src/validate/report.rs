//! Validation findings and reports.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A structured validation finding.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Finding {
    pub level: FindingLevel,
    pub code: String,
    pub message: String,
    pub data: BTreeMap<String, String>,
}

impl Finding {
    pub fn new(level: FindingLevel, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            code: code.into(),
            message: message.into(),
            data: BTreeMap::new(),
        }
    }

    /// Attach a context value (annotation id, layer id, anchor id...).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FindingLevel {
    Info,
    Warning,
    Error,
}

impl FindingLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingLevel::Info => "info",
            FindingLevel::Warning => "warning",
            FindingLevel::Error => "error",
        }
    }
}

/// Everything the validator found in one graph, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ValidationReport {
    pub graph_id: String,
    pub findings: Vec<Finding>,
}

impl ValidationReport {
    pub fn new(graph_id: impl Into<String>) -> Self {
        Self {
            graph_id: graph_id.into(),
            findings: Vec::new(),
        }
    }

    pub fn has_errors(&self) -> bool {
        self.findings
            .iter()
            .any(|f| matches!(f.level, FindingLevel::Error))
    }

    /// No findings at all.
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.level == FindingLevel::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.level == FindingLevel::Warning)
    }

    /// Findings with the given code.
    pub fn with_code<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a Finding> + 'a {
        self.findings.iter().filter(move |f| f.code == code)
    }

    /// One line per finding: `level code: message`.
    pub fn messages(&self) -> Vec<String> {
        self.findings
            .iter()
            .map(|f| format!("{} {}: {}", f.level.as_str(), f.code, f.message))
            .collect()
    }

    pub(crate) fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }
}

pub(crate) fn finding(
    level: FindingLevel,
    code: impl Into<String>,
    message: impl Into<String>,
) -> Finding {
    Finding::new(level, code, message)
}
