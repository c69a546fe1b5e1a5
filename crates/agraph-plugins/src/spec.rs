//! Transformer specification types.
//!
//! A `PluginSpec` is the static declaration of a transformer: identity plus
//! the tunable parameters it accepts. Specs are data only. The host uses
//! them for registry listings and to check a `ParameterSet` before a run.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use agraph_core::AgError;

/// Stable plugin identifier, e.g. `builtin.default_offsets`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PluginId(pub String);

impl PluginId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Value type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    String,
    Integer,
    Number,
    Boolean,
    /// A layer id; checked as a string here, against the schema at run time.
    Layer,
}

impl ParameterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Layer => "layer",
        }
    }

    pub fn accepts(&self, v: &Value) -> bool {
        match self {
            Self::String | Self::Layer => v.is_string(),
            Self::Integer => v.is_i64() || v.is_u64(),
            Self::Number => v.is_number(),
            Self::Boolean => v.is_boolean(),
        }
    }
}

/// One tunable parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub kind: ParameterKind,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// When non-empty, the only accepted values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub possible_values: Vec<Value>,
    #[serde(default)]
    pub hint: String,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, kind: ParameterKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            default: None,
            possible_values: Vec::new(),
            hint: String::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, v: impl Into<Value>) -> Self {
        self.default = Some(v.into());
        self
    }

    pub fn possible(mut self, v: impl Into<Value>) -> Self {
        self.possible_values.push(v.into());
        self
    }

    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = hint.into();
        self
    }

    fn check(&self, v: &Value) -> Result<()> {
        if !self.kind.accepts(v) {
            return Err(invalid(format!(
                "parameter {} must be {}, got {v}",
                self.name,
                self.kind.as_str()
            )));
        }
        if !self.possible_values.is_empty() && !self.possible_values.contains(v) {
            return Err(invalid(format!(
                "parameter {} must be one of {:?}, got {v}",
                self.name, self.possible_values
            )));
        }
        Ok(())
    }
}

/// Static declaration of a transformer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginSpec {
    pub id: PluginId,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
    /// Arbitrary metadata for listings.
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
}

impl PluginSpec {
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: PluginId::new(id),
            name: name.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn parameter(mut self, p: ParameterSpec) -> Self {
        self.parameters.push(p);
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn get_parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Validate spec for basic quality constraints.
    pub fn validate(&self) -> Result<()> {
        if self.id.as_str().trim().is_empty() {
            anyhow::bail!("plugin id is empty");
        }
        if !self.id.as_str().is_ascii() {
            anyhow::bail!("plugin id must be ASCII");
        }
        if self.name.trim().is_empty() {
            anyhow::bail!("plugin name is empty");
        }
        if self.version.trim().is_empty() {
            anyhow::bail!("plugin version is empty");
        }

        let mut seen = BTreeSet::new();
        for p in &self.parameters {
            if !seen.insert(p.name.as_str()) {
                anyhow::bail!("duplicate parameter {} in {}", p.name, self.id.as_str());
            }
            if let Some(d) = &p.default {
                p.check(d)
                    .map_err(|e| e.context(format!("default of {}", p.name)))?;
            }
        }
        Ok(())
    }
}

/// Parameter values for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    values: BTreeMap<String, Value>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, v: impl Into<Value>) -> Self {
        self.set(name, v);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, v: impl Into<Value>) {
        self.values.insert(name.into(), v.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn get_u64(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(Value::as_u64)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Check these values against `spec` and fill in defaults.
    ///
    /// Unknown names, missing required parameters, wrong types and values
    /// outside `possible_values` are rejected with
    /// `AgError::InvalidConfiguration`.
    pub fn resolve(&self, spec: &PluginSpec) -> Result<ParameterSet> {
        if let Some(unknown) = self.names().find(|n| spec.get_parameter(n).is_none()) {
            return Err(invalid(format!(
                "unknown parameter {unknown} for {}",
                spec.id.as_str()
            )));
        }

        let mut out = ParameterSet::new();
        for p in &spec.parameters {
            match self.get(&p.name).or(p.default.as_ref()) {
                Some(v) => {
                    p.check(v)?;
                    out.set(p.name.clone(), v.clone());
                }
                None if p.required => {
                    return Err(invalid(format!(
                        "missing required parameter {} for {}",
                        p.name,
                        spec.id.as_str()
                    )));
                }
                None => {}
            }
        }
        Ok(out)
    }
}

fn invalid(msg: String) -> anyhow::Error {
    AgError::invalid_configuration(msg).into()
}
