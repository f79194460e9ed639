//! Option schemas and option resolution
//!
//! An execution type declares its configurable knobs as an
//! [`OptionSchema`]. Each entry is either a bare default value or an
//! [`OptionDescriptor`] carrying a default plus presentation metadata.
//! A descriptor without a default documents an option but never shows up
//! in the effective options of a run.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Effective options of one run
pub type Options = Map<String, Value>;

/// Keys that mark a JSON object as a descriptor rather than a plain default
const DESCRIPTOR_KEYS: [&str; 4] = ["default", "type", "label", "placeholder"];

// ─────────────────────────────────────────────────────────────────
// Schema Entries
// ─────────────────────────────────────────────────────────────────

/// Declaration of one option with presentation metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionDescriptor {
    /// Default value; `None` makes the entry metadata-only
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub default: Option<Value>,

    /// Value type hint (e.g. "string")
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Human-readable label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Input placeholder / help text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,

    /// Any further metadata
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Keeps an explicit `null` default distinct from a missing one
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl OptionDescriptor {
    /// Create an empty, metadata-only descriptor
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default value
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Set the value type hint
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Set the label
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the placeholder text
    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    /// Whether this descriptor only documents an option
    pub fn is_metadata_only(&self) -> bool {
        self.default.is_none()
    }
}

/// One entry of an option schema
#[derive(Debug, Clone, PartialEq)]
pub enum OptionSpec {
    /// A bare default value
    Value(Value),
    /// A descriptor object
    Described(OptionDescriptor),
}

impl OptionSpec {
    /// The default this entry contributes, if any
    pub fn default_value(&self) -> Option<&Value> {
        match self {
            OptionSpec::Value(value) => Some(value),
            OptionSpec::Described(descriptor) => descriptor.default.as_ref(),
        }
    }

    fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) if DESCRIPTOR_KEYS.iter().any(|k| map.contains_key(*k)) => {
                let descriptor = serde_json::from_value(Value::Object(map))
                    .map_err(|e| Error::Config(format!("Invalid option descriptor: {}", e)))?;
                Ok(OptionSpec::Described(descriptor))
            }
            other => Ok(OptionSpec::Value(other)),
        }
    }
}

impl From<OptionDescriptor> for OptionSpec {
    fn from(descriptor: OptionDescriptor) -> Self {
        OptionSpec::Described(descriptor)
    }
}

impl From<Value> for OptionSpec {
    fn from(value: Value) -> Self {
        OptionSpec::Value(value)
    }
}

// ─────────────────────────────────────────────────────────────────
// Option Schema
// ─────────────────────────────────────────────────────────────────

/// Declared options of an execution type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionSchema {
    entries: BTreeMap<String, OptionSpec>,
}

impl OptionSchema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an option by its bare default
    pub fn value(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.entries.insert(name.into(), OptionSpec::Value(default.into()));
        self
    }

    /// Declare an option through a descriptor
    pub fn describe(mut self, name: impl Into<String>, descriptor: OptionDescriptor) -> Self {
        self.entries.insert(name.into(), OptionSpec::Described(descriptor));
        self
    }

    /// Insert or replace an entry
    pub fn insert(&mut self, name: impl Into<String>, spec: impl Into<OptionSpec>) {
        self.entries.insert(name.into(), spec.into());
    }

    /// Build a schema from a JSON object
    ///
    /// Objects carrying any of `default`, `type`, `label` or `placeholder`
    /// are read as descriptors; every other value is a bare default.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(Error::Config("Option schema must be a JSON object".to_string()));
        };
        let mut schema = Self::new();
        for (name, entry) in map {
            schema.entries.insert(name, OptionSpec::from_json(entry)?);
        }
        Ok(schema)
    }

    /// Look up an entry
    pub fn get(&self, name: &str) -> Option<&OptionSpec> {
        self.entries.get(name)
    }

    /// Iterate entries in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &OptionSpec)> {
        self.entries.iter()
    }

    /// Number of declared entries, metadata-only ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is declared
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Defaults of every entry that has one
    pub fn defaults(&self) -> Options {
        self.entries
            .iter()
            .filter_map(|(name, spec)| spec.default_value().map(|v| (name.clone(), v.clone())))
            .collect()
    }

    /// Layer a child schema over this one
    ///
    /// Child entries replace parent entries; two bare object defaults are
    /// deep-merged so a child can refine part of a nested default.
    pub fn extended_with(&self, child: &OptionSchema) -> OptionSchema {
        let mut merged = self.clone();
        for (name, spec) in &child.entries {
            let combined = match (merged.entries.remove(name), spec) {
                (Some(OptionSpec::Value(mut base)), OptionSpec::Value(overlay))
                    if base.is_object() && overlay.is_object() =>
                {
                    deep_merge(&mut base, overlay);
                    OptionSpec::Value(base)
                }
                _ => spec.clone(),
            };
            merged.entries.insert(name.clone(), combined);
        }
        merged
    }

    /// Resolve the effective options for one run
    pub fn resolve(&self, overrides: Option<&Options>) -> Options {
        resolve(self, overrides)
    }
}

// ─────────────────────────────────────────────────────────────────
// Resolution
// ─────────────────────────────────────────────────────────────────

/// Merge caller overrides over the schema's defaults
///
/// Metadata-only descriptors contribute nothing, descriptors contribute
/// their default, and overrides win at every leaf. Nested objects merge
/// key by key; arrays and scalars replace atomically.
pub fn resolve(schema: &OptionSchema, overrides: Option<&Options>) -> Options {
    let mut effective = Value::Object(schema.defaults());
    if let Some(overrides) = overrides {
        for (name, value) in overrides {
            merge_key(&mut effective, name, value);
        }
    }
    match effective {
        Value::Object(map) => map,
        _ => Options::new(),
    }
}

/// Recursively merge `overlay` into `base`
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match overlay {
        Value::Object(overlay_map) if base.is_object() => {
            for (key, value) in overlay_map {
                merge_key(base, key, value);
            }
        }
        _ => *base = overlay.clone(),
    }
}

fn merge_key(base: &mut Value, key: &str, value: &Value) {
    if let Value::Object(map) = base {
        match map.get_mut(key) {
            Some(existing) => deep_merge(existing, value),
            None => {
                map.insert(key.to_string(), value.clone());
            }
        }
    }
}
