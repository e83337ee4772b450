//! Core type definitions for the document store
//!
//! Includes records, field types, field rules, and default values.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored document: field name to JSON value, in insertion order
pub type Record = serde_json::Map<String, Value>;

// ============================================================================
// Field Types
// ============================================================================

/// Runtime type of a field value
///
/// Arrays and nested objects both report as `Object`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Object,
}

impl FieldType {
    /// Detect the type of a value; `None` for `null`
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(_) => Some(FieldType::String),
            Value::Number(_) => Some(FieldType::Number),
            Value::Bool(_) => Some(FieldType::Boolean),
            Value::Array(_) | Value::Object(_) => Some(FieldType::Object),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Object => "object",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of a value's runtime type, including `null`
pub fn type_name(value: &Value) -> &'static str {
    FieldType::of(value).map_or("null", |t| t.as_str())
}

// ============================================================================
// Default Values
// ============================================================================

/// Value applied to a field that is absent at insert time
#[derive(Clone)]
pub enum DefaultValue {
    /// A fixed value, cloned into each record
    Static(Value),
    /// Called once per record that needs the default
    Producer(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultValue {
    pub fn resolve(&self) -> Value {
        match self {
            DefaultValue::Static(value) => value.clone(),
            DefaultValue::Producer(produce) => produce(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Static(value) => f.debug_tuple("Static").field(value).finish(),
            DefaultValue::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

impl PartialEq for DefaultValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DefaultValue::Static(a), DefaultValue::Static(b)) => a == b,
            (DefaultValue::Producer(a), DefaultValue::Producer(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// ============================================================================
// Field Rules
// ============================================================================

fn default_required() -> bool {
    true
}

/// Contract for one schema field
///
/// Serialized as `{"type": "number", "required": true, "default": 0}`.
/// The shorthand `"number"` is accepted when reading and means a required
/// field without default. Producer defaults are dropped on serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "RawFieldRule", from = "RawFieldRule")]
pub struct FieldRule {
    pub field_type: FieldType,
    /// Whether the field must be present once defaults are applied (default: true)
    pub required: bool,
    pub default: Option<DefaultValue>,
}

impl FieldRule {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: true,
            default: None,
        }
    }

    pub fn string() -> Self {
        Self::new(FieldType::String)
    }

    pub fn number() -> Self {
        Self::new(FieldType::Number)
    }

    pub fn boolean() -> Self {
        Self::new(FieldType::Boolean)
    }

    pub fn object() -> Self {
        Self::new(FieldType::Object)
    }

    /// Allow the field to be absent
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Set a static default value
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Static(value.into()));
        self
    }

    /// Set a default computed for every record that lacks the field
    pub fn default_with<F>(mut self, produce: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Producer(Arc::new(produce)));
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawFieldRule {
    Shorthand(FieldType),
    Full {
        #[serde(rename = "type")]
        field_type: FieldType,
        #[serde(default = "default_required")]
        required: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<Value>,
    },
}

impl From<RawFieldRule> for FieldRule {
    fn from(raw: RawFieldRule) -> Self {
        match raw {
            RawFieldRule::Shorthand(field_type) => FieldRule::new(field_type),
            RawFieldRule::Full {
                field_type,
                required,
                default,
            } => FieldRule {
                field_type,
                required,
                default: default.map(DefaultValue::Static),
            },
        }
    }
}

impl From<FieldRule> for RawFieldRule {
    fn from(rule: FieldRule) -> Self {
        let default = match rule.default {
            Some(DefaultValue::Static(value)) => Some(value),
            _ => None,
        };
        RawFieldRule::Full {
            field_type: rule.field_type,
            required: rule.required,
            default,
        }
    }
}

// ============================================================================
// Batches
// ============================================================================

/// One record or a sequence of records, as accepted by insert and update
#[derive(Debug, Clone, PartialEq)]
pub enum Batch {
    One(Record),
    Many(Vec<Record>),
}

impl Batch {
    pub fn into_vec(self) -> Vec<Record> {
        match self {
            Batch::One(record) => vec![record],
            Batch::Many(records) => records,
        }
    }

    pub fn is_many(&self) -> bool {
        matches!(self, Batch::Many(_))
    }
}

impl From<Record> for Batch {
    fn from(record: Record) -> Self {
        Batch::One(record)
    }
}

impl From<Vec<Record>> for Batch {
    fn from(records: Vec<Record>) -> Self {
        Batch::Many(records)
    }
}

// ============================================================================
// Value Helpers
// ============================================================================

/// A field counts as supplied when present, non-null and not an empty string
pub fn is_supplied(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// Numeric view of a value, if it is a JSON number
pub fn as_number(value: &Value) -> Option<f64> {
    value.as_f64()
}

/// Strict equality: numbers compare numerically, everything else structurally
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Whether `record` equals `spec` on every key of `spec`
///
/// A key missing from the record never matches, even against `null`.
pub fn matches_spec(record: &Record, spec: &Record) -> bool {
    spec.iter().all(|(key, expected)| {
        record
            .get(key)
            .is_some_and(|actual| values_equal(actual, expected))
    })
}
