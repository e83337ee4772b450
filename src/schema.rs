//! Schema-related types for the document store
//!
//! Includes Schema, schema inference, and the per-store SchemaRegistry.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{FieldRule, FieldType, Record};

/// Field rules for one table, in definition order
///
/// Serialized as a JSON object mapping field names to rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    into = "serde_json::Map<String, Value>",
    try_from = "serde_json::Map<String, Value>"
)]
pub struct Schema {
    fields: Vec<(String, FieldRule)>,
}

impl Schema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, replacing an existing rule of the same name in place
    pub fn field(mut self, name: impl Into<String>, rule: FieldRule) -> Self {
        self.insert(name, rule);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, rule: FieldRule) {
        let name = name.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = rule,
            None => self.fields.push((name, rule)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldRule> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, rule)| rule)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate fields in definition order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldRule)> {
        self.fields.iter().map(|(name, rule)| (name.as_str(), rule))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Schema> for serde_json::Map<String, Value> {
    fn from(schema: Schema) -> Self {
        schema
            .fields
            .into_iter()
            .filter_map(|(name, rule)| serde_json::to_value(rule).ok().map(|v| (name, v)))
            .collect()
    }
}

impl TryFrom<serde_json::Map<String, Value>> for Schema {
    type Error = serde_json::Error;

    fn try_from(map: serde_json::Map<String, Value>) -> Result<Self, Self::Error> {
        let fields = map
            .into_iter()
            .map(|(name, raw)| Ok((name, serde_json::from_value::<FieldRule>(raw)?)))
            .collect::<Result<Vec<_>, serde_json::Error>>()?;
        Ok(Self { fields })
    }
}

/// Derive a schema from a single sample record
///
/// Each top-level field gets the runtime type of its sample value. Inferred
/// fields are optional: only a later value of a different type is rejected.
/// Fields whose sample is `null` carry no type information and are skipped.
pub fn infer_schema(record: &Record) -> Schema {
    record
        .iter()
        .filter_map(|(name, value)| {
            FieldType::of(value).map(|field_type| (name.clone(), FieldRule::new(field_type).optional()))
        })
        .fold(Schema::new(), |schema, (name, rule)| schema.field(name, rule))
}

/// Per-store mapping from table name to schema
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Schema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or overwrite the schema for `table`, returning the previous one
    ///
    /// Rows already stored are not re-checked against the new schema.
    pub fn define(&mut self, table: impl Into<String>, schema: Schema) -> Option<Schema> {
        self.schemas.insert(table.into(), schema)
    }

    pub fn get(&self, table: &str) -> Option<&Schema> {
        self.schemas.get(table)
    }

    pub fn contains(&self, table: &str) -> bool {
        self.schemas.contains_key(table)
    }

    pub fn as_map(&self) -> &HashMap<String, Schema> {
        &self.schemas
    }

    pub fn clear(&mut self) {
        self.schemas.clear();
    }
}

impl From<HashMap<String, Schema>> for SchemaRegistry {
    fn from(schemas: HashMap<String, Schema>) -> Self {
        Self { schemas }
    }
}
