//! Record validation against a table schema

use crate::error::{Result, StoreError};
use crate::schema::Schema;
use crate::types::{FieldType, Record, type_name};

/// Apply schema defaults to `record` and type-check it
///
/// Walks the schema in definition order. An absent field takes its default
/// (producers are invoked here) or fails with `MissingField` when required.
/// A present, non-null field must match the declared type. Fields the schema
/// does not name are passed through untouched.
pub fn apply_defaults_and_validate(schema: &Schema, mut record: Record) -> Result<Record> {
    for (name, rule) in schema.fields() {
        if !record.contains_key(name) {
            if let Some(default) = &rule.default {
                record.insert(name.to_string(), default.resolve());
            } else if rule.required {
                return Err(StoreError::missing_field(name));
            }
        }

        if let Some(value) = record.get(name) {
            if let Some(actual) = FieldType::of(value) {
                if actual != rule.field_type {
                    return Err(StoreError::type_mismatch(
                        name,
                        rule.field_type.as_str(),
                        type_name(value),
                    ));
                }
            }
        }
    }

    Ok(record)
}
