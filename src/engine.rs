//! In-memory document engine
//!
//! `Engine` owns every table and schema of a store. It validates and applies
//! mutations synchronously and reports what changed as a [`ChangeSet`]; the
//! store facades decide how that change reaches durable storage.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate};
use serde_json::Value;
use tracing::debug;

use crate::config::{AutoFields, StoreConfig};
use crate::error::{Result, StoreError};
use crate::providers::{Clock, IdGenerator, SystemClock, UuidGenerator};
use crate::schema::{Schema, SchemaRegistry, infer_schema};
use crate::types::{Batch, Record, is_supplied, matches_spec, type_name, values_equal};
use crate::validation::apply_defaults_and_validate;

/// Engine-assigned identifier field
pub const ID_FIELD: &str = "id";

/// Engine-assigned creation timestamp field
pub const CREATED_AT_FIELD: &str = "createdAt";

const MAX_ID_ATTEMPTS: usize = 32;

/// Rows written or removed by a single mutation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    /// Rows inserted or replaced, in their post-mutation form
    pub upserted: Vec<Record>,
    /// Rows removed from the table
    pub removed: Vec<Record>,
}

impl ChangeSet {
    fn upserts(rows: Vec<Record>) -> Self {
        Self {
            upserted: rows,
            removed: Vec::new(),
        }
    }

    fn removals(rows: Vec<Record>) -> Self {
        Self {
            upserted: Vec::new(),
            removed: rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.upserted.is_empty() && self.removed.is_empty()
    }

    /// Ids of the upserted rows, in order
    ///
    /// Record adapters key rows by id, so a row without a string id is an error.
    pub fn upserted_ids(&self) -> Result<Vec<&str>> {
        ids_of(&self.upserted)
    }

    /// Ids of the removed rows, in order
    pub fn removed_ids(&self) -> Result<Vec<&str>> {
        ids_of(&self.removed)
    }
}

fn ids_of(rows: &[Record]) -> Result<Vec<&str>> {
    rows.iter()
        .map(|row| {
            record_id(row).ok_or_else(|| {
                StoreError::persistence(format!(
                    "Record has no string id: {}",
                    Value::Object(row.clone())
                ))
            })
        })
        .collect()
}

/// The `id` of a record, when it is a string
pub fn record_id(record: &Record) -> Option<&str> {
    record.get(ID_FIELD).and_then(Value::as_str)
}

/// Schema-aware in-memory tables
pub struct Engine {
    tables: HashMap<String, Vec<Record>>,
    registry: SchemaRegistry,
    auto_fields: AutoFields,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl Engine {
    /// Create an empty engine using UUID ids and the system clock
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            tables: HashMap::new(),
            registry: SchemaRegistry::new(),
            auto_fields: config.auto_fields.clone(),
            ids: Arc::new(UuidGenerator),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the id generator
    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    /// Replace the clock
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Replace all state with previously persisted tables and schemas
    pub(crate) fn restore(
        &mut self,
        mut tables: HashMap<String, Vec<Record>>,
        schemas: HashMap<String, Schema>,
    ) {
        for name in schemas.keys() {
            tables.entry(name.clone()).or_default();
        }
        self.tables = tables;
        self.registry = SchemaRegistry::from(schemas);
    }

    /// Install rows loaded for one table
    ///
    /// A table without a schema gets one inferred from its first row.
    pub(crate) fn load_table(&mut self, table: &str, rows: Vec<Record>) {
        if !self.registry.contains(table) {
            match rows.first() {
                Some(first) => {
                    self.registry.define(table, infer_schema(first));
                }
                None => return,
            }
        }
        self.tables.insert(table.to_string(), rows);
    }

    // =========================================================================
    // Schema Operations
    // =========================================================================

    /// Register or overwrite the schema of `table`, creating it if needed
    ///
    /// Rows already in the table are not re-validated.
    pub fn define_table(&mut self, table: &str, schema: Schema) {
        self.tables.entry(table.to_string()).or_default();
        self.registry.define(table, schema);
        debug!(table, "defined table");
    }

    pub fn schema(&self, table: &str) -> Option<&Schema> {
        self.registry.get(table)
    }

    pub fn schemas(&self) -> &HashMap<String, Schema> {
        self.registry.as_map()
    }

    pub fn tables(&self) -> &HashMap<String, Vec<Record>> {
        &self.tables
    }

    /// Names of every known table, sorted
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tables
            .keys()
            .chain(self.registry.as_map().keys())
            .cloned()
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Rows of `table` in insertion order; empty for unknown tables
    pub fn rows(&self, table: &str) -> &[Record] {
        self.tables.get(table).map_or(&[], Vec::as_slice)
    }

    // =========================================================================
    // Record Operations
    // =========================================================================

    /// Validate and append one or more records
    ///
    /// An unknown table gets a schema inferred from the first record. The
    /// whole batch is validated before any row is appended. A supplied `id`
    /// must be a string not already used in the table or earlier in the batch.
    pub fn insert(&mut self, table: &str, records: impl Into<Batch>) -> Result<ChangeSet> {
        let records = records.into().into_vec();
        let Some(first) = records.first() else {
            return Ok(ChangeSet::default());
        };

        let inferred = !self.registry.contains(table);
        let schema = match self.registry.get(table) {
            Some(schema) => schema.clone(),
            None => infer_schema(first),
        };
        let prepared = self.prepare_rows(table, &schema, records)?;

        if inferred {
            debug!(table, fields = schema.len(), "inferred schema");
            self.registry.define(table, schema);
        }
        Ok(self.append(table, prepared))
    }

    /// Validate `records` against `schema` and assign auto fields, without
    /// touching any table
    fn prepare_rows(
        &self,
        table: &str,
        schema: &Schema,
        records: Vec<Record>,
    ) -> Result<Vec<Record>> {
        let mut validated = records
            .into_iter()
            .map(|record| apply_defaults_and_validate(schema, record))
            .collect::<Result<Vec<_>>>()?;

        let mut taken: HashSet<String> = self
            .rows(table)
            .iter()
            .filter_map(record_id)
            .map(str::to_owned)
            .collect();
        for record in &mut validated {
            if self.auto_fields.id && !is_supplied(record.get(ID_FIELD)) {
                let id = self.fresh_id(table, &taken)?;
                record.insert(ID_FIELD.to_string(), Value::String(id));
            }
            match record.get(ID_FIELD) {
                Some(Value::String(id)) if !id.is_empty() => {
                    if !taken.insert(id.clone()) {
                        return Err(StoreError::conflict(format!(
                            "Duplicate id '{}' in table {}",
                            id, table
                        )));
                    }
                }
                Some(other) if is_supplied(Some(other)) => {
                    return Err(StoreError::type_mismatch(
                        ID_FIELD,
                        "string",
                        type_name(other),
                    ));
                }
                _ => {}
            }
            if self.auto_fields.created_at && !is_supplied(record.get(CREATED_AT_FIELD)) {
                record.insert(CREATED_AT_FIELD.to_string(), Value::String(self.clock.now()));
            }
        }
        Ok(validated)
    }

    fn append(&mut self, table: &str, rows: Vec<Record>) -> ChangeSet {
        self.tables
            .entry(table.to_string())
            .or_default()
            .extend(rows.iter().cloned());

        debug!(table, count = rows.len(), "inserted records");
        ChangeSet::upserts(rows)
    }

    fn fresh_id(&self, table: &str, taken: &HashSet<String>) -> Result<String> {
        (0..MAX_ID_ATTEMPTS)
            .map(|_| self.ids.generate())
            .find(|id| !taken.contains(id))
            .ok_or_else(|| StoreError::IdExhausted(table.to_string()))
    }

    /// Rows matching `filter`, in table order
    pub fn select(&self, table: &str, filter: impl Fn(&Record) -> bool) -> Vec<Record> {
        self.rows(table)
            .iter()
            .filter(|row| filter(row))
            .cloned()
            .collect()
    }

    /// Every row of `table`
    pub fn all(&self, table: &str) -> Vec<Record> {
        self.rows(table).to_vec()
    }

    pub fn find_one(&self, table: &str, filter: impl Fn(&Record) -> bool) -> Option<Record> {
        self.rows(table).iter().find(|row| filter(row)).cloned()
    }

    pub fn count(&self, table: &str, filter: impl Fn(&Record) -> bool) -> usize {
        self.rows(table).iter().filter(|row| filter(row)).count()
    }

    pub fn exists(&self, table: &str, filter: impl Fn(&Record) -> bool) -> bool {
        self.rows(table).iter().any(|row| filter(row))
    }

    /// Merge patches into targeted rows
    ///
    /// A row is targeted by a patch carrying the same `id`; that match wins.
    /// Otherwise a single patch targets every row equal to `match_spec` on all
    /// of its keys. Batches only match by id. Patch fields overwrite row
    /// fields except `id`. Every merged row is validated before any is stored.
    pub fn update(
        &mut self,
        table: &str,
        patches: impl Into<Batch>,
        match_spec: Option<&Record>,
    ) -> Result<ChangeSet> {
        let batch = patches.into();
        let single = !batch.is_many();
        let patches = batch.into_vec();
        let schema = self.registry.get(table).cloned().unwrap_or_default();

        let mut replacements = Vec::new();
        for (index, row) in self.rows(table).iter().enumerate() {
            let by_id = row
                .get(ID_FIELD)
                .filter(|id| is_supplied(Some(*id)))
                .and_then(|id| {
                    patches.iter().find(|patch| {
                        patch
                            .get(ID_FIELD)
                            .is_some_and(|patch_id| values_equal(patch_id, id))
                    })
                });
            let target = by_id.or_else(|| match match_spec {
                Some(spec) if single && matches_spec(row, spec) => patches.first(),
                _ => None,
            });

            if let Some(patch) = target {
                let merged = apply_defaults_and_validate(&schema, merge(row, patch))?;
                replacements.push((index, merged));
            }
        }

        if let Some(rows) = self.tables.get_mut(table) {
            for (index, merged) in &replacements {
                rows[*index] = merged.clone();
            }
        }

        debug!(table, count = replacements.len(), "updated records");
        Ok(ChangeSet::upserts(
            replacements.into_iter().map(|(_, row)| row).collect(),
        ))
    }

    /// Remove rows equal to `match_spec` on all of its keys (all rows for `None`)
    pub fn delete(&mut self, table: &str, match_spec: Option<&Record>) -> ChangeSet {
        self.delete_where(table, |row| match_spec.is_none_or(|spec| matches_spec(row, spec)))
    }

    /// Remove rows matching `filter`
    pub fn delete_where(&mut self, table: &str, filter: impl Fn(&Record) -> bool) -> ChangeSet {
        let Some(rows) = self.tables.get_mut(table) else {
            return ChangeSet::default();
        };

        let (removed, kept): (Vec<Record>, Vec<Record>) =
            std::mem::take(rows).into_iter().partition(|row| filter(row));
        *rows = kept;

        debug!(table, count = removed.len(), "deleted records");
        ChangeSet::removals(removed)
    }

    /// Strip `field` from every row; the schema is left as it is
    pub fn remove_field(&mut self, table: &str, field: &str) -> ChangeSet {
        let Some(rows) = self.tables.get_mut(table) else {
            return ChangeSet::default();
        };

        let mut changed = Vec::new();
        let stripped: Vec<Record> = rows
            .iter()
            .map(|row| {
                if !row.contains_key(field) {
                    return row.clone();
                }
                let mut copy = row.clone();
                copy.shift_remove(field);
                changed.push(copy.clone());
                copy
            })
            .collect();
        *rows = stripped;

        debug!(table, field, count = changed.len(), "removed field");
        ChangeSet::upserts(changed)
    }

    /// Copy the schema and rows of `source` into `dest`
    ///
    /// Copied rows keep their `id` and `createdAt`. Every row is validated
    /// against the copied schema, and checked against ids already in `dest`,
    /// before `dest` is defined.
    pub fn clone_table(&mut self, source: &str, dest: &str) -> Result<ChangeSet> {
        let schema = self
            .registry
            .get(source)
            .cloned()
            .ok_or_else(|| StoreError::unknown_table(source))?;
        let rows = self.prepare_rows(dest, &schema, self.all(source))?;

        self.define_table(dest, schema);
        Ok(self.append(dest, rows))
    }

    /// The row with the greatest timestamp in `field`
    ///
    /// Values are RFC 3339 strings, plain dates, or epoch milliseconds. The
    /// first row is the starting candidate and is only replaced by a strictly
    /// later value, so ties keep the earliest row.
    pub fn latest(&self, table: &str, field: &str) -> Option<Record> {
        let mut best: Option<(&Record, Option<f64>)> = None;
        for row in self.rows(table) {
            let instant = row.get(field).and_then(parse_instant);
            best = match best {
                None => Some((row, instant)),
                Some((_, Some(current))) if instant.is_some_and(|at| at > current) => {
                    Some((row, instant))
                }
                keep => keep,
            };
        }
        best.map(|(row, _)| row.clone())
    }

    /// Drop every table and schema
    pub fn clear(&mut self) {
        self.tables.clear();
        self.registry.clear();
        debug!("cleared all tables");
    }
}

fn merge(row: &Record, patch: &Record) -> Record {
    let mut merged = row.clone();
    for (key, value) in patch {
        if key == ID_FIELD && row.contains_key(ID_FIELD) {
            continue;
        }
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Milliseconds since the epoch for a timestamp-like value
fn parse_instant(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|at| at.timestamp_millis() as f64)
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
                    .map(|at| at.and_utc().timestamp_millis() as f64)
            }),
        _ => None,
    }
}
