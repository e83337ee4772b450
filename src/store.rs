//! DocumentStore - synchronous store over a snapshot adapter
//!
//! Every mutation runs against the in-memory [`Engine`] and is then flushed
//! by rewriting the whole snapshot. Mutations that change nothing skip the
//! flush.

use std::ops::Deref;

use tracing::{info, warn};

use crate::config::StoreConfig;
use crate::engine::{ChangeSet, Engine};
use crate::error::{Result, StoreError};
use crate::persistence::SnapshotAdapter;
use crate::providers::{Clock, IdGenerator};
use crate::schema::Schema;
use crate::types::{Batch, Record};

/// Schema-aware document store persisted as whole-database snapshots
///
/// Read operations (`select`, `find_one`, aggregates, `query`, ...) come from
/// the [`Engine`] this store dereferences to.
pub struct DocumentStore<S: SnapshotAdapter> {
    engine: Engine,
    adapter: S,
}

impl<S: SnapshotAdapter> DocumentStore<S> {
    /// Load the stored snapshot from `adapter`
    ///
    /// A snapshot that cannot be parsed is treated as empty by the adapter.
    pub fn open(adapter: S, config: &StoreConfig) -> Result<Self> {
        let tables = adapter.load_all().map_err(StoreError::into_persistence)?;
        let schemas = adapter
            .load_schemas()
            .map_err(StoreError::into_persistence)?;

        let mut engine = Engine::new(config);
        engine.restore(tables, schemas);
        info!(tables = engine.table_names().len(), "opened document store");

        Ok(Self { engine, adapter })
    }

    /// Replace the id generator
    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.engine = self.engine.with_id_generator(ids);
        self
    }

    /// Replace the clock
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.engine = self.engine.with_clock(clock);
        self
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn adapter(&self) -> &S {
        &self.adapter
    }

    pub fn into_adapter(self) -> S {
        self.adapter
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Register or overwrite the schema of `table`
    pub fn define_table(&mut self, table: &str, schema: Schema) -> Result<()> {
        self.engine.define_table(table, schema);
        self.persist()
    }

    /// Validate and append records, returning them as stored
    pub fn insert(&mut self, table: &str, records: impl Into<Batch>) -> Result<Vec<Record>> {
        let changes = self.engine.insert(table, records)?;
        self.persist_changes(&changes)?;
        Ok(changes.upserted)
    }

    /// Merge patches into matching rows; returns the number of rows updated
    ///
    /// See [`Engine::update`] for how rows are targeted.
    pub fn update(
        &mut self,
        table: &str,
        patches: impl Into<Batch>,
        match_spec: Option<&Record>,
    ) -> Result<usize> {
        let changes = self.engine.update(table, patches, match_spec)?;
        self.persist_changes(&changes)?;
        Ok(changes.upserted.len())
    }

    /// Remove rows equal to `match_spec` (every row for `None`)
    pub fn delete(&mut self, table: &str, match_spec: Option<&Record>) -> Result<usize> {
        let changes = self.engine.delete(table, match_spec);
        self.persist_changes(&changes)?;
        Ok(changes.removed.len())
    }

    /// Remove rows matching `filter`
    pub fn delete_where(
        &mut self,
        table: &str,
        filter: impl Fn(&Record) -> bool,
    ) -> Result<usize> {
        let changes = self.engine.delete_where(table, filter);
        self.persist_changes(&changes)?;
        Ok(changes.removed.len())
    }

    /// Strip `field` from every row; returns the number of rows touched
    pub fn remove_field(&mut self, table: &str, field: &str) -> Result<usize> {
        let changes = self.engine.remove_field(table, field);
        self.persist_changes(&changes)?;
        Ok(changes.upserted.len())
    }

    /// Copy the schema and rows of `source` into `dest`
    pub fn clone_table(&mut self, source: &str, dest: &str) -> Result<Vec<Record>> {
        let changes = self.engine.clone_table(source, dest)?;
        self.persist()?;
        Ok(changes.upserted)
    }

    /// Drop every table and schema, in memory and in storage
    pub fn drop_all(&mut self) -> Result<()> {
        self.engine.clear();
        self.adapter.clear().map_err(|e| {
            let e = e.into_persistence();
            warn!(error = %e, "failed to clear snapshot");
            e
        })
    }

    fn persist_changes(&mut self, changes: &ChangeSet) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }
        self.persist()
    }

    fn persist(&mut self) -> Result<()> {
        self.adapter
            .save_all(self.engine.tables(), self.engine.schemas())
            .map_err(|e| {
                let e = e.into_persistence();
                warn!(error = %e, "failed to save snapshot");
                e
            })
    }
}

impl<S: SnapshotAdapter> Deref for DocumentStore<S> {
    type Target = Engine;

    fn deref(&self) -> &Engine {
        &self.engine
    }
}
