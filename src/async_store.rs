//! AsyncDocumentStore - asynchronous store over a per-record adapter
//!
//! Tables are loaded from the adapter the first time they are used. Each
//! mutation issues exactly one [`RecordAdapter::apply`] call carrying the
//! rows it wrote and removed; the mutation is durable once that call
//! resolves. Schemas live in memory only: a table loaded from storage without
//! a prior `define_table` gets a schema inferred from its first row.

use std::collections::HashSet;

use serde_json::Value;
use tracing::{debug, warn};

use crate::aggregate::Group;
use crate::config::StoreConfig;
use crate::engine::{ChangeSet, Engine};
use crate::error::{Result, StoreError};
use crate::persistence::RecordAdapter;
use crate::providers::{Clock, IdGenerator};
use crate::schema::Schema;
use crate::types::{Batch, Record};

/// Schema-aware document store persisted one record at a time
pub struct AsyncDocumentStore<R: RecordAdapter> {
    engine: Engine,
    adapter: R,
    loaded: HashSet<String>,
}

impl<R: RecordAdapter> AsyncDocumentStore<R> {
    /// Create a store; nothing is read from `adapter` until a table is used
    pub fn new(adapter: R, config: &StoreConfig) -> Self {
        Self {
            engine: Engine::new(config),
            adapter,
            loaded: HashSet::new(),
        }
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

    pub fn adapter(&self) -> &R {
        &self.adapter
    }

    /// Load `table` if this is its first use and return the engine
    ///
    /// Use the returned engine for reads this facade does not wrap.
    pub async fn load(&mut self, table: &str) -> Result<&Engine> {
        if !self.loaded.contains(table) {
            let rows = self
                .adapter
                .get_all(table)
                .await
                .map_err(StoreError::into_persistence)?;
            debug!(table, count = rows.len(), "loaded table");
            self.engine.load_table(table, rows);
            self.loaded.insert(table.to_string());
        }
        Ok(&self.engine)
    }

    async fn commit(&self, table: &str, changes: &ChangeSet) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }
        self.adapter.apply(table, changes).await.map_err(|e| {
            let e = e.into_persistence();
            warn!(table, error = %e, "failed to apply changes");
            e
        })
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Register or overwrite the schema of `table`
    pub async fn define_table(&mut self, table: &str, schema: Schema) -> Result<()> {
        self.load(table).await?;
        self.engine.define_table(table, schema);
        Ok(())
    }

    /// Validate and append records, returning them as stored
    pub async fn insert(&mut self, table: &str, records: impl Into<Batch>) -> Result<Vec<Record>> {
        self.load(table).await?;
        let changes = self.engine.insert(table, records)?;
        self.commit(table, &changes).await?;
        Ok(changes.upserted)
    }

    /// Merge patches into matching rows; returns the number of rows updated
    pub async fn update(
        &mut self,
        table: &str,
        patches: impl Into<Batch>,
        match_spec: Option<&Record>,
    ) -> Result<usize> {
        self.load(table).await?;
        let changes = self.engine.update(table, patches, match_spec)?;
        self.commit(table, &changes).await?;
        Ok(changes.upserted.len())
    }

    /// Remove rows equal to `match_spec` (every row for `None`)
    pub async fn delete(&mut self, table: &str, match_spec: Option<&Record>) -> Result<usize> {
        self.load(table).await?;
        let changes = self.engine.delete(table, match_spec);
        self.commit(table, &changes).await?;
        Ok(changes.removed.len())
    }

    /// Remove rows matching `filter`
    pub async fn delete_where(
        &mut self,
        table: &str,
        filter: impl Fn(&Record) -> bool,
    ) -> Result<usize> {
        self.load(table).await?;
        let changes = self.engine.delete_where(table, filter);
        self.commit(table, &changes).await?;
        Ok(changes.removed.len())
    }

    /// Strip `field` from every row; returns the number of rows touched
    pub async fn remove_field(&mut self, table: &str, field: &str) -> Result<usize> {
        self.load(table).await?;
        let changes = self.engine.remove_field(table, field);
        self.commit(table, &changes).await?;
        Ok(changes.upserted.len())
    }

    /// Copy the schema and rows of `source` into `dest`
    pub async fn clone_table(&mut self, source: &str, dest: &str) -> Result<Vec<Record>> {
        self.load(source).await?;
        self.load(dest).await?;
        let changes = self.engine.clone_table(source, dest)?;
        self.commit(dest, &changes).await?;
        Ok(changes.upserted)
    }

    /// Drop every table and schema, in memory and in storage
    ///
    /// Tables that were never loaded are cleared from storage as well.
    pub async fn drop_all(&mut self) -> Result<()> {
        self.engine.clear();
        self.loaded.clear();
        self.adapter.clear_all().await.map_err(|e| {
            let e = e.into_persistence();
            warn!(error = %e, "failed to clear record store");
            e
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn select(
        &mut self,
        table: &str,
        filter: impl Fn(&Record) -> bool,
    ) -> Result<Vec<Record>> {
        Ok(self.load(table).await?.select(table, filter))
    }

    pub async fn all(&mut self, table: &str) -> Result<Vec<Record>> {
        Ok(self.load(table).await?.all(table))
    }

    pub async fn find_one(
        &mut self,
        table: &str,
        filter: impl Fn(&Record) -> bool,
    ) -> Result<Option<Record>> {
        Ok(self.load(table).await?.find_one(table, filter))
    }

    pub async fn count(&mut self, table: &str, filter: impl Fn(&Record) -> bool) -> Result<usize> {
        Ok(self.load(table).await?.count(table, filter))
    }

    pub async fn exists(&mut self, table: &str, filter: impl Fn(&Record) -> bool) -> Result<bool> {
        Ok(self.load(table).await?.exists(table, filter))
    }

    pub async fn latest(&mut self, table: &str, field: &str) -> Result<Option<Record>> {
        Ok(self.load(table).await?.latest(table, field))
    }

    pub async fn distinct(
        &mut self,
        table: &str,
        field: &str,
        filter: impl Fn(&Record) -> bool,
    ) -> Result<Vec<Value>> {
        Ok(self.load(table).await?.distinct(table, field, filter))
    }

    pub async fn sum(
        &mut self,
        table: &str,
        field: &str,
        filter: impl Fn(&Record) -> bool,
    ) -> Result<f64> {
        Ok(self.load(table).await?.sum(table, field, filter))
    }

    pub async fn average(
        &mut self,
        table: &str,
        field: &str,
        filter: impl Fn(&Record) -> bool,
    ) -> Result<f64> {
        Ok(self.load(table).await?.average(table, field, filter))
    }

    pub async fn min(
        &mut self,
        table: &str,
        field: &str,
        filter: impl Fn(&Record) -> bool,
    ) -> Result<Option<f64>> {
        Ok(self.load(table).await?.min(table, field, filter))
    }

    pub async fn max(
        &mut self,
        table: &str,
        field: &str,
        filter: impl Fn(&Record) -> bool,
    ) -> Result<Option<f64>> {
        Ok(self.load(table).await?.max(table, field, filter))
    }

    pub async fn group_by(
        &mut self,
        table: &str,
        field: &str,
        filter: impl Fn(&Record) -> bool,
    ) -> Result<Vec<Group>> {
        Ok(self.load(table).await?.group_by(table, field, filter))
    }

    /// Run a query, loading its table first
    pub async fn query(&mut self, sql: &str) -> Result<Vec<Record>> {
        self.query_with_params(sql, &[]).await
    }

    /// Run a query with `?` placeholders bound from `params`
    pub async fn query_with_params(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Record>> {
        let compiled = crate::query::parse_with_params(sql, params)?.compile()?;
        let engine = self.load(compiled.table()).await?;
        Ok(compiled.run(engine))
    }
}
