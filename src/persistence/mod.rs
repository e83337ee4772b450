//! Persistence adapters
//!
//! Two storage shapes are supported:
//!
//! - [`SnapshotAdapter`]: synchronous, the whole database is one snapshot
//!   that is rewritten after every mutation ([`BlobSnapshot`]).
//! - [`RecordAdapter`]: asynchronous, one stored object per record, changed
//!   per mutation through a single [`RecordAdapter::apply`] call
//!   ([`MemoryRecordStore`], [`PgRecordStore`]).

pub mod blob;
pub mod memory;
pub mod postgres;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::engine::ChangeSet;
use crate::error::Result;
use crate::schema::Schema;
use crate::types::Record;

pub use blob::{BlobSnapshot, BlobStore, FileBlobStore, MemoryBlobStore};
pub use memory::MemoryRecordStore;
pub use postgres::PgRecordStore;

/// Synchronous whole-database storage
pub trait SnapshotAdapter {
    /// Every table's rows, keyed by table name
    fn load_all(&self) -> Result<HashMap<String, Vec<Record>>>;

    /// Every persisted schema, keyed by table name
    fn load_schemas(&self) -> Result<HashMap<String, Schema>>;

    /// Replace the stored snapshot
    fn save_all(
        &mut self,
        tables: &HashMap<String, Vec<Record>>,
        schemas: &HashMap<String, Schema>,
    ) -> Result<()>;

    fn clear(&mut self) -> Result<()>;
}

/// Asynchronous per-record storage
///
/// Records are addressed by their `id`; rows are returned in the order they
/// were first stored.
#[async_trait]
pub trait RecordAdapter: Send + Sync {
    async fn get_all(&self, table: &str) -> Result<Vec<Record>>;

    async fn get(&self, table: &str, id: &str) -> Result<Option<Record>>;

    /// Upsert `changes.upserted` and delete `changes.removed` as one unit
    async fn apply(&self, table: &str, changes: &ChangeSet) -> Result<()>;

    /// Remove every record of `table`
    async fn clear(&self, table: &str) -> Result<()>;

    /// Remove every record of every table
    async fn clear_all(&self) -> Result<()>;
}
