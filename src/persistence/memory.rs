//! In-memory record store

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::engine::{ChangeSet, record_id};
use crate::error::Result;
use crate::persistence::RecordAdapter;
use crate::types::Record;

/// [`RecordAdapter`] keeping records in process memory
///
/// Useful for tests and for stores that do not need to outlive the process.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    tables: Mutex<HashMap<String, Vec<Record>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed `table` with `rows`, replacing anything stored there
    pub async fn seed(&self, table: &str, rows: Vec<Record>) {
        self.tables.lock().await.insert(table.to_string(), rows);
    }
}

#[async_trait]
impl RecordAdapter for MemoryRecordStore {
    async fn get_all(&self, table: &str) -> Result<Vec<Record>> {
        Ok(self
            .tables
            .lock()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default())
    }

    async fn get(&self, table: &str, id: &str) -> Result<Option<Record>> {
        Ok(self.tables.lock().await.get(table).and_then(|rows| {
            rows.iter()
                .find(|row| record_id(row) == Some(id))
                .cloned()
        }))
    }

    async fn apply(&self, table: &str, changes: &ChangeSet) -> Result<()> {
        let upserted = changes.upserted_ids()?;
        let removed = changes.removed_ids()?;

        let mut tables = self.tables.lock().await;
        let rows = tables.entry(table.to_string()).or_default();

        for (id, record) in upserted.into_iter().zip(&changes.upserted) {
            match rows.iter().position(|row| record_id(row) == Some(id)) {
                Some(index) => rows[index] = record.clone(),
                None => rows.push(record.clone()),
            }
        }

        if !removed.is_empty() {
            rows.retain(|row| record_id(row).is_none_or(|id| !removed.contains(&id)));
        }
        Ok(())
    }

    async fn clear(&self, table: &str) -> Result<()> {
        self.tables.lock().await.remove(table);
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        self.tables.lock().await.clear();
        Ok(())
    }
}
