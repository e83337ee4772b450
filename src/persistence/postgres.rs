//! PostgreSQL record store
//!
//! Every record is one JSONB row of a shared documents table, keyed by
//! `(table_name, id)`. A `BIGSERIAL` column keeps rows in the order they were
//! first written; upserts leave it untouched.

use async_trait::async_trait;
use regex::Regex;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::engine::ChangeSet;
use crate::error::{Result, StoreError};
use crate::persistence::RecordAdapter;
use crate::types::Record;

/// Quote a SQL identifier, doubling embedded quotes
pub fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Check that `name` can be used as the documents table
///
/// Letters, digits and underscores, not starting with a digit, at most 63
/// bytes (the PostgreSQL identifier limit).
pub fn validate_table_name(name: &str) -> Result<()> {
    let re = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$")
        .map_err(|e| StoreError::persistence(e.to_string()))?;
    if re.is_match(name) {
        Ok(())
    } else {
        Err(StoreError::persistence(format!(
            "Invalid documents table name '{}'",
            name
        )))
    }
}

/// [`RecordAdapter`] backed by a PostgreSQL database
pub struct PgRecordStore {
    pool: PgPool,
    documents_table: String,
}

impl PgRecordStore {
    /// Connect to `database_url` and ensure the documents table exists
    pub async fn connect(database_url: &str, config: &StoreConfig) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| StoreError::persistence(format!("Database connection failed: {}", e)))?;
        Self::from_pool(pool, config).await
    }

    /// Use an existing pool and ensure the documents table exists
    pub async fn from_pool(pool: PgPool, config: &StoreConfig) -> Result<Self> {
        validate_table_name(&config.documents_table)?;
        let store = Self {
            pool,
            documents_table: config.documents_table.clone(),
        };
        store.ensure_documents_table().await?;
        info!(table = %store.documents_table, "PostgreSQL record store ready");
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn documents_table(&self) -> &str {
        &self.documents_table
    }

    async fn ensure_documents_table(&self) -> Result<()> {
        let create_sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                seq BIGSERIAL,
                table_name VARCHAR(255) NOT NULL,
                id VARCHAR(255) NOT NULL,
                doc JSONB NOT NULL,
                PRIMARY KEY (table_name, id)
            )
            "#,
            quote_identifier(&self.documents_table)
        );

        sqlx::query(&create_sql).execute(&self.pool).await?;

        Ok(())
    }

    fn row_to_record(row: &sqlx::postgres::PgRow) -> Result<Record> {
        let Json(record): Json<Record> = row.try_get("doc")?;
        Ok(record)
    }
}

#[async_trait]
impl RecordAdapter for PgRecordStore {
    async fn get_all(&self, table: &str) -> Result<Vec<Record>> {
        let select_sql = format!(
            "SELECT doc FROM {} WHERE table_name = $1 ORDER BY seq",
            quote_identifier(&self.documents_table)
        );

        let rows = sqlx::query(&select_sql)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn get(&self, table: &str, id: &str) -> Result<Option<Record>> {
        let select_sql = format!(
            "SELECT doc FROM {} WHERE table_name = $1 AND id = $2",
            quote_identifier(&self.documents_table)
        );

        let row = sqlx::query(&select_sql)
            .bind(table)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn apply(&self, table: &str, changes: &ChangeSet) -> Result<()> {
        let documents = quote_identifier(&self.documents_table);
        let upsert_sql = format!(
            "INSERT INTO {} (table_name, id, doc) VALUES ($1, $2, $3) \
             ON CONFLICT (table_name, id) DO UPDATE SET doc = EXCLUDED.doc",
            documents
        );
        let delete_sql = format!(
            "DELETE FROM {} WHERE table_name = $1 AND id = ANY($2)",
            documents
        );

        let upserted = changes.upserted_ids()?;
        let removed = changes.removed_ids()?;

        let mut tx = self.pool.begin().await?;

        for (id, record) in upserted.into_iter().zip(&changes.upserted) {
            sqlx::query(&upsert_sql)
                .bind(table)
                .bind(id)
                .bind(Json(record))
                .execute(&mut *tx)
                .await?;
        }

        if !removed.is_empty() {
            sqlx::query(&delete_sql)
                .bind(table)
                .bind(removed.as_slice())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        debug!(
            table,
            upserted = changes.upserted.len(),
            removed = removed.len(),
            "applied changes"
        );
        Ok(())
    }

    async fn clear(&self, table: &str) -> Result<()> {
        let delete_sql = format!(
            "DELETE FROM {} WHERE table_name = $1",
            quote_identifier(&self.documents_table)
        );

        sqlx::query(&delete_sql)
            .bind(table)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        let delete_sql = format!(
            "DELETE FROM {}",
            quote_identifier(&self.documents_table)
        );

        let result = sqlx::query(&delete_sql).execute(&self.pool).await?;
        debug!(rows = result.rows_affected(), "cleared documents table");

        Ok(())
    }
}
