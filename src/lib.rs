//! # runtara-local-store
//!
//! An embedded, schema-aware document store with a small SQL-like query language.
//!
//! Tables hold JSON records. Each table has a schema of typed field rules that
//! is either defined up front or inferred from the first record inserted.
//! Records get an `id` and a `createdAt` timestamp unless the caller supplies
//! them.
//!
//! ## Features
//!
//! - **Schemas and Validation**: Required fields, static or computed defaults, and type checks
//! - **Predicate CRUD**: Insert, update, delete, and select with plain Rust closures
//! - **Aggregates**: `distinct`, `sum`, `average`, `min`, `max`, `group_by`, `latest`
//! - **Query Language**: `SELECT * FROM t WHERE ... ORDER BY ... LIMIT n` with `?` parameters
//! - **Pluggable Storage**: Whole-database snapshots (memory or file) or per-record
//!   stores (memory or PostgreSQL)
//!
//! ## Quick Start
//!
//! ```rust
//! use runtara_local_store::{
//!     BlobSnapshot, DocumentStore, FieldRule, MemoryBlobStore, Schema, StoreConfig,
//! };
//! use serde_json::json;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = StoreConfig::default();
//!     let adapter = BlobSnapshot::from_config(MemoryBlobStore::new(), &config);
//!     let mut store = DocumentStore::open(adapter, &config)?;
//!
//!     store.define_table(
//!         "users",
//!         Schema::new()
//!             .field("name", FieldRule::string())
//!             .field("age", FieldRule::number())
//!             .field("status", FieldRule::string().default("active")),
//!     )?;
//!
//!     let users = json!([
//!         {"name": "Ada", "age": 36},
//!         {"name": "Linus", "age": 17},
//!         {"name": "Grace", "age": 45, "status": "retired"},
//!     ]);
//!     let users: Vec<_> = users
//!         .as_array()
//!         .into_iter()
//!         .flatten()
//!         .filter_map(|user| user.as_object().cloned())
//!         .collect();
//!     store.insert("users", users)?;
//!
//!     let adults = store.query(
//!         "SELECT * FROM users WHERE age >= 18 AND status = 'active' ORDER BY age DESC",
//!     )?;
//!     assert_eq!(adults.len(), 1);
//!     assert_eq!(store.average("users", "age", |_| true), 98.0 / 3.0);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use runtara_local_store::StoreConfig;
//!
//! let config = StoreConfig::builder()
//!     .storage_key("__SecureLocalDB__") // Snapshot key (default)
//!     .documents_table("__documents")   // PostgreSQL documents table (default)
//!     .auto_id(true)                    // Assign `id` when missing
//!     .auto_created_at(true)            // Assign `createdAt` when missing
//!     .build();
//! ```
//!
//! ## Storage
//!
//! [`DocumentStore`] rewrites the whole database through a [`SnapshotAdapter`]
//! after each mutation. [`AsyncDocumentStore`] loads tables lazily from a
//! [`RecordAdapter`] and sends one changeset per mutation. In both, a storage
//! failure is reported after the in-memory mutation has been applied.

pub mod aggregate;
pub mod async_store;
pub mod config;
pub mod engine;
pub mod error;
pub mod persistence;
pub mod providers;
pub mod query;
pub mod schema;
pub mod store;
pub mod types;
pub mod validation;

// Re-export main types for convenience
pub use aggregate::Group;
pub use async_store::AsyncDocumentStore;
pub use config::{AutoFields, StoreConfig, StoreConfigBuilder};
pub use engine::{CREATED_AT_FIELD, ChangeSet, Engine, ID_FIELD};
pub use error::{Result, StoreError};
pub use persistence::{
    BlobSnapshot, BlobStore, FileBlobStore, MemoryBlobStore, MemoryRecordStore, PgRecordStore,
    RecordAdapter, SnapshotAdapter,
};
pub use providers::{Clock, IdGenerator, ManualClock, SequentialIds, SystemClock, UuidGenerator};
pub use query::{CompiledQuery, Query};
pub use schema::{Schema, SchemaRegistry, infer_schema};
pub use store::DocumentStore;
pub use types::{Batch, DefaultValue, FieldRule, FieldType, Record};
pub use validation::apply_defaults_and_validate;
