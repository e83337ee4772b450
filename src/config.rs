//! Configuration for the document store
//!
//! Provides a builder pattern for configuring the store.

/// Storage key used when none is configured
pub const DEFAULT_STORAGE_KEY: &str = "__SecureLocalDB__";

/// Table used by the PostgreSQL record store when none is configured
pub const DEFAULT_DOCUMENTS_TABLE: &str = "__documents";

/// Configuration for engine-assigned fields
#[derive(Debug, Clone)]
pub struct AutoFields {
    /// Whether to assign an `id` to records that lack one
    pub id: bool,
    /// Whether to assign a `createdAt` timestamp to records that lack one
    pub created_at: bool,
}

impl Default for AutoFields {
    fn default() -> Self {
        Self {
            id: true,
            created_at: true,
        }
    }
}

/// Configuration for the document store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Key under which the whole database blob is stored
    pub storage_key: String,
    /// Table holding one row per record for the PostgreSQL record store
    pub documents_table: String,
    /// Engine-assigned fields configuration
    pub auto_fields: AutoFields,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfigBuilder::new().build()
    }
}

impl StoreConfig {
    /// Create a new configuration builder
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::new()
    }
}

/// Builder for StoreConfig
#[derive(Debug)]
pub struct StoreConfigBuilder {
    storage_key: String,
    documents_table: String,
    auto_fields: AutoFields,
}

impl Default for StoreConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreConfigBuilder {
    pub fn new() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            documents_table: DEFAULT_DOCUMENTS_TABLE.to_string(),
            auto_fields: AutoFields::default(),
        }
    }

    /// Set the blob storage key (default: "__SecureLocalDB__")
    pub fn storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Set the PostgreSQL documents table (default: "__documents")
    pub fn documents_table(mut self, name: impl Into<String>) -> Self {
        self.documents_table = name.into();
        self
    }

    /// Enable or disable `id` assignment (default: true)
    pub fn auto_id(mut self, enabled: bool) -> Self {
        self.auto_fields.id = enabled;
        self
    }

    /// Enable or disable `createdAt` assignment (default: true)
    pub fn auto_created_at(mut self, enabled: bool) -> Self {
        self.auto_fields.created_at = enabled;
        self
    }

    /// Disable all engine-assigned fields
    pub fn without_auto_fields(mut self) -> Self {
        self.auto_fields = AutoFields {
            id: false,
            created_at: false,
        };
        self
    }

    /// Build the configuration
    pub fn build(self) -> StoreConfig {
        StoreConfig {
            storage_key: self.storage_key,
            documents_table: self.documents_table,
            auto_fields: self.auto_fields,
        }
    }
}
