use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub mod http;
pub mod memory;
pub mod schema;
pub mod sqlite;

pub use http::HttpBlobStore;
pub use memory::MemoryBlobStore;
pub use sqlite::SqliteBlobStore;

pub const CURRENT_TASK_STORE: &str = "pairwise-tasks-v2";
pub const LEGACY_TASK_STORE: &str = "pairwise-tasks";
pub const STATUS_STORE: &str = "pairwise-generation-status";

/// A named key-value store of JSON values.
///
/// Every call is a round trip to the backing store; errors are returned as-is
/// and never retried.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>>;
    async fn set(&self, key: &str, value: &serde_json::Value) -> anyhow::Result<()>;
    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> anyhow::Result<()>;
    async fn list(&self) -> anyhow::Result<Vec<String>>;
    fn store_name(&self) -> &str;
}

/// Site/tenant credentials used to route a store to a specific account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteCredentials {
    pub site_id: String,
    pub token: String,
}

/// Logical store name plus an optional credential override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreScope {
    pub name: String,
    pub site: Option<SiteCredentials>,
}

impl StoreScope {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            site: None,
        }
    }

    pub fn with_site(mut self, site: Option<SiteCredentials>) -> Self {
        self.site = site;
        self
    }

    /// Key used to serialize writers on this scope within one process.
    pub fn lock_key(&self) -> String {
        match &self.site {
            Some(s) => format!("{}@{}", self.name, s.site_id),
            None => self.name.clone(),
        }
    }
}

pub async fn get_json<T: DeserializeOwned>(
    store: &dyn BlobStore,
    key: &str,
) -> anyhow::Result<Option<T>> {
    match store.get(key).await? {
        Some(v) => {
            let parsed = serde_json::from_value(v).with_context(|| {
                format!("malformed record {}/{}", store.store_name(), key)
            })?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

pub async fn set_json<T: Serialize>(
    store: &dyn BlobStore,
    key: &str,
    value: &T,
) -> anyhow::Result<()> {
    let v = serde_json::to_value(value)?;
    store.set(key, &v).await
}
