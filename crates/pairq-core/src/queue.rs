use crate::config::{BackendConfig, QueueConfig, QueueSettings};
use crate::engine::pool::PoolOptions;
use crate::index::IndexManager;
use crate::status::GenerationStatusTracker;
use crate::storage::http::HttpBlobStore;
use crate::storage::memory::MemoryRegistry;
use crate::storage::sqlite::SqliteDb;
use crate::storage::{BlobStore, SiteCredentials, StoreScope};
use std::sync::Arc;

/// Opens stores for a configured backend.
#[derive(Clone)]
pub enum Backend {
    Memory(MemoryRegistry),
    Sqlite(SqliteDb),
    Http {
        base_url: String,
        site: Option<SiteCredentials>,
    },
}

impl Backend {
    pub fn from_config(cfg: &QueueConfig) -> anyhow::Result<Self> {
        Ok(match &cfg.backend {
            BackendConfig::Memory => Backend::Memory(MemoryRegistry::default()),
            BackendConfig::Sqlite { path } => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                Backend::Sqlite(SqliteDb::open(path)?)
            }
            BackendConfig::Http { base_url, .. } => Backend::Http {
                base_url: base_url.clone(),
                site: cfg.site_credentials(),
            },
        })
    }

    /// Opens `scope`. A site override on the scope wins over the backend default.
    pub fn open(&self, scope: &StoreScope) -> anyhow::Result<Arc<dyn BlobStore>> {
        Ok(match self {
            Backend::Memory(reg) => Arc::new(reg.open(&scope.name)?),
            Backend::Sqlite(db) => Arc::new(db.store(&scope.name)),
            Backend::Http { base_url, site } => {
                let site = scope.site.clone().or_else(|| site.clone()).ok_or_else(|| {
                    anyhow::anyhow!(
                        "http backend needs site credentials (set PAIRQ_SITE_ID and PAIRQ_BLOBS_TOKEN)"
                    )
                })?;
                Arc::new(HttpBlobStore::new(base_url, site, &scope.name)?)
            }
        })
    }
}

/// The task queue over one current store, an optional legacy store, and the
/// status store.
#[derive(Clone)]
pub struct TaskQueue {
    pub tasks: Arc<dyn BlobStore>,
    pub legacy: Option<Arc<dyn BlobStore>>,
    pub status: GenerationStatusTracker,
    pub index: IndexManager,
    pub settings: QueueSettings,
}

impl TaskQueue {
    pub fn new(
        tasks: Arc<dyn BlobStore>,
        legacy: Option<Arc<dyn BlobStore>>,
        status: Arc<dyn BlobStore>,
        settings: QueueSettings,
    ) -> Self {
        let lock_key = tasks.store_name().to_string();
        Self::with_lock_key(tasks, legacy, status, settings, lock_key)
    }

    fn with_lock_key(
        tasks: Arc<dyn BlobStore>,
        legacy: Option<Arc<dyn BlobStore>>,
        status: Arc<dyn BlobStore>,
        settings: QueueSettings,
        lock_key: String,
    ) -> Self {
        Self {
            index: IndexManager::new(tasks.clone(), lock_key),
            tasks,
            legacy,
            status: GenerationStatusTracker::new(status),
            settings,
        }
    }

    pub fn open(cfg: &QueueConfig) -> anyhow::Result<Self> {
        let backend = Backend::from_config(cfg)?;
        Self::open_with(&backend, cfg, None)
    }

    /// Opens the queue, routing every store through `site` when given.
    pub fn open_with(
        backend: &Backend,
        cfg: &QueueConfig,
        site: Option<SiteCredentials>,
    ) -> anyhow::Result<Self> {
        let scope = |name: &str| StoreScope::named(name).with_site(site.clone());

        let current = scope(&cfg.stores.current);
        let tasks = backend.open(&current)?;
        let legacy = match &cfg.stores.legacy {
            Some(name) => Some(backend.open(&scope(name))?),
            None => None,
        };
        let status = backend.open(&scope(&cfg.stores.status))?;

        tracing::debug!(
            event = "pairq.queue.open",
            current = %cfg.stores.current,
            legacy = ?cfg.stores.legacy,
            status = %cfg.stores.status
        );
        Ok(Self::with_lock_key(
            tasks,
            legacy,
            status,
            cfg.queue.clone(),
            current.lock_key(),
        ))
    }

    pub(crate) fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            width: self.settings.concurrency.max(1),
            progress_every: self.settings.progress_every.max(1),
        }
    }
}
