use crate::errors::ConfigError;
use crate::storage::{self, SiteCredentials};
use crate::task_id::TaskIdScheme;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SUPPORTED_CONFIG_VERSION: u32 = 1;
pub const DEFAULT_CONCURRENCY: usize = 20;
pub const DEFAULT_PROGRESS_EVERY: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    pub backend: BackendConfig,
    #[serde(default)]
    pub stores: StoreNames,
    #[serde(default)]
    pub queue: QueueSettings,
}

fn default_version() -> u32 {
    SUPPORTED_CONFIG_VERSION
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum BackendConfig {
    Memory,
    Sqlite {
        path: PathBuf,
    },
    Http {
        #[serde(default = "default_blobs_url")]
        base_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        site_id: Option<String>,
        /// Usually supplied through `PAIRQ_BLOBS_TOKEN` rather than the file.
        #[serde(default, skip_serializing)]
        token: Option<String>,
    },
}

fn default_blobs_url() -> String {
    storage::http::DEFAULT_BLOBS_URL.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreNames {
    #[serde(default = "default_current")]
    pub current: String,
    /// Set to null to run without a legacy generation.
    #[serde(default = "default_legacy")]
    pub legacy: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
}

fn default_current() -> String {
    storage::CURRENT_TASK_STORE.to_string()
}

fn default_legacy() -> Option<String> {
    Some(storage::LEGACY_TASK_STORE.to_string())
}

fn default_status() -> String {
    storage::STATUS_STORE.to_string()
}

impl Default for StoreNames {
    fn default() -> Self {
        Self {
            current: default_current(),
            legacy: default_legacy(),
            status: default_status(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_model: Option<String>,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,
    #[serde(default)]
    pub task_id_scheme: TaskIdScheme,
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_progress_every() -> usize {
    DEFAULT_PROGRESS_EVERY
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            anchor_model: None,
            concurrency: DEFAULT_CONCURRENCY,
            progress_every: DEFAULT_PROGRESS_EVERY,
            task_id_scheme: TaskIdScheme::default(),
        }
    }
}

impl QueueConfig {
    pub fn in_memory() -> Self {
        Self {
            version: SUPPORTED_CONFIG_VERSION,
            backend: BackendConfig::Memory,
            stores: StoreNames::default(),
            queue: QueueSettings::default(),
        }
    }

    /// Credentials for the http backend, if both parts are known.
    pub fn site_credentials(&self) -> Option<SiteCredentials> {
        match &self.backend {
            BackendConfig::Http {
                site_id: Some(site_id),
                token: Some(token),
                ..
            } => Some(SiteCredentials {
                site_id: site_id.clone(),
                token: token.clone(),
            }),
            _ => None,
        }
    }

    /// Applies `PAIRQ_*` environment overrides on top of the file values.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|k| std::env::var(k).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let BackendConfig::Http {
            base_url,
            site_id,
            token,
        } = &mut self.backend
        {
            if let Some(v) = var("PAIRQ_BLOBS_URL") {
                *base_url = v;
            }
            if let Some(v) = var("PAIRQ_SITE_ID") {
                *site_id = Some(v);
            }
            if let Some(v) = var("PAIRQ_BLOBS_TOKEN") {
                *token = Some(v);
            }
        }
        if let Some(v) = var("PAIRQ_CONCURRENCY") {
            match v.parse() {
                Ok(n) => self.queue.concurrency = n,
                Err(_) => tracing::warn!(
                    event = "pairq.config.bad_env",
                    var = "PAIRQ_CONCURRENCY",
                    value = %v,
                    "ignoring non-numeric environment override"
                ),
            }
        }
        if let Some(v) = var("PAIRQ_ANCHOR_MODEL") {
            self.queue.anchor_model = Some(v);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != SUPPORTED_CONFIG_VERSION {
            return Err(ConfigError(format!(
                "unsupported config version {} (supported: {})",
                self.version, SUPPORTED_CONFIG_VERSION
            )));
        }
        if self.queue.concurrency == 0 {
            return Err(ConfigError("queue.concurrency must be at least 1".into()));
        }
        if self.stores.legacy.as_deref() == Some(self.stores.current.as_str()) {
            return Err(ConfigError(format!(
                "legacy and current task stores must differ (both '{}')",
                self.stores.current
            )));
        }
        if self.stores.legacy.as_deref() == Some(self.stores.status.as_str()) {
            return Err(ConfigError(format!(
                "legacy and status stores must differ (both '{}')",
                self.stores.status
            )));
        }
        if self.stores.status == self.stores.current {
            return Err(ConfigError(format!(
                "status store must not share the task store '{}'",
                self.stores.current
            )));
        }
        Ok(())
    }
}

pub fn load_config(path: &Path, strict: bool) -> Result<QueueConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError(format!("failed to read config {}: {}", path.display(), e)))?;
    let mut cfg = parse_config(&raw, strict, path)?;

    if let BackendConfig::Sqlite { path: db } = &mut cfg.backend {
        if db.is_relative() {
            let base = path.parent().unwrap_or(Path::new("."));
            *db = base.join(&*db);
        }
    }

    cfg.apply_env();
    cfg.validate()?;
    Ok(cfg)
}

fn parse_config(raw: &str, strict: bool, path: &Path) -> Result<QueueConfig, ConfigError> {
    let mut ignored_keys = std::collections::BTreeSet::new();
    let deserializer = serde_yaml::Deserializer::from_str(raw);
    let cfg: QueueConfig = serde_ignored::deserialize(deserializer, |p| {
        ignored_keys.insert(p.to_string());
    })
    .map_err(|e| ConfigError(format!("failed to parse YAML: {}", e)))?;

    let unknown: Vec<_> = ignored_keys
        .iter()
        .filter(|k| !k.starts_with('_') && !k.starts_with("x-"))
        .collect();
    if !unknown.is_empty() {
        if strict {
            return Err(ConfigError(format!(
                "Unknown fields detected in strict mode: {:?} (file: {})",
                unknown,
                path.display()
            )));
        }
        tracing::warn!(
            event = "pairq.config.unknown_fields",
            fields = ?unknown,
            file = %path.display(),
            "ignored unknown config fields"
        );
    }
    Ok(cfg)
}

pub const SAMPLE_CONFIG: &str = r#"version: 1
backend:
  kind: sqlite
  path: .pairq/blobs.db
  # kind: http
  # base_url: https://api.netlify.com/api/v1/blobs
  # site_id comes from PAIRQ_SITE_ID, token from PAIRQ_BLOBS_TOKEN
stores:
  current: pairwise-tasks-v2
  legacy: pairwise-tasks
  status: pairwise-generation-status
queue:
  anchor_model: openai:gpt-4.1-mini
  concurrency: 20
  progress_every: 100
  task_id_scheme: flat
"#;

pub fn write_sample_config(path: &Path) -> Result<(), ConfigError> {
    std::fs::write(path, SAMPLE_CONFIG)
        .map_err(|e| ConfigError(format!("failed to write sample config: {}", e)))?;
    Ok(())
}
