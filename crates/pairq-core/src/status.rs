use crate::storage::{get_json, set_json, BlobStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationState {
    Pending,
    Generating,
    Complete,
    Error,
}

impl GenerationState {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "generating" => Some(Self::Generating),
            "complete" => Some(Self::Complete),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

/// Advisory progress record for one configuration. Written wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStatus {
    pub status: GenerationState,
    pub message: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks_generated: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tasks_in_queue: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GenerationStatus {
    pub fn new(status: GenerationState, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            tasks_generated: None,
            total_tasks_in_queue: None,
            error: None,
        }
    }

    pub fn complete(tasks_generated: usize, total_tasks_in_queue: usize) -> Self {
        Self {
            tasks_generated: Some(tasks_generated),
            total_tasks_in_queue: Some(total_tasks_in_queue),
            ..Self::new(
                GenerationState::Complete,
                format!("Generated {} new tasks", tasks_generated),
            )
        }
    }

    pub fn failed(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(GenerationState::Error, message)
        }
    }
}

#[derive(Clone)]
pub struct GenerationStatusTracker {
    store: Arc<dyn BlobStore>,
}

impl GenerationStatusTracker {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    pub async fn set_status(
        &self,
        config_id: &str,
        status: &GenerationStatus,
    ) -> anyhow::Result<()> {
        set_json(self.store.as_ref(), config_id, status).await
    }

    pub async fn get_status(&self, config_id: &str) -> anyhow::Result<Option<GenerationStatus>> {
        get_json(self.store.as_ref(), config_id).await
    }

    pub async fn clear_status(&self, config_id: &str) -> anyhow::Result<()> {
        self.store.delete(config_id).await
    }

    /// Status writes never fail the operation that reports them.
    pub(crate) async fn record(&self, config_id: &str, status: GenerationStatus) {
        if let Err(e) = self.set_status(config_id, &status).await {
            tracing::warn!(
                event = "pairq.status.write_failed",
                config_id = %config_id,
                error = %e,
                "could not record generation status"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBlobStore;

    #[tokio::test]
    async fn test_status_overwrites_wholesale() -> anyhow::Result<()> {
        let tracker = GenerationStatusTracker::new(Arc::new(MemoryBlobStore::new("status")));
        assert!(tracker.get_status("cfg").await?.is_none());

        tracker.set_status("cfg", &GenerationStatus::complete(4, 10)).await?;
        tracker
            .set_status("cfg", &GenerationStatus::new(GenerationState::Generating, "again"))
            .await?;

        let got = tracker.get_status("cfg").await?.unwrap();
        assert_eq!(got.status, GenerationState::Generating);
        assert_eq!(got.tasks_generated, None);
        assert_eq!(got.total_tasks_in_queue, None);

        tracker.clear_status("cfg").await?;
        assert!(tracker.get_status("cfg").await?.is_none());
        Ok(())
    }

    #[test]
    fn test_status_wire_format() {
        let v = serde_json::to_value(GenerationStatus::failed("boom", "io")).unwrap();
        assert_eq!(v["status"], "error");
        assert_eq!(v["error"], "io");
        assert!(v.get("tasksGenerated").is_none());

        let v = serde_json::to_value(GenerationStatus::complete(2, 5)).unwrap();
        assert_eq!(v["tasksGenerated"], 2);
        assert_eq!(v["totalTasksInQueue"], 5);
        assert!(GenerationState::Complete.is_terminal());
        assert!(!GenerationState::Pending.is_terminal());
    }
}
