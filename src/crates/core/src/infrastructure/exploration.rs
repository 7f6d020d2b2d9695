//! Exploration recorder
//!
//! Fire-and-forget history tracking of answered questions. Nothing here may
//! affect the session that produced the record.

use async_trait::async_trait;
use localbook_core_types::ExplorationRecord;
use log::{debug, warn};
use std::sync::Arc;

#[async_trait]
pub trait ExplorationRecorder: Send + Sync {
    async fn record(&self, record: ExplorationRecord) -> anyhow::Result<()>;
}

/// Posts records to the backend's exploration endpoint.
pub struct HttpExplorationRecorder {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpExplorationRecorder {
    pub const PATH: &'static str = "exploration/record";

    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ExplorationRecorder for HttpExplorationRecorder {
    async fn record(&self, record: ExplorationRecord) -> anyhow::Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&record)
            .send()
            .await?;
        response.error_for_status()?;
        Ok(())
    }
}

/// Spawns the recording; failures are logged only.
pub fn spawn_record(recorder: Arc<dyn ExplorationRecorder>, record: ExplorationRecord) {
    let query_preview: String = record.query.chars().take(40).collect();
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        warn!("No async runtime, exploration not recorded: query={:?}", query_preview);
        return;
    };
    runtime.spawn(async move {
        match recorder.record(record).await {
            Ok(()) => debug!("Exploration recorded: query={:?}", query_preview),
            Err(e) => warn!("Failed to record exploration (ignored): {}", e),
        }
    });
}
