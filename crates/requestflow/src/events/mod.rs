use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::executions::model::{
    ExecutionStatus, JobExecution, ResourceType, ResultClassification, TargetType,
};

/// Inbound "request created" event, at-least-once delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestCreated {
    pub request_id: Uuid,
    pub offer_id: String,
    pub form_definition_id: String,
    pub target_type: TargetType,
    #[serde(default)]
    pub resource_type: Option<ResourceType>,
    pub resource_id: String,
    pub user_id: String,
    pub form_data: Value,
    pub created_at_utc: DateTime<Utc>,
}

/// Outbound "request status updated" event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestStatusUpdated {
    pub request_id: Uuid,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub result_type: Option<ResultClassification>,
    #[serde(default)]
    pub backend_raw_status: Option<String>,
    #[serde(default)]
    pub execution_id: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    pub updated_at_utc: DateTime<Utc>,
}

impl RequestStatusUpdated {
    /// Snapshot an execution's user-visible state for publication.
    pub fn from_execution(
        job: &JobExecution,
        status: ExecutionStatus,
        result_type: Option<ResultClassification>,
        backend_raw_status: Option<String>,
        error_message: Option<String>,
    ) -> Self {
        Self {
            request_id: job.request_id,
            status,
            result_type,
            backend_raw_status,
            execution_id: job.backend_execution_id.clone(),
            error_message,
            updated_at_utc: Utc::now(),
        }
    }
}

/// Outbound side of the platform bus. Delivery is fire-and-forget from
/// the engine's perspective; the bus's own durability is relied upon.
#[async_trait]
pub trait StatusPublisher: Send + Sync {
    async fn publish_status(&self, event: &RequestStatusUpdated) -> anyhow::Result<()>;
}

/// In-process stand-in for the platform message broker, backed by
/// broadcast channels. Real deployments put a broker adapter behind the
/// same seams.
pub struct EventBus {
    created_tx: broadcast::Sender<RequestCreated>,
    status_tx: broadcast::Sender<RequestStatusUpdated>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (created_tx, _) = broadcast::channel(capacity);
        let (status_tx, _) = broadcast::channel(capacity);
        Self {
            created_tx,
            status_tx,
        }
    }

    pub fn publish_request_created(&self, event: RequestCreated) {
        // No subscriber is not an error; the event is simply dropped,
        // matching fire-and-forget semantics.
        let _ = self.created_tx.send(event);
    }

    pub fn subscribe_created(&self) -> broadcast::Receiver<RequestCreated> {
        self.created_tx.subscribe()
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<RequestStatusUpdated> {
        self.status_tx.subscribe()
    }
}

#[async_trait]
impl StatusPublisher for EventBus {
    async fn publish_status(&self, event: &RequestStatusUpdated) -> anyhow::Result<()> {
        let _ = self.status_tx.send(event.clone());
        Ok(())
    }
}
