use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::executions::model::JobExecution;

/// List-view projection: everything operators scan for, minus the audit
/// payload blobs (those stay on the detail endpoints).
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionListItem {
    pub id: Uuid,
    pub request_id: Uuid,

    pub target_type: String,
    pub resource_type: Option<String>,
    pub resource_id: String,

    pub status: String,
    pub raw_status: Option<String>,
    pub result_classification: Option<String>,
    pub backend_execution_id: Option<String>,

    pub launch_attempts: i32,
    pub next_launch_attempt_at: DateTime<Utc>,
    pub last_launch_error: Option<String>,

    pub polling_attempts: i32,
    pub last_polled_at: Option<DateTime<Utc>>,

    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<JobExecution> for ExecutionListItem {
    fn from(job: JobExecution) -> Self {
        Self {
            id: job.id,
            request_id: job.request_id,
            target_type: job.target_type,
            resource_type: job.resource_type,
            resource_id: job.resource_id,
            status: job.status,
            raw_status: job.raw_status,
            result_classification: job.result_classification,
            backend_execution_id: job.backend_execution_id,
            launch_attempts: job.launch_attempts,
            next_launch_attempt_at: job.next_launch_attempt_at,
            last_launch_error: job.last_launch_error,
            polling_attempts: job.polling_attempts,
            last_polled_at: job.last_polled_at,
            error_message: job.error_message,
            created_at: job.created_at,
            dispatched_at: job.dispatched_at,
            completed_at: job.completed_at,
        }
    }
}
