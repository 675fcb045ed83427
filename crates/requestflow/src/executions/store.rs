use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::executions::model::{JobExecution, NewJobExecution, ResultClassification};

/// Durable record of every dispatch attempt and its lifecycle.
///
/// Every mutation is a single guarded read-modify-write keyed by the
/// execution id and the expected current status, so two workers touching
/// the same row cannot regress a terminal state or double-apply a
/// transition. Methods that transition status return whether the guarded
/// update actually took effect.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Insert a new pending execution unless one already exists for the
    /// originating request id. Returns None on duplicate (at-least-once
    /// event delivery is absorbed here).
    async fn create_if_absent(
        &self,
        new: NewJobExecution,
    ) -> anyhow::Result<Option<JobExecution>>;

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<JobExecution>>;

    async fn get_by_request(&self, request_id: Uuid) -> anyhow::Result<Option<JobExecution>>;

    /// Cursor-paginated list, newest first. Cursor is (created_at, id).
    async fn list(
        &self,
        status: Option<&str>,
        limit: i64,
        cursor: Option<(DateTime<Utc>, Uuid)>,
    ) -> anyhow::Result<Vec<JobExecution>>;

    /// All executions still in {pending, running}, oldest first.
    async fn fetch_open(&self, limit: i64) -> anyhow::Result<Vec<JobExecution>>;

    /// pending -> running after a successful launch. Records the backend
    /// execution id and the exact outbound payload, stamps dispatched_at,
    /// clears launch/error bookkeeping.
    async fn mark_running(
        &self,
        id: Uuid,
        backend_execution_id: &str,
        launch_payload: &Value,
    ) -> anyhow::Result<bool>;

    /// Failed launch attempt: bumps launch_attempts, schedules the next
    /// attempt, records the error. Status stays pending.
    async fn record_launch_failure(
        &self,
        id: Uuid,
        next_attempt_at: DateTime<Utc>,
        error: &str,
    ) -> anyhow::Result<()>;

    /// One poll tick against a running execution: bumps polling_attempts,
    /// stamps last_polled_at, keeps the latest raw status/response when
    /// the backend produced one. Returns the new polling_attempts, or
    /// None if the execution is no longer running.
    async fn record_poll(
        &self,
        id: Uuid,
        raw_status: Option<&str>,
        response: Option<&Value>,
    ) -> anyhow::Result<Option<i32>>;

    /// running -> succeeded.
    async fn mark_succeeded(
        &self,
        id: Uuid,
        raw_status: &str,
        classification: Option<ResultClassification>,
        response: Option<&Value>,
    ) -> anyhow::Result<bool>;

    /// {pending, running} -> failed.
    async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
        raw_status: Option<&str>,
    ) -> anyhow::Result<bool>;

    /// Store connectivity probe for the health endpoint.
    async fn ping(&self) -> anyhow::Result<()>;
}
