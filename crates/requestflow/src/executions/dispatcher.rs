use std::sync::Arc;

use chrono::Utc;
use rand::{rngs::StdRng, SeedableRng};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::clients::{ClientError, ClientSet};
use crate::events::{RequestStatusUpdated, StatusPublisher};
use crate::executions::backoff::{next_delay_seconds, BackoffConfig};
use crate::executions::model::{ExecutionStatus, JobExecution};
use crate::executions::store::ExecutionStore;

/// Launches (or re-launches) one execution against its automation
/// backend. Retry scheduling lives here; the polling loop decides *when*
/// a pending execution is due again.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn ExecutionStore>,
    clients: ClientSet,
    publisher: Arc<dyn StatusPublisher>,
    backoff: BackoffConfig,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn ExecutionStore>,
        clients: ClientSet,
        publisher: Arc<dyn StatusPublisher>,
        backoff: BackoffConfig,
    ) -> Self {
        Self {
            store,
            clients,
            publisher,
            backoff,
        }
    }

    pub async fn attempt_launch(&self, job: &JobExecution) -> anyhow::Result<()> {
        let Some(target) = job.target() else {
            // Bad row, nothing a retry can fix.
            let msg = format!("unknown target type: {}", job.target_type);
            if self.store.mark_failed(job.id, &msg, None).await? {
                self.publish(RequestStatusUpdated::from_execution(
                    job,
                    ExecutionStatus::Failed,
                    None,
                    None,
                    Some(msg),
                ))
                .await;
            }
            return Ok(());
        };

        let payload = build_launch_payload(job);
        let client = self.clients.for_target(target);

        match client.launch(&payload).await {
            Ok(execution_id) => {
                let transitioned = self
                    .store
                    .mark_running(job.id, &execution_id, &payload)
                    .await?;

                if transitioned {
                    info!(
                        execution_id = %job.id,
                        request_id = %job.request_id,
                        backend_execution_id = %execution_id,
                        attempt = job.launch_attempts + 1,
                        "launched"
                    );

                    let mut event = RequestStatusUpdated::from_execution(
                        job,
                        ExecutionStatus::Running,
                        None,
                        None,
                        None,
                    );
                    event.execution_id = Some(execution_id);
                    self.publish(event).await;
                }
            }
            Err(ClientError::PermanentlyRejected(reason)) => {
                let msg = format!("launch permanently rejected: {reason}");
                warn!(execution_id = %job.id, request_id = %job.request_id, %reason, "launch rejected");

                if self.store.mark_failed(job.id, &msg, None).await? {
                    self.publish(RequestStatusUpdated::from_execution(
                        job,
                        ExecutionStatus::Failed,
                        None,
                        None,
                        Some(msg),
                    ))
                    .await;
                }
            }
            Err(err) => {
                // Retryable: schedule the next attempt, stay pending.
                // There is deliberately no cap on launch attempts; a job
                // that never launched has consumed nothing on the backend.
                let attempt_no = job.launch_attempts + 1;
                let mut rng = StdRng::from_entropy();
                let delay_secs = next_delay_seconds(attempt_no, &self.backoff, &mut rng);
                let next_attempt_at = Utc::now() + chrono::Duration::seconds(delay_secs);

                warn!(
                    execution_id = %job.id,
                    request_id = %job.request_id,
                    attempt = attempt_no,
                    retry_in_secs = delay_secs,
                    error = %err,
                    "launch failed, rescheduled"
                );

                self.store
                    .record_launch_failure(job.id, next_attempt_at, &err.to_string())
                    .await?;
            }
        }

        Ok(())
    }

    async fn publish(&self, event: RequestStatusUpdated) {
        if let Err(err) = self.publisher.publish_status(&event).await {
            warn!(request_id = %event.request_id, error = %format!("{err:#}"), "status publish failed");
        }
    }
}

/// The exact outbound body sent to the backend, stored verbatim for
/// forensics next to the record.
fn build_launch_payload(job: &JobExecution) -> Value {
    json!({
        "resourceType": &job.resource_type,
        "resourceId": &job.resource_id,
        "parameters": &job.form_data,
    })
}
