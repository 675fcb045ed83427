use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::clients::ClientSet;
use crate::events::{RequestStatusUpdated, StatusPublisher};
use crate::executions::dispatcher::Dispatcher;
use crate::executions::model::{ExecutionStatus, JobExecution, TargetType};
use crate::executions::status_map::{classify_raw_status, RawStatusClass};
use crate::executions::store::ExecutionStore;

/// Recurring reconciliation sweep over all non-terminal executions.
///
/// One task, sequential ticks: a sweep that overruns its interval delays
/// the next tick instead of overlapping it, so two sweeps can never drive
/// the same execution concurrently.
pub struct Poller {
    store: Arc<dyn ExecutionStore>,
    clients: ClientSet,
    dispatcher: Dispatcher,
    publisher: Arc<dyn StatusPublisher>,
    ceiling: i32,
    interval: Duration,
    sweep_batch: i64,
}

impl Poller {
    pub fn new(
        store: Arc<dyn ExecutionStore>,
        clients: ClientSet,
        dispatcher: Dispatcher,
        publisher: Arc<dyn StatusPublisher>,
        ceiling: i32,
        interval: Duration,
        sweep_batch: i64,
    ) -> Self {
        Self {
            store,
            clients,
            dispatcher,
            publisher,
            ceiling,
            interval,
            sweep_batch,
        }
    }

    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.sweep().await {
                        // Store connectivity loss lands here; keep running,
                        // the health endpoint surfaces it.
                        error!(error = %format!("{err:#}"), "sweep failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("poller shutting down");
                        return;
                    }
                }
            }
        }
    }

    /// One pass over the open executions. A failure while processing one
    /// job never aborts the others.
    pub async fn sweep(&self) -> anyhow::Result<()> {
        let open = self.store.fetch_open(self.sweep_batch).await?;

        for job in open {
            if let Err(err) = self.process(&job).await {
                warn!(
                    execution_id = %job.id,
                    request_id = %job.request_id,
                    error = %format!("{err:#}"),
                    "sweep step failed, execution left for next sweep"
                );
            }
        }

        Ok(())
    }

    async fn process(&self, job: &JobExecution) -> anyhow::Result<()> {
        match job.status.as_str() {
            "pending" => {
                if Utc::now() >= job.next_launch_attempt_at {
                    self.dispatcher.attempt_launch(job).await?;
                }
                Ok(())
            }
            "running" => self.poll_running(job).await,
            _ => Ok(()),
        }
    }

    async fn poll_running(&self, job: &JobExecution) -> anyhow::Result<()> {
        let Some(target) = job.target() else {
            anyhow::bail!("unknown target type: {}", job.target_type);
        };
        let Some(execution_id) = job.backend_execution_id.as_deref() else {
            anyhow::bail!("running execution has no backend execution id");
        };

        let client = self.clients.for_target(target);

        let status = match client.get_status(execution_id).await {
            Ok(status) => status,
            Err(err) => {
                // Transient: no transition, but the tick still counts so a
                // permanently unreachable backend times out eventually.
                warn!(
                    execution_id = %job.id,
                    backend_execution_id = %execution_id,
                    error = %err,
                    "status poll failed"
                );
                return self.note_poll(job, None, None).await;
            }
        };

        match classify_raw_status(target, &status.raw) {
            RawStatusClass::InFlight => {
                self.note_poll(job, Some(&status.raw), Some(&status.body))
                    .await
            }
            RawStatusClass::Succeeded => {
                let classification = if target == TargetType::FlowRunner {
                    match client.get_result_classification(execution_id).await {
                        Ok(c) => c,
                        Err(err) => {
                            // Stay running; the next sweep re-polls and
                            // retries the classification fetch.
                            self.note_poll(job, Some(&status.raw), Some(&status.body))
                                .await?;
                            anyhow::bail!("result classification fetch failed: {err}");
                        }
                    }
                } else {
                    None
                };

                if self
                    .store
                    .mark_succeeded(job.id, &status.raw, classification, Some(&status.body))
                    .await?
                {
                    info!(
                        execution_id = %job.id,
                        request_id = %job.request_id,
                        raw_status = %status.raw,
                        "execution succeeded"
                    );
                    self.publish(RequestStatusUpdated::from_execution(
                        job,
                        ExecutionStatus::Succeeded,
                        classification,
                        Some(status.raw),
                        None,
                    ))
                    .await;
                }
                Ok(())
            }
            RawStatusClass::Failed => {
                let msg = format!("backend reported terminal status: {}", status.raw);
                if self.store.mark_failed(job.id, &msg, Some(&status.raw)).await? {
                    info!(
                        execution_id = %job.id,
                        request_id = %job.request_id,
                        raw_status = %status.raw,
                        "execution failed"
                    );
                    self.publish(RequestStatusUpdated::from_execution(
                        job,
                        ExecutionStatus::Failed,
                        None,
                        Some(status.raw),
                        Some(msg),
                    ))
                    .await;
                }
                Ok(())
            }
        }
    }

    async fn note_poll(
        &self,
        job: &JobExecution,
        raw: Option<&str>,
        body: Option<&Value>,
    ) -> anyhow::Result<()> {
        let Some(attempts) = self.store.record_poll(job.id, raw, body).await? else {
            // Raced with a terminal transition; nothing to do.
            return Ok(());
        };

        if attempts >= self.ceiling {
            let msg = format!("polling ceiling exceeded after {attempts} polls");
            if self.store.mark_failed(job.id, &msg, raw).await? {
                warn!(
                    execution_id = %job.id,
                    request_id = %job.request_id,
                    polls = attempts,
                    "execution timed out"
                );
                self.publish(RequestStatusUpdated::from_execution(
                    job,
                    ExecutionStatus::Failed,
                    None,
                    raw.map(str::to_string),
                    Some(msg),
                ))
                .await;
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
