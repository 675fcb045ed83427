use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};

use crate::events::RequestCreated;
use crate::executions::dispatcher::Dispatcher;
use crate::executions::model::NewJobExecution;
use crate::executions::store::ExecutionStore;

/// Turns an inbound "request created" event into a pending execution and
/// an immediate first launch attempt.
///
/// Idempotent by construction: a second delivery of the same request id
/// finds the existing record and is discarded. A failed launch handoff is
/// swallowed too; the pending record is picked up by the sweep, which is
/// preferred over transport redelivery risking a duplicate launch.
pub struct IngestionConsumer {
    store: Arc<dyn ExecutionStore>,
    dispatcher: Dispatcher,
}

impl IngestionConsumer {
    pub fn new(store: Arc<dyn ExecutionStore>, dispatcher: Dispatcher) -> Self {
        Self { store, dispatcher }
    }

    pub async fn handle(&self, event: &RequestCreated) -> anyhow::Result<()> {
        let new = NewJobExecution {
            request_id: event.request_id,
            target_type: event.target_type,
            resource_type: event.resource_type,
            resource_id: event.resource_id.clone(),
            form_data: event.form_data.clone(),
        };

        let Some(job) = self.store.create_if_absent(new).await? else {
            info!(request_id = %event.request_id, "duplicate request-created event ignored");
            return Ok(());
        };

        info!(
            execution_id = %job.id,
            request_id = %event.request_id,
            target = %job.target_type,
            resource_id = %job.resource_id,
            "execution created"
        );

        if let Err(err) = self.dispatcher.attempt_launch(&job).await {
            warn!(
                execution_id = %job.id,
                request_id = %event.request_id,
                error = %format!("{err:#}"),
                "initial dispatch failed, execution left pending for the sweep"
            );
        }

        Ok(())
    }

    /// Drain the bus until shutdown. Per-event failures are logged and
    /// never propagated back to the transport.
    pub async fn run(
        &self,
        mut rx: broadcast::Receiver<RequestCreated>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Ok(event) => {
                        if let Err(err) = self.handle(&event).await {
                            error!(
                                request_id = %event.request_id,
                                error = %format!("{err:#}"),
                                "event ingestion failed"
                            );
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "ingestion consumer lagged behind the bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("event bus closed, consumer stopping");
                        return;
                    }
                },
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("ingestion consumer shutting down");
                        return;
                    }
                }
            }
        }
    }
}
