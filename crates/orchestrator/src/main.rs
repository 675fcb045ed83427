use std::sync::Arc;
use std::time::Duration;

use requestflow::api;
use requestflow::clients::{ClientSet, FlowRunnerClient, JobTemplateRunnerClient};
use requestflow::config::Config;
use requestflow::db;
use requestflow::events::{EventBus, StatusPublisher};
use requestflow::executions::{
    Dispatcher, ExecutionStore, ExecutionsRepo, IngestionConsumer, Poller,
};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = Config::from_env()?;
    info!(
        poll_interval_ms = cfg.poll_interval_ms,
        polling_ceiling = cfg.polling_ceiling,
        sweep_batch_size = cfg.sweep_batch_size,
        api = %cfg.api_addr.clone().unwrap_or_else(|| "disabled".to_string()),
        migrate_on_startup = cfg.migrate_on_startup,
        "orchestrator starting"
    );

    let pool = db::make_pool(&cfg.database_url).await?;
    if cfg.migrate_on_startup {
        db::run_migrations(&pool).await?;
    }

    let store: Arc<dyn ExecutionStore> = Arc::new(ExecutionsRepo::new(pool.clone()));

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.http_timeout_secs))
        .build()?;
    let clients = ClientSet {
        job_template: Arc::new(JobTemplateRunnerClient::new(
            http.clone(),
            cfg.job_template_runner_url.clone(),
            cfg.job_template_runner_token.clone(),
        )),
        flow: Arc::new(FlowRunnerClient::new(
            http,
            cfg.flow_runner_url.clone(),
            cfg.flow_runner_token.clone(),
        )),
    };

    let bus = Arc::new(EventBus::new(1024));
    let publisher: Arc<dyn StatusPublisher> = bus.clone();

    let dispatcher = Dispatcher::new(
        store.clone(),
        clients.clone(),
        publisher.clone(),
        cfg.launch_backoff.clone(),
    );
    let consumer = IngestionConsumer::new(store.clone(), dispatcher.clone());
    let poller = Poller::new(
        store.clone(),
        clients,
        dispatcher,
        publisher,
        cfg.polling_ceiling,
        Duration::from_millis(cfg.poll_interval_ms),
        cfg.sweep_batch_size,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ---- Ingestion consumer task ----
    let consumer_handle = {
        let rx = bus.subscribe_created();
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { consumer.run(rx, shutdown).await })
    };

    // ---- Polling reconciliation task ----
    let poller_handle = {
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { poller.run(shutdown).await })
    };

    // ---- Outbound status log (broker bridge hangs off the same subscription) ----
    let status_log_handle = {
        let mut rx = bus.subscribe_status();
        tokio::spawn(async move {
            while let Ok(event) = rx.recv().await {
                info!(
                    request_id = %event.request_id,
                    status = ?event.status,
                    execution_id = event.execution_id.as_deref().unwrap_or("-"),
                    "request status updated"
                );
            }
        })
    };

    // ---- Query API task ----
    let api_handle = {
        let addr = cfg.api_addr.clone();
        let state = api::ApiState {
            store: store.clone(),
            bus: bus.clone(),
        };
        tokio::spawn(async move {
            if let Some(addr) = addr {
                let listener = tokio::net::TcpListener::bind(&addr).await?;
                info!(%addr, "query api listening");
                axum::serve(listener, api::router(state)).await?;
            } else {
                std::future::pending::<()>().await;
            }
            Ok::<(), anyhow::Error>(())
        })
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
        res = api_handle => res??,
    }

    // Stop scheduling new work; let in-flight sweep steps finish (each
    // backend call is bounded by the HTTP timeout).
    let _ = shutdown_tx.send(true);
    let _ = consumer_handle.await;
    let _ = poller_handle.await;
    status_log_handle.abort();

    Ok(())
}
