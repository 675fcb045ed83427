#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use requestflow::clients::{BackendStatus, ClientError, ClientSet, ExecutionClient};
use requestflow::events::{RequestCreated, RequestStatusUpdated, StatusPublisher};
use requestflow::executions::backoff::BackoffConfig;
use requestflow::executions::model::{
    ExecutionStatus, JobExecution, NewJobExecution, ResourceType, ResultClassification,
    TargetType,
};
use requestflow::executions::store::ExecutionStore;
use requestflow::executions::{Dispatcher, IngestionConsumer, Poller};

// ----------------------------
// In-memory store
// ----------------------------

/// Mirrors the guarded-transition semantics of the Postgres repo so the
/// engine's state machine can be exercised without a database.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<Uuid, JobExecution>>,
}

impl MemoryStore {
    pub fn row(&self, id: Uuid) -> JobExecution {
        self.rows.lock().unwrap().get(&id).cloned().expect("row")
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn only_row(&self) -> JobExecution {
        let rows = self.rows.lock().unwrap();
        assert_eq!(rows.len(), 1, "expected exactly one execution");
        rows.values().next().cloned().unwrap()
    }

    pub fn update_row(&self, id: Uuid, f: impl FnOnce(&mut JobExecution)) {
        let mut rows = self.rows.lock().unwrap();
        f(rows.get_mut(&id).expect("row"));
    }
}

#[async_trait]
impl ExecutionStore for MemoryStore {
    async fn create_if_absent(
        &self,
        new: NewJobExecution,
    ) -> anyhow::Result<Option<JobExecution>> {
        let mut rows = self.rows.lock().unwrap();
        if rows.values().any(|r| r.request_id == new.request_id) {
            return Ok(None);
        }

        let job = JobExecution {
            id: Uuid::new_v4(),
            request_id: new.request_id,
            target_type: new.target_type.as_str().to_string(),
            resource_type: new.resource_type.map(|r| r.as_str().to_string()),
            resource_id: new.resource_id,
            form_data: new.form_data,
            launch_payload: None,
            last_response: None,
            status: ExecutionStatus::Pending.as_str().to_string(),
            raw_status: None,
            result_classification: None,
            backend_execution_id: None,
            launch_attempts: 0,
            next_launch_attempt_at: Utc::now(),
            last_launch_error: None,
            polling_attempts: 0,
            last_polled_at: None,
            error_message: None,
            created_at: Utc::now(),
            dispatched_at: None,
            completed_at: None,
        };
        rows.insert(job.id, job.clone());
        Ok(Some(job))
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<JobExecution>> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn get_by_request(&self, request_id: Uuid) -> anyhow::Result<Option<JobExecution>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .find(|r| r.request_id == request_id)
            .cloned())
    }

    async fn list(
        &self,
        status: Option<&str>,
        limit: i64,
        cursor: Option<(DateTime<Utc>, Uuid)>,
    ) -> anyhow::Result<Vec<JobExecution>> {
        let mut rows: Vec<JobExecution> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .filter(|r| cursor.map_or(true, |(ca, cid)| (r.created_at, r.id) < (ca, cid)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        rows.truncate(limit.clamp(1, 500) as usize);
        Ok(rows)
    }

    async fn fetch_open(&self, limit: i64) -> anyhow::Result<Vec<JobExecution>> {
        let mut rows: Vec<JobExecution> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|r| matches!(r.status.as_str(), "pending" | "running"))
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.created_at);
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn mark_running(
        &self,
        id: Uuid,
        backend_execution_id: &str,
        launch_payload: &Value,
    ) -> anyhow::Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.get_mut(&id).filter(|r| r.status == "pending") else {
            return Ok(false);
        };
        row.status = "running".to_string();
        row.backend_execution_id = Some(backend_execution_id.to_string());
        row.launch_payload = Some(launch_payload.clone());
        row.dispatched_at = Some(Utc::now());
        row.last_launch_error = None;
        row.error_message = None;
        Ok(true)
    }

    async fn record_launch_failure(
        &self,
        id: Uuid,
        next_attempt_at: DateTime<Utc>,
        error: &str,
    ) -> anyhow::Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.get_mut(&id).filter(|r| r.status == "pending") {
            row.launch_attempts += 1;
            row.next_launch_attempt_at = next_attempt_at;
            row.last_launch_error = Some(error.to_string());
        }
        Ok(())
    }

    async fn record_poll(
        &self,
        id: Uuid,
        raw_status: Option<&str>,
        response: Option<&Value>,
    ) -> anyhow::Result<Option<i32>> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.get_mut(&id).filter(|r| r.status == "running") else {
            return Ok(None);
        };
        row.polling_attempts += 1;
        row.last_polled_at = Some(Utc::now());
        if let Some(raw) = raw_status {
            row.raw_status = Some(raw.to_string());
        }
        if let Some(resp) = response {
            row.last_response = Some(resp.clone());
        }
        Ok(Some(row.polling_attempts))
    }

    async fn mark_succeeded(
        &self,
        id: Uuid,
        raw_status: &str,
        classification: Option<ResultClassification>,
        response: Option<&Value>,
    ) -> anyhow::Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.get_mut(&id).filter(|r| r.status == "running") else {
            return Ok(false);
        };
        row.status = "succeeded".to_string();
        row.raw_status = Some(raw_status.to_string());
        row.result_classification = classification.map(|c| c.as_str().to_string());
        if let Some(resp) = response {
            row.last_response = Some(resp.clone());
        }
        row.completed_at = Some(Utc::now());
        row.error_message = None;
        Ok(true)
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
        raw_status: Option<&str>,
    ) -> anyhow::Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows
            .get_mut(&id)
            .filter(|r| matches!(r.status.as_str(), "pending" | "running"))
        else {
            return Ok(false);
        };
        row.status = "failed".to_string();
        row.error_message = Some(error.to_string());
        if let Some(raw) = raw_status {
            row.raw_status = Some(raw.to_string());
        }
        row.completed_at = Some(Utc::now());
        Ok(true)
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

// ----------------------------
// Scripted execution client
// ----------------------------

/// Pops scripted responses in call order; falls back to benign defaults
/// when a queue runs dry (launch succeeds, status stays in flight).
#[derive(Default)]
pub struct ScriptedClient {
    pub launches: Mutex<VecDeque<Result<String, ClientError>>>,
    pub statuses: Mutex<VecDeque<Result<String, ClientError>>>,
    pub classifications: Mutex<VecDeque<Result<Option<ResultClassification>, ClientError>>>,
    pub launch_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub classification_calls: AtomicUsize,
}

impl ScriptedClient {
    pub fn push_launch(&self, r: Result<String, ClientError>) {
        self.launches.lock().unwrap().push_back(r);
    }

    pub fn push_status(&self, r: Result<String, ClientError>) {
        self.statuses.lock().unwrap().push_back(r);
    }

    pub fn push_classification(&self, r: Result<Option<ResultClassification>, ClientError>) {
        self.classifications.lock().unwrap().push_back(r);
    }
}

#[async_trait]
impl ExecutionClient for ScriptedClient {
    async fn launch(&self, _payload: &Value) -> Result<String, ClientError> {
        let n = self.launch_calls.fetch_add(1, Ordering::SeqCst);
        self.launches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("exec-{n}")))
    }

    async fn get_status(&self, _execution_id: &str) -> Result<BackendStatus, ClientError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let raw = self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("running".to_string()))?;
        Ok(BackendStatus {
            body: json!({ "status": raw }),
            raw,
        })
    }

    async fn get_result_classification(
        &self,
        _execution_id: &str,
    ) -> Result<Option<ResultClassification>, ClientError> {
        self.classification_calls.fetch_add(1, Ordering::SeqCst);
        self.classifications
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(None))
    }
}

// ----------------------------
// Capturing publisher
// ----------------------------

#[derive(Default)]
pub struct CapturePublisher {
    pub events: Mutex<Vec<RequestStatusUpdated>>,
}

impl CapturePublisher {
    pub fn statuses(&self) -> Vec<ExecutionStatus> {
        self.events.lock().unwrap().iter().map(|e| e.status).collect()
    }

    pub fn last(&self) -> RequestStatusUpdated {
        self.events.lock().unwrap().last().cloned().expect("event")
    }
}

#[async_trait]
impl StatusPublisher for CapturePublisher {
    async fn publish_status(&self, event: &RequestStatusUpdated) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

// ----------------------------
// Engine harness
// ----------------------------

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub client: Arc<ScriptedClient>,
    pub publisher: Arc<CapturePublisher>,
    pub dispatcher: Dispatcher,
    pub consumer: IngestionConsumer,
    pub poller: Poller,
}

pub fn harness(ceiling: i32) -> Harness {
    let store = Arc::new(MemoryStore::default());
    let client = Arc::new(ScriptedClient::default());
    let publisher = Arc::new(CapturePublisher::default());

    // Same scripted client behind both backend kinds.
    let clients = ClientSet {
        job_template: client.clone(),
        flow: client.clone(),
    };

    let backoff = BackoffConfig {
        base_seconds: 30,
        max_seconds: 15 * 60,
        jitter_pct: 0.0, // deterministic tests
    };

    let dispatcher = Dispatcher::new(
        store.clone() as Arc<dyn ExecutionStore>,
        clients.clone(),
        publisher.clone() as Arc<dyn StatusPublisher>,
        backoff,
    );
    let consumer = IngestionConsumer::new(
        store.clone() as Arc<dyn ExecutionStore>,
        dispatcher.clone(),
    );
    let poller = Poller::new(
        store.clone() as Arc<dyn ExecutionStore>,
        clients,
        dispatcher.clone(),
        publisher.clone() as Arc<dyn StatusPublisher>,
        ceiling,
        Duration::from_millis(10),
        500,
    );

    Harness {
        store,
        client,
        publisher,
        dispatcher,
        consumer,
        poller,
    }
}

pub fn request_created(
    target: TargetType,
    resource_type: Option<ResourceType>,
) -> RequestCreated {
    RequestCreated {
        request_id: Uuid::new_v4(),
        offer_id: "offer-1".to_string(),
        form_definition_id: "form-1".to_string(),
        target_type: target,
        resource_type,
        resource_id: "42".to_string(),
        user_id: "user-1".to_string(),
        form_data: json!({ "hostname": "web-01" }),
        created_at_utc: Utc::now(),
    }
}
