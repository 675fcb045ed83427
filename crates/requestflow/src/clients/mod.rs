use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::executions::model::{ResultClassification, TargetType};

pub mod flow;
pub mod job_template;

pub use flow::FlowRunnerClient;
pub use job_template::JobTemplateRunnerClient;

/// Failure talking to an automation backend. Transport and Backend are
/// retryable; PermanentlyRejected stops launch retry and fails the
/// execution outright.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("backend error (http {status}): {message}")]
    Backend { status: u16, message: String },

    #[error("permanently rejected: {0}")]
    PermanentlyRejected(String),
}

impl ClientError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ClientError::PermanentlyRejected(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}

/// Turn a non-success HTTP response into the taxonomy. Client errors that
/// cannot be fixed by retrying (bad resource id, malformed payload) are
/// permanent; everything else stays retryable.
pub(crate) fn http_error(status: u16, body: String) -> ClientError {
    match status {
        400 | 404 | 405 | 422 => ClientError::PermanentlyRejected(format!("http {status}: {body}")),
        _ => ClientError::Backend {
            status,
            message: body,
        },
    }
}

pub(crate) async fn read_error(resp: reqwest::Response) -> ClientError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    http_error(status, body)
}

/// One status poll: the backend's raw status string plus the response
/// body it was read from, kept verbatim for the audit trail.
#[derive(Debug, Clone)]
pub struct BackendStatus {
    pub raw: String,
    pub body: Value,
}

/// Uniform contract over heterogeneous automation backends. No retry is
/// built in; the dispatch engine and the polling loop own that entirely.
#[async_trait]
pub trait ExecutionClient: Send + Sync {
    /// Submit a job. The payload is the exact outbound body the caller
    /// stores for audit; the client extracts routing fields from it.
    async fn launch(&self, payload: &Value) -> Result<String, ClientError>;

    /// Raw status in the backend's own vocabulary, with the response body
    /// it came from.
    async fn get_status(&self, execution_id: &str) -> Result<BackendStatus, ClientError>;

    /// Secondary outcome tag, meaningful only once the backend signaled
    /// completion. Backends without the concept return None.
    async fn get_result_classification(
        &self,
        execution_id: &str,
    ) -> Result<Option<ResultClassification>, ClientError>;
}

/// One client per backend kind, shared across the engine components.
#[derive(Clone)]
pub struct ClientSet {
    pub job_template: Arc<dyn ExecutionClient>,
    pub flow: Arc<dyn ExecutionClient>,
}

impl ClientSet {
    pub fn for_target(&self, target: TargetType) -> Arc<dyn ExecutionClient> {
        match target {
            TargetType::JobTemplateRunner => self.job_template.clone(),
            TargetType::FlowRunner => self.flow.clone(),
        }
    }
}
