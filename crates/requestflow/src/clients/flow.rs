use async_trait::async_trait;
use serde_json::{json, Value};

use crate::clients::{read_error, BackendStatus, ClientError, ExecutionClient};
use crate::executions::model::ResultClassification;

/// Client for the flow-based automation backend (execution-summary REST
/// API, string execution ids, result classification on completion).
pub struct FlowRunnerClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl FlowRunnerClient {
    pub fn new(http: reqwest::Client, base_url: String, token: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn fetch_summary(&self, execution_id: &str) -> Result<Value, ClientError> {
        let url = format!("{}/executions/{}/summary", self.base_url, execution_id);
        let resp = self.request(self.http.get(&url)).send().await?;

        if !resp.status().is_success() {
            return Err(read_error(resp).await);
        }

        Ok(resp.json().await?)
    }
}

#[async_trait]
impl ExecutionClient for FlowRunnerClient {
    async fn launch(&self, payload: &Value) -> Result<String, ClientError> {
        let flow_id = payload
            .get("resourceId")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ClientError::PermanentlyRejected("launch payload missing resourceId".into())
            })?;

        let inputs = payload.get("parameters").cloned().unwrap_or(json!({}));
        let url = format!("{}/executions", self.base_url);

        let resp = self
            .request(self.http.post(&url))
            .json(&json!({ "flowUuid": flow_id, "inputs": inputs }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(read_error(resp).await);
        }

        let body: Value = resp.json().await?;
        match body {
            // Some deployments return the execution id as a bare string.
            Value::String(s) => Ok(s),
            other => other
                .get("executionId")
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    v => v.to_string(),
                })
                .ok_or_else(|| ClientError::Backend {
                    status: 200,
                    message: "launch response missing executionId".into(),
                }),
        }
    }

    async fn get_status(&self, execution_id: &str) -> Result<BackendStatus, ClientError> {
        let summary = self.fetch_summary(execution_id).await?;
        let raw = summary
            .get("status")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ClientError::Backend {
                status: 200,
                message: "summary missing status field".into(),
            })?;

        Ok(BackendStatus { raw, body: summary })
    }

    async fn get_result_classification(
        &self,
        execution_id: &str,
    ) -> Result<Option<ResultClassification>, ClientError> {
        let summary = self.fetch_summary(execution_id).await?;
        let raw = summary.get("resultStatusType").and_then(Value::as_str);

        Ok(raw.and_then(|s| match s.trim().to_ascii_uppercase().as_str() {
            "RESOLVED" | "SUCCESS" => Some(ResultClassification::Success),
            "DIAGNOSED" => Some(ResultClassification::Diagnosed),
            "NO_ACTION_TAKEN" => Some(ResultClassification::NoActionTaken),
            _ => None,
        }))
    }
}
