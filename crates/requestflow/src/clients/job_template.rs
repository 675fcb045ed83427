use async_trait::async_trait;
use serde_json::{json, Value};

use crate::clients::{read_error, BackendStatus, ClientError, ExecutionClient};
use crate::executions::model::ResultClassification;

/// Client for the job-template/workflow automation backend (AWX-style
/// REST API: launch endpoints per template kind, numeric job ids).
pub struct JobTemplateRunnerClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl JobTemplateRunnerClient {
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
}

#[async_trait]
impl ExecutionClient for JobTemplateRunnerClient {
    async fn launch(&self, payload: &Value) -> Result<String, ClientError> {
        let resource_id = payload
            .get("resourceId")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ClientError::PermanentlyRejected("launch payload missing resourceId".into())
            })?;

        // Workflows launch through a different collection than plain
        // job templates; everything else about the call is identical.
        let collection = match payload.get("resourceType").and_then(Value::as_str) {
            Some("workflow") => "workflow_job_templates",
            _ => "job_templates",
        };

        let extra_vars = payload.get("parameters").cloned().unwrap_or(json!({}));
        let url = format!("{}/api/v2/{}/{}/launch/", self.base_url, collection, resource_id);

        let resp = self
            .request(self.http.post(&url))
            .json(&json!({ "extra_vars": extra_vars }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(read_error(resp).await);
        }

        let body: Value = resp.json().await?;
        let job_id = body
            .get("job")
            .or_else(|| body.get("workflow_job"))
            .or_else(|| body.get("id"))
            .ok_or_else(|| ClientError::Backend {
                status: 200,
                message: "launch response missing job id".into(),
            })?;

        Ok(match job_id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    async fn get_status(&self, execution_id: &str) -> Result<BackendStatus, ClientError> {
        let url = format!("{}/api/v2/unified_jobs/{}/", self.base_url, execution_id);
        let resp = self.request(self.http.get(&url)).send().await?;

        if !resp.status().is_success() {
            return Err(read_error(resp).await);
        }

        let body: Value = resp.json().await?;
        let raw = body
            .get("status")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ClientError::Backend {
                status: 200,
                message: "status response missing status field".into(),
            })?;

        Ok(BackendStatus { raw, body })
    }

    async fn get_result_classification(
        &self,
        _execution_id: &str,
    ) -> Result<Option<ResultClassification>, ClientError> {
        // This backend has no secondary outcome concept.
        Ok(None)
    }
}
