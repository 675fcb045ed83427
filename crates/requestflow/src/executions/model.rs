use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One dispatch of a fulfillment request onto an automation backend,
/// with its full launch/poll audit trail.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct JobExecution {
    pub id: Uuid,
    pub request_id: Uuid,

    pub target_type: String,
    pub resource_type: Option<String>,
    pub resource_id: String,

    pub form_data: Value,
    pub launch_payload: Option<Value>,
    pub last_response: Option<Value>,

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

impl JobExecution {
    pub fn target(&self) -> Option<TargetType> {
        TargetType::parse(&self.target_type)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "succeeded" | "failed")
    }
}

#[derive(Debug, Clone)]
pub struct NewJobExecution {
    pub request_id: Uuid,
    pub target_type: TargetType,
    pub resource_type: Option<ResourceType>,
    pub resource_id: String,
    pub form_data: Value,
}

/// Canonical, backend-agnostic lifecycle status. On the wire the terminal
/// success state is spelled "Success".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Pending,
    Running,
    #[serde(rename = "Success")]
    Succeeded,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Succeeded => "succeeded",
            ExecutionStatus::Failed => "failed",
        }
    }
}

/// Which automation backend a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetType {
    JobTemplateRunner,
    FlowRunner,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::JobTemplateRunner => "job_template_runner",
            TargetType::FlowRunner => "flow_runner",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "job_template_runner" => Some(TargetType::JobTemplateRunner),
            "flow_runner" => Some(TargetType::FlowRunner),
            _ => None,
        }
    }
}

/// Resource discriminator, meaningful only for the job-template runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceType {
    JobTemplate,
    Workflow,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::JobTemplate => "job_template",
            ResourceType::Workflow => "workflow",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "job_template" => Some(ResourceType::JobTemplate),
            "workflow" => Some(ResourceType::Workflow),
            _ => None,
        }
    }
}

/// Secondary outcome tag reported by the flow runner on completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultClassification {
    Success,
    Diagnosed,
    NoActionTaken,
}

impl ResultClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultClassification::Success => "success",
            ResultClassification::Diagnosed => "diagnosed",
            ResultClassification::NoActionTaken => "no_action_taken",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(ResultClassification::Success),
            "diagnosed" => Some(ResultClassification::Diagnosed),
            "no_action_taken" => Some(ResultClassification::NoActionTaken),
            _ => None,
        }
    }
}
