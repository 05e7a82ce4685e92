use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One concrete run of a workflow against a given input. Owned by its
/// workflow; append-only once a terminal status is reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: String,
    pub workflow_id: String,
    pub status: ExecutionStatus,
    pub trigger: TriggerMeta,
    pub input: Value,
    #[serde(default)]
    pub output: Option<Value>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub node_logs: Vec<NodeLog>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Execution {
    pub fn new(workflow_id: &str, input: Value, trigger: TriggerMeta) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            workflow_id: workflow_id.to_string(),
            status: ExecutionStatus::Pending,
            trigger,
            input,
            output: None,
            started_at: Utc::now(),
            finished_at: None,
            node_logs: Vec::new(),
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Success,
    Failed,
    Cancelled,
    Timeout,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionStatus::Pending | ExecutionStatus::Running)
    }
}

/// How and by whom the run was started.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerMeta {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub detail: Option<Value>,
}

impl TriggerMeta {
    pub fn manual() -> Self {
        Self {
            kind: "manual".into(),
            actor: None,
            detail: None,
        }
    }

    pub fn webhook(path: &str) -> Self {
        Self {
            kind: "webhook".into(),
            actor: None,
            detail: Some(serde_json::json!({ "path": path })),
        }
    }
}

/// Per-node audit record. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeLog {
    pub node_id: String,
    pub status: NodeRunStatus,
    pub duration_ms: u64,
    /// Total dispatch attempts, including the first.
    pub attempts: u32,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_class: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRunStatus {
    Success,
    Failed,
    Skipped,
}
