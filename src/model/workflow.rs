use serde::{Deserialize, Serialize};

/// A workflow definition as loaded for a single run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: WorkflowStatus,
    pub trigger: Trigger,
    /// Run-level timeout backstop, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Default retry policy for nodes without an override.
    #[serde(default)]
    pub retry_policy: RetryPolicy,
    /// Mutated only by completed executions, through the store's atomic
    /// update. Counts are monotonically non-decreasing.
    #[serde(default)]
    pub stats: WorkflowStats,
}

fn default_timeout_secs() -> u64 {
    300
}

impl Workflow {
    pub fn is_runnable(&self) -> bool {
        matches!(self.status, WorkflowStatus::Active | WorkflowStatus::Draft)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    #[default]
    Draft,
    Active,
    Paused,
    Disabled,
}

/// How a run gets started. Schedule firing belongs to the external
/// dispatcher; the cron expression is carried opaquely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    Manual,
    Schedule { cron: String },
    /// Unique, unguessable path; the inbound payload becomes the run's
    /// raw input.
    Webhook { path: String },
    Event { name: String },
}

impl Trigger {
    /// Mint a fresh webhook trigger with an unguessable path.
    pub fn webhook() -> Self {
        Trigger::Webhook {
            path: format!("hook/{}", uuid::Uuid::new_v4()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default)]
    pub retry_on_failure: bool,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_on_failure: false,
            max_retries: 0,
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Rolling execution statistics for a workflow.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct WorkflowStats {
    pub total_runs: u64,
    pub success_runs: u64,
    pub failure_runs: u64,
    pub avg_duration_ms: f64,
}

impl WorkflowStats {
    /// Fold one completed execution into the counters. Callers must apply
    /// this under the store's atomic update, exactly once per execution.
    pub fn record(&mut self, success: bool, duration_ms: u64) {
        self.total_runs += 1;
        if success {
            self.success_runs += 1;
        } else {
            self.failure_runs += 1;
        }
        let n = self.total_runs as f64;
        self.avg_duration_ms += (duration_ms as f64 - self.avg_duration_ms) / n;
    }
}
