use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::RetryPolicy;

/// A typed, configured step in a workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique within its workflow.
    pub id: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub config: Value,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Per-node timeout override, in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Per-node retry override; falls back to the workflow default.
    #[serde(default)]
    pub retry: Option<RetryPolicy>,
    /// A critical node's exhausted failure fails the whole run. Absent
    /// means critical: failures must be opted out of, not silently absorbed.
    #[serde(default = "default_true")]
    pub critical: bool,
}

fn default_true() -> bool {
    true
}

/// Closed node-type set. Extension requires a build-time addition here and
/// a matching arm in the executor registry; there is no runtime dispatch
/// table to register into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "family", content = "variant", rename_all = "snake_case")]
pub enum NodeKind {
    Source(SourceKind),
    Processor(ProcessorKind),
    Output(OutputKind),
    Control(ControlKind),
    Agent(AgentOp),
}

impl NodeKind {
    pub fn family(&self) -> &'static str {
        match self {
            NodeKind::Source(_) => "source",
            NodeKind::Processor(_) => "processor",
            NodeKind::Output(_) => "output",
            NodeKind::Control(_) => "control",
            NodeKind::Agent(_) => "agent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Document,
    Spreadsheet,
    Api,
    Database,
    File,
    Webhook,
    UrlFetch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorKind {
    ModelCall,
    Reshape,
    Filter,
    Aggregate,
    Split,
    Merge,
    Snippet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    Email,
    Webhook,
    DatabaseWrite,
    FileWrite,
    ChatMessage,
    ApiCall,
    Notification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    Branch,
    Loop,
    Delay,
    ErrorHandler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentOp {
    ExecuteTask,
    Query,
    StoreMemory,
    RetrieveMemory,
    MakeDecision,
    ProcessLearning,
}

impl AgentOp {
    pub fn name(&self) -> &'static str {
        match self {
            AgentOp::ExecuteTask => "execute_task",
            AgentOp::Query => "query",
            AgentOp::StoreMemory => "store_memory",
            AgentOp::RetrieveMemory => "retrieve_memory",
            AgentOp::MakeDecision => "make_decision",
            AgentOp::ProcessLearning => "process_learning",
        }
    }
}
