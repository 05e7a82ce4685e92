use thiserror::Error;

/// Run-level errors. These always fail the whole execution.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Cycle detected in graph, stuck nodes: {}", nodes.join(", "))]
    CycleDetected { nodes: Vec<String> },
    #[error("Graph build error: {0}")]
    GraphBuild(String),
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),
    #[error("Execution not found: {0}")]
    ExecutionNotFound(String),
    #[error("Workflow is not runnable in status {0}")]
    NotRunnable(String),
    #[error("Run timeout")]
    RunTimeout,
    #[error("Run cancelled")]
    Cancelled,
    #[error("Critical node failed: node={node_id}, error={error}")]
    NodeFailed { node_id: String, error: String },
    #[error("Store error: {0}")]
    Store(String),
    #[error("Engine setup error: {0}")]
    Setup(String),
}
