//! Persistence seams. The real store is an external collaborator; the
//! engine talks to it through these traits and ships an in-memory
//! implementation for the facade and the test suite.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Connection, Execution, Node, NodeLog, Workflow, WorkflowStats};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),
    #[error("Execution not found: {0}")]
    ExecutionNotFound(String),
    #[error("Store backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for crate::error::RunError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::WorkflowNotFound(id) => crate::error::RunError::WorkflowNotFound(id),
            StoreError::ExecutionNotFound(id) => crate::error::RunError::ExecutionNotFound(id),
            StoreError::Backend(msg) => crate::error::RunError::Store(msg),
        }
    }
}

/// Read side: the node/connection set for one workflow as loaded for a
/// single run.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn load_workflow(&self, workflow_id: &str) -> Result<Workflow, StoreError>;

    async fn load_graph(
        &self,
        workflow_id: &str,
    ) -> Result<(Vec<Node>, Vec<Connection>), StoreError>;

    /// Resolve an unguessable webhook path to its workflow id.
    async fn find_by_webhook_path(&self, path: &str) -> Result<Workflow, StoreError>;
}

/// Write side: execution + per-node audit records and atomic statistics.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn create_execution(&self, execution: &Execution) -> Result<(), StoreError>;

    async fn update_execution(&self, execution: &Execution) -> Result<(), StoreError>;

    async fn append_node_log(&self, execution_id: &str, log: &NodeLog) -> Result<(), StoreError>;

    async fn get_execution(&self, execution_id: &str) -> Result<Execution, StoreError>;

    /// Fold one completed execution into the workflow's counters as a
    /// single atomic update; lost updates under concurrency are the bug
    /// this signature exists to prevent.
    async fn record_outcome(
        &self,
        workflow_id: &str,
        success: bool,
        duration_ms: u64,
    ) -> Result<WorkflowStats, StoreError>;
}
