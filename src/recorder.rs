//! Run recorder: the engine's write path to the execution store.
//!
//! Audit writes must never take a run down with them; persistence
//! failures are logged and the run carries on with its in-memory record.

use std::sync::Arc;

use crate::error::RunError;
use crate::model::{Execution, NodeLog, WorkflowStats};
use crate::store::ExecutionStore;

pub struct RunRecorder {
    store: Arc<dyn ExecutionStore>,
}

impl RunRecorder {
    pub fn new(store: Arc<dyn ExecutionStore>) -> Self {
        Self { store }
    }

    /// Creating the execution record must succeed: without it there is no
    /// audit trail to attach anything to.
    pub async fn create(&self, execution: &Execution) -> Result<(), RunError> {
        self.store
            .create_execution(execution)
            .await
            .map_err(RunError::from)
    }

    pub async fn update(&self, execution: &Execution) {
        if let Err(e) = self.store.update_execution(execution).await {
            tracing::warn!(execution_id = %execution.id, error = %e, "failed to persist execution update");
        }
    }

    pub async fn append_node_log(&self, execution_id: &str, log: &NodeLog) {
        if let Err(e) = self.store.append_node_log(execution_id, log).await {
            tracing::warn!(execution_id, node_id = %log.node_id, error = %e, "failed to persist node log");
        }
    }

    /// Exactly one call per completed execution.
    pub async fn record_outcome(
        &self,
        workflow_id: &str,
        success: bool,
        duration_ms: u64,
    ) -> Option<WorkflowStats> {
        match self.store.record_outcome(workflow_id, success, duration_ms).await {
            Ok(stats) => Some(stats),
            Err(e) => {
                tracing::warn!(workflow_id, error = %e, "failed to update workflow statistics");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TriggerMeta;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_update_on_unknown_execution_does_not_error() {
        let recorder = RunRecorder::new(Arc::new(MemoryStore::new()));
        let exec = Execution::new("w1", json!({}), TriggerMeta::manual());
        // Never created; the recorder logs and carries on.
        recorder.update(&exec).await;
    }

    #[tokio::test]
    async fn test_create_then_update() {
        let store = Arc::new(MemoryStore::new());
        let recorder = RunRecorder::new(store.clone());
        let exec = Execution::new("w1", json!({}), TriggerMeta::manual());
        recorder.create(&exec).await.unwrap();
        recorder.update(&exec).await;
        assert!(store.get_execution(&exec.id).await.is_ok());
    }
}
