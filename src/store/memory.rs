use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::model::{Connection, Execution, Node, NodeLog, Trigger, Workflow, WorkflowStats};

use super::{ExecutionStore, StoreError, WorkflowStore};

/// In-memory store. Statistics updates take the workflow's lock for the
/// whole read-modify-write, giving the same atomicity a row-level-locked
/// update provides.
#[derive(Default)]
pub struct MemoryStore {
    workflows: Mutex<HashMap<String, Workflow>>,
    graphs: Mutex<HashMap<String, (Vec<Node>, Vec<Connection>)>>,
    executions: Mutex<HashMap<String, Execution>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_workflow(&self, workflow: Workflow, nodes: Vec<Node>, connections: Vec<Connection>) {
        self.graphs
            .lock()
            .insert(workflow.id.clone(), (nodes, connections));
        self.workflows.lock().insert(workflow.id.clone(), workflow);
    }

    pub fn workflow_stats(&self, workflow_id: &str) -> Option<WorkflowStats> {
        self.workflows.lock().get(workflow_id).map(|w| w.stats)
    }
}

#[async_trait]
impl WorkflowStore for MemoryStore {
    async fn load_workflow(&self, workflow_id: &str) -> Result<Workflow, StoreError> {
        self.workflows
            .lock()
            .get(workflow_id)
            .cloned()
            .ok_or_else(|| StoreError::WorkflowNotFound(workflow_id.to_string()))
    }

    async fn load_graph(
        &self,
        workflow_id: &str,
    ) -> Result<(Vec<Node>, Vec<Connection>), StoreError> {
        self.graphs
            .lock()
            .get(workflow_id)
            .cloned()
            .ok_or_else(|| StoreError::WorkflowNotFound(workflow_id.to_string()))
    }

    async fn find_by_webhook_path(&self, path: &str) -> Result<Workflow, StoreError> {
        self.workflows
            .lock()
            .values()
            .find(|w| matches!(&w.trigger, Trigger::Webhook { path: p } if p == path))
            .cloned()
            .ok_or_else(|| StoreError::WorkflowNotFound(format!("webhook path {path}")))
    }
}

#[async_trait]
impl ExecutionStore for MemoryStore {
    async fn create_execution(&self, execution: &Execution) -> Result<(), StoreError> {
        self.executions
            .lock()
            .insert(execution.id.clone(), execution.clone());
        Ok(())
    }

    async fn update_execution(&self, execution: &Execution) -> Result<(), StoreError> {
        let mut executions = self.executions.lock();
        if !executions.contains_key(&execution.id) {
            return Err(StoreError::ExecutionNotFound(execution.id.clone()));
        }
        executions.insert(execution.id.clone(), execution.clone());
        Ok(())
    }

    async fn append_node_log(&self, execution_id: &str, log: &NodeLog) -> Result<(), StoreError> {
        let mut executions = self.executions.lock();
        let execution = executions
            .get_mut(execution_id)
            .ok_or_else(|| StoreError::ExecutionNotFound(execution_id.to_string()))?;
        execution.node_logs.push(log.clone());
        Ok(())
    }

    async fn get_execution(&self, execution_id: &str) -> Result<Execution, StoreError> {
        self.executions
            .lock()
            .get(execution_id)
            .cloned()
            .ok_or_else(|| StoreError::ExecutionNotFound(execution_id.to_string()))
    }

    async fn record_outcome(
        &self,
        workflow_id: &str,
        success: bool,
        duration_ms: u64,
    ) -> Result<WorkflowStats, StoreError> {
        let mut workflows = self.workflows.lock();
        let workflow = workflows
            .get_mut(workflow_id)
            .ok_or_else(|| StoreError::WorkflowNotFound(workflow_id.to_string()))?;
        workflow.stats.record(success, duration_ms);
        Ok(workflow.stats)
    }
}
