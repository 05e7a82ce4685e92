//! Embedding facade: wires config, stores, executor registry, and agent
//! bridge into one handle the host application drives.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::agent::{AgentBridge, HttpAgentBridge, UnavailableAgentBridge};
use crate::config::EngineConfig;
use crate::engine::ExecutionEngine;
use crate::error::RunError;
use crate::executors::{ExecutorDeps, ExecutorRegistry};
use crate::model::{Execution, TriggerMeta};
use crate::security::{CredentialVault, UrlGuard};
use crate::store::{ExecutionStore, MemoryStore, WorkflowStore};

pub struct Flowgrid {
    workflows: Arc<dyn WorkflowStore>,
    executions: Arc<dyn ExecutionStore>,
    engine: Arc<ExecutionEngine>,
    /// Cancellation handles for in-flight runs, keyed by execution id.
    running: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl Flowgrid {
    pub fn new(
        config: EngineConfig,
        workflows: Arc<dyn WorkflowStore>,
        executions: Arc<dyn ExecutionStore>,
    ) -> Result<Self, RunError> {
        let guard = UrlGuard::new(config.guard.clone());

        let vault = match &config.vault_key {
            Some(key) => Some(Arc::new(
                CredentialVault::new(key).map_err(|e| RunError::Setup(e.to_string()))?,
            )),
            None => None,
        };

        let bridge: Arc<dyn AgentBridge> = match &config.agent_endpoint {
            Some(endpoint) => Arc::new(
                HttpAgentBridge::new(endpoint.clone(), guard.clone(), config.agent_timeout())
                    .map_err(|e| RunError::Setup(e.to_string()))?,
            ),
            None => Arc::new(UnavailableAgentBridge),
        };

        let registry = ExecutorRegistry::new(ExecutorDeps {
            guard,
            vault,
            bridge,
            http_timeout: config.http_timeout(),
        })
        .map_err(|e| RunError::Setup(e.to_string()))?;

        let engine = Arc::new(ExecutionEngine::new(
            Arc::new(registry),
            executions.clone(),
            config,
        ));

        Ok(Self {
            workflows,
            executions,
            engine,
            running: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Facade over an in-memory store, for embedding without external
    /// persistence. Returns the store handle so the host can seed it.
    pub fn in_memory(config: EngineConfig) -> Result<(Self, Arc<MemoryStore>), RunError> {
        let store = Arc::new(MemoryStore::new());
        let facade = Self::new(config, store.clone(), store.clone())?;
        Ok((facade, store))
    }

    /// Start a run and return its execution id. The run itself is spawned
    /// onto the runtime; poll [`get_execution`](Self::get_execution) for
    /// its terminal state.
    pub async fn execute(
        &self,
        workflow_id: &str,
        input: Value,
        trigger: TriggerMeta,
    ) -> Result<String, RunError> {
        let workflow = self.workflows.load_workflow(workflow_id).await?;
        if !workflow.is_runnable() {
            return Err(RunError::NotRunnable(format!("{:?}", workflow.status)));
        }
        let (nodes, connections) = self.workflows.load_graph(workflow_id).await?;

        let execution = Execution::new(workflow_id, input, trigger);
        let execution_id = execution.id.clone();
        // Persist before spawning so the returned id always resolves.
        self.executions
            .create_execution(&execution)
            .await
            .map_err(RunError::from)?;
        let token = CancellationToken::new();
        self.running
            .lock()
            .insert(execution_id.clone(), token.clone());

        let engine = self.engine.clone();
        let running = self.running.clone();
        let id_for_task = execution_id.clone();
        tokio::spawn(async move {
            if let Err(e) = engine
                .run(&workflow, nodes, connections, execution, token)
                .await
            {
                tracing::error!(execution_id = %id_for_task, error = %e, "run aborted");
            }
            running.lock().remove(&id_for_task);
        });

        Ok(execution_id)
    }

    pub async fn get_execution(&self, execution_id: &str) -> Result<Execution, RunError> {
        self.executions
            .get_execution(execution_id)
            .await
            .map_err(RunError::from)
    }

    /// Resolve an inbound webhook path to its workflow and start a run
    /// with the delivered payload as raw input.
    pub async fn trigger_webhook(&self, path: &str, payload: Value) -> Result<String, RunError> {
        let workflow = self.workflows.find_by_webhook_path(path).await?;
        self.execute(&workflow.id, payload, TriggerMeta::webhook(path))
            .await
    }

    /// Request cooperative cancellation of an in-flight run. Returns false
    /// if the execution is unknown or already finished.
    pub fn cancel(&self, execution_id: &str) -> bool {
        match self.running.lock().get(execution_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Connection, ExecutionStatus, Node, NodeKind, ProcessorKind, RetryPolicy, SourceKind,
        Trigger, Workflow, WorkflowStats, WorkflowStatus,
    };
    use serde_json::json;
    use std::time::Duration;

    fn workflow(id: &str, trigger: Trigger) -> Workflow {
        Workflow {
            id: id.into(),
            name: id.into(),
            status: WorkflowStatus::Active,
            trigger,
            timeout_secs: 30,
            retry_policy: RetryPolicy::default(),
            stats: WorkflowStats::default(),
        }
    }

    fn node(id: &str, kind: NodeKind, config: Value) -> Node {
        Node {
            id: id.into(),
            kind,
            config,
            enabled: true,
            timeout_secs: None,
            retry: None,
            critical: true,
        }
    }

    async fn wait_terminal(facade: &Flowgrid, execution_id: &str) -> Execution {
        for _ in 0..200 {
            let exec = facade.get_execution(execution_id).await.unwrap();
            if exec.is_terminal() {
                return exec;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("execution {execution_id} never reached a terminal status");
    }

    #[tokio::test]
    async fn test_execute_end_to_end() {
        let (facade, store) = Flowgrid::in_memory(EngineConfig::default()).unwrap();
        store.insert_workflow(
            workflow("w1", Trigger::Manual),
            vec![
                node(
                    "fetch",
                    NodeKind::Source(SourceKind::Document),
                    json!({"data": {"items": [{"v": 1}, {"v": 5}]}}),
                ),
                node(
                    "keep_big",
                    NodeKind::Processor(ProcessorKind::Filter),
                    json!({"condition": "payload.v > 3"}),
                ),
                node(
                    "tally",
                    NodeKind::Processor(ProcessorKind::Aggregate),
                    json!({"op": "count"}),
                ),
            ],
            vec![
                Connection::between("fetch", "keep_big"),
                Connection::between("keep_big", "tally"),
            ],
        );

        let id = facade
            .execute("w1", json!({}), TriggerMeta::manual())
            .await
            .unwrap();
        let exec = wait_terminal(&facade, &id).await;

        assert_eq!(exec.status, ExecutionStatus::Success);
        assert_eq!(exec.output.unwrap(), json!({"count": 1}));
    }

    #[tokio::test]
    async fn test_execution_resolves_immediately_after_execute() {
        let (facade, store) = Flowgrid::in_memory(EngineConfig::default()).unwrap();
        store.insert_workflow(
            workflow("w1", Trigger::Manual),
            vec![node(
                "src",
                NodeKind::Source(SourceKind::Document),
                json!({"data": {"ok": true}}),
            )],
            vec![],
        );

        let id = facade
            .execute("w1", json!({}), TriggerMeta::manual())
            .await
            .unwrap();
        // The record exists before the spawned run makes any progress.
        let exec = facade.get_execution(&id).await.unwrap();
        assert_eq!(exec.workflow_id, "w1");

        let exec = wait_terminal(&facade, &id).await;
        assert_eq!(exec.status, ExecutionStatus::Success);
        assert_eq!(exec.node_logs.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_workflow_is_not_found() {
        let (facade, _) = Flowgrid::in_memory(EngineConfig::default()).unwrap();
        let err = facade
            .execute("ghost", json!({}), TriggerMeta::manual())
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::WorkflowNotFound(_)));
    }

    #[tokio::test]
    async fn test_paused_workflow_rejected_before_spawn() {
        let (facade, store) = Flowgrid::in_memory(EngineConfig::default()).unwrap();
        let mut wf = workflow("w1", Trigger::Manual);
        wf.status = WorkflowStatus::Paused;
        store.insert_workflow(wf, vec![], vec![]);

        let err = facade
            .execute("w1", json!({}), TriggerMeta::manual())
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::NotRunnable(_)));
    }

    #[tokio::test]
    async fn test_webhook_trigger_resolves_path() {
        let (facade, store) = Flowgrid::in_memory(EngineConfig::default()).unwrap();
        let trigger = Trigger::webhook();
        let path = match &trigger {
            Trigger::Webhook { path } => path.clone(),
            _ => unreachable!(),
        };
        store.insert_workflow(
            workflow("w1", trigger),
            vec![node(
                "in",
                NodeKind::Source(SourceKind::Webhook),
                json!({}),
            )],
            vec![],
        );

        let id = facade
            .trigger_webhook(&path, json!({"event": "push"}))
            .await
            .unwrap();
        let exec = wait_terminal(&facade, &id).await;

        assert_eq!(exec.status, ExecutionStatus::Success);
        assert_eq!(exec.trigger.kind, "webhook");
        assert_eq!(exec.output.unwrap(), json!({"event": "push"}));

        assert!(matches!(
            facade.trigger_webhook("hook/unknown", json!({})).await,
            Err(RunError::WorkflowNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_unknown_execution_is_false() {
        let (facade, _) = Flowgrid::in_memory(EngineConfig::default()).unwrap();
        assert!(!facade.cancel("ghost"));
    }

    #[tokio::test]
    async fn test_concurrent_executions_all_counted() {
        let (facade, store) = Flowgrid::in_memory(EngineConfig::default()).unwrap();
        store.insert_workflow(
            workflow("w1", Trigger::Manual),
            vec![node(
                "src",
                NodeKind::Source(SourceKind::Document),
                json!({"data": {"ok": true}}),
            )],
            vec![],
        );

        let facade = Arc::new(facade);
        let mut ids = Vec::new();
        for _ in 0..16 {
            ids.push(
                facade
                    .execute("w1", json!({}), TriggerMeta::manual())
                    .await
                    .unwrap(),
            );
        }
        for id in &ids {
            let exec = wait_terminal(&facade, id).await;
            assert_eq!(exec.status, ExecutionStatus::Success);
        }

        let stats = store.workflow_stats("w1").unwrap();
        assert_eq!(stats.total_runs, 16);
        assert_eq!(stats.success_runs, 16);
    }
}
