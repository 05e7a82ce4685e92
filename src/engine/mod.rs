//! Execution engine: orders a workflow's graph, assembles each node's
//! input from its predecessors, dispatches with retry under the run
//! deadline, and records the audit trail.

mod retry;

pub use retry::retry_delay;

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::error::{NodeError, Retryability, RunError};
use crate::executors::{ExecContext, NodeDispatch};
use crate::expr;
use crate::graph::{topological_order, RunGraph};
use crate::model::{
    Connection, Execution, ExecutionStatus, Node, NodeLog, NodeRunStatus, TriggerMeta, Workflow,
};
use crate::recorder::RunRecorder;
use crate::store::ExecutionStore;
use crate::transform;

pub struct ExecutionEngine {
    dispatch: Arc<dyn NodeDispatch>,
    recorder: RunRecorder,
    config: EngineConfig,
}

/// Outcome of one node's dispatch-with-retry loop.
struct Attempted {
    result: Result<Value, NodeError>,
    attempts: u32,
    /// The run deadline, not just the node budget, expired.
    run_deadline_hit: bool,
    cancelled: bool,
}

impl ExecutionEngine {
    pub fn new(
        dispatch: Arc<dyn NodeDispatch>,
        store: Arc<dyn ExecutionStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            dispatch,
            recorder: RunRecorder::new(store),
            config,
        }
    }

    /// Run one workflow to a terminal execution. Run-level failures after
    /// the record exists are reported on the execution, not as `Err`.
    pub async fn execute(
        &self,
        workflow: &Workflow,
        nodes: Vec<Node>,
        connections: Vec<Connection>,
        input: Value,
        trigger: TriggerMeta,
        cancellation: CancellationToken,
    ) -> Result<Execution, RunError> {
        if !workflow.is_runnable() {
            return Err(RunError::NotRunnable(format!("{:?}", workflow.status)));
        }
        let execution = Execution::new(&workflow.id, input, trigger);
        self.recorder.create(&execution).await?;
        self.run(workflow, nodes, connections, execution, cancellation)
            .await
    }

    /// Drive a pre-minted, already-persisted execution record to a
    /// terminal status. The facade persists the record and hands out its
    /// id before spawning this.
    pub async fn run(
        &self,
        workflow: &Workflow,
        nodes: Vec<Node>,
        connections: Vec<Connection>,
        mut execution: Execution,
        cancellation: CancellationToken,
    ) -> Result<Execution, RunError> {
        let input = execution.input.clone();
        let started = Instant::now();

        // Cycles and malformed graphs fail the run before any dispatch.
        let graph = match RunGraph::build(nodes, connections) {
            Ok(graph) => graph,
            Err(e) => {
                return Ok(self
                    .finish(execution, workflow, ExecutionStatus::Failed, None, Some(e.to_string()), started)
                    .await);
            }
        };
        let order = match topological_order(&graph) {
            Ok(order) => order,
            Err(e) => {
                return Ok(self
                    .finish(execution, workflow, ExecutionStatus::Failed, None, Some(e.to_string()), started)
                    .await);
            }
        };

        execution.status = ExecutionStatus::Running;
        self.recorder.update(&execution).await;

        let deadline = started + self.run_timeout(workflow);
        let ctx = ExecContext {
            cancellation: cancellation.clone(),
        };
        let mut context: HashMap<String, Value> = HashMap::new();
        context.insert("input".to_string(), input.clone());

        let mut failure: Option<String> = None;
        let mut terminal = ExecutionStatus::Success;

        for node_id in &order {
            if cancellation.is_cancelled() {
                terminal = ExecutionStatus::Cancelled;
                failure = Some(RunError::Cancelled.to_string());
                break;
            }
            if Instant::now() >= deadline {
                terminal = ExecutionStatus::Timeout;
                failure = Some(RunError::RunTimeout.to_string());
                break;
            }
            let Some(node) = graph.node(node_id) else {
                continue;
            };
            if !node.enabled {
                self.record_node_log(
                    &mut execution,
                    NodeLog {
                        node_id: node.id.clone(),
                        status: NodeRunStatus::Skipped,
                        duration_ms: 0,
                        attempts: 0,
                        error: None,
                        error_class: None,
                    },
                )
                .await;
                continue;
            }

            let assembled = assemble_input(&graph, node, &context, &input);
            let node_started = Instant::now();
            let attempted = self
                .dispatch_with_retry(workflow, node, &assembled, &ctx, deadline)
                .await;
            let duration_ms = node_started.elapsed().as_millis() as u64;

            match attempted.result {
                Ok(output) => {
                    self.record_node_log(
                        &mut execution,
                        NodeLog {
                            node_id: node.id.clone(),
                            status: NodeRunStatus::Success,
                            duration_ms,
                            attempts: attempted.attempts,
                            error: None,
                            error_class: None,
                        },
                    )
                    .await;
                    context.insert(node.id.clone(), output);
                }
                Err(e) => {
                    self.record_node_log(
                        &mut execution,
                        NodeLog {
                            node_id: node.id.clone(),
                            status: NodeRunStatus::Failed,
                            duration_ms,
                            attempts: attempted.attempts,
                            error: Some(e.to_string()),
                            error_class: Some(e.class().to_string()),
                        },
                    )
                    .await;

                    if attempted.cancelled {
                        terminal = ExecutionStatus::Cancelled;
                        failure = Some(RunError::Cancelled.to_string());
                        break;
                    }
                    if attempted.run_deadline_hit {
                        terminal = ExecutionStatus::Timeout;
                        failure = Some(RunError::RunTimeout.to_string());
                        break;
                    }
                    if node.critical {
                        let run_err = RunError::NodeFailed {
                            node_id: node.id.clone(),
                            error: e.to_string(),
                        };
                        terminal = ExecutionStatus::Failed;
                        failure = Some(run_err.to_string());
                        break;
                    }
                    tracing::warn!(node_id = %node.id, error = %e, "non-critical node exhausted, continuing");
                    context.insert(node.id.clone(), Value::Object(Map::new()));
                }
            }
        }

        let output = if terminal == ExecutionStatus::Success {
            Some(merge_terminal_outputs(&graph, &context))
        } else {
            None
        };
        Ok(self
            .finish(execution, workflow, terminal, output, failure, started)
            .await)
    }

    fn run_timeout(&self, workflow: &Workflow) -> std::time::Duration {
        if workflow.timeout_secs > 0 {
            std::time::Duration::from_secs(workflow.timeout_secs)
        } else {
            self.config.run_timeout()
        }
    }

    async fn dispatch_with_retry(
        &self,
        workflow: &Workflow,
        node: &Node,
        input: &Value,
        ctx: &ExecContext,
        deadline: Instant,
    ) -> Attempted {
        let policy = node
            .retry
            .clone()
            .unwrap_or_else(|| workflow.retry_policy.clone());
        let max_attempts = if policy.retry_on_failure {
            policy.max_retries + 1
        } else {
            1
        };
        let node_budget = std::time::Duration::from_secs(
            node.timeout_secs.unwrap_or(self.config.node_timeout_secs),
        );

        let mut attempts: u32 = 0;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Attempted {
                    result: Err(NodeError::Timeout),
                    attempts,
                    run_deadline_hit: true,
                    cancelled: false,
                };
            }
            attempts += 1;

            let budget = node_budget.min(remaining);
            let result = match tokio::time::timeout(
                budget,
                self.dispatch.dispatch(node, input, ctx),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(NodeError::Timeout),
            };

            let error = match result {
                Ok(output) => {
                    return Attempted {
                        result: Ok(output),
                        attempts,
                        run_deadline_hit: false,
                        cancelled: false,
                    }
                }
                Err(e) => e,
            };

            // A budget clamped by the run deadline expiring is a run
            // timeout, not a per-node failure.
            if Instant::now() >= deadline {
                return Attempted {
                    result: Err(error),
                    attempts,
                    run_deadline_hit: true,
                    cancelled: false,
                };
            }

            let may_retry =
                attempts < max_attempts && error.retryability() == Retryability::Retryable;
            if !may_retry {
                return Attempted {
                    result: Err(error),
                    attempts,
                    run_deadline_hit: false,
                    cancelled: false,
                };
            }

            let delay = retry_delay(&policy, attempts - 1);
            tracing::warn!(
                node_id = %node.id,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retrying node after failure"
            );
            let remaining = deadline.saturating_duration_since(Instant::now());
            tokio::select! {
                _ = tokio::time::sleep(delay.min(remaining)) => {}
                _ = ctx.cancellation.cancelled() => {
                    return Attempted {
                        result: Err(NodeError::Execution("cancelled during retry backoff".into())),
                        attempts,
                        run_deadline_hit: false,
                        cancelled: true,
                    };
                }
            }
        }
    }

    /// The log rides both the store's incremental append and the local
    /// record, so the terminal update keeps the full trail.
    async fn record_node_log(&self, execution: &mut Execution, log: NodeLog) {
        self.recorder.append_node_log(&execution.id, &log).await;
        execution.node_logs.push(log);
    }

    async fn finish(
        &self,
        mut execution: Execution,
        workflow: &Workflow,
        status: ExecutionStatus,
        output: Option<Value>,
        error: Option<String>,
        started: Instant,
    ) -> Execution {
        execution.status = status;
        execution.output = output;
        execution.error = error;
        execution.finished_at = Some(chrono::Utc::now());
        self.recorder.update(&execution).await;

        let duration_ms = started.elapsed().as_millis() as u64;
        let success = status == ExecutionStatus::Success;
        self.recorder
            .record_outcome(&workflow.id, success, duration_ms)
            .await;
        tracing::info!(
            execution_id = %execution.id,
            workflow_id = %workflow.id,
            status = ?status,
            duration_ms,
            "execution finished"
        );
        execution
    }
}

/// Assemble one node's input from its enabled incoming connections, in
/// definition order. Root nodes receive the run input verbatim.
fn assemble_input(
    graph: &RunGraph,
    node: &Node,
    context: &HashMap<String, Value>,
    run_input: &Value,
) -> Value {
    let incoming: Vec<&Connection> = graph
        .incoming(&node.id)
        .iter()
        .filter(|c| c.enabled)
        .collect();
    if incoming.is_empty() {
        return run_input.clone();
    }

    let mut assembled = Map::new();
    for conn in incoming {
        // A predecessor that produced nothing contributes nothing.
        let Some(upstream) = context.get(&conn.source) else {
            continue;
        };

        let contribution = match &conn.transform {
            Some(spec) => match transform::apply(spec, upstream) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(
                        connection = %conn.id,
                        error = %e,
                        "dropping contribution: transform failed"
                    );
                    continue;
                }
            },
            None => upstream.clone(),
        };

        if let Some(condition) = &conn.condition {
            match expr::evaluate_condition(condition, &contribution) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    tracing::warn!(
                        connection = %conn.id,
                        error = %e,
                        "dropping contribution: condition rejected"
                    );
                    continue;
                }
            }
        }

        match contribution {
            Value::Object(map) => {
                for (k, v) in map {
                    assembled.insert(k, v);
                }
            }
            other => {
                assembled.insert(conn.target_handle.clone(), other);
            }
        }
    }
    Value::Object(assembled)
}

/// Run output: terminal-node outputs merged under the same rule the input
/// assembler uses, keyed by node id for non-object outputs.
fn merge_terminal_outputs(graph: &RunGraph, context: &HashMap<String, Value>) -> Value {
    let mut merged = Map::new();
    for node in graph.terminal_nodes() {
        let Some(output) = context.get(&node.id) else {
            continue;
        };
        match output {
            Value::Object(map) => {
                for (k, v) in map {
                    merged.insert(k.clone(), v.clone());
                }
            }
            other => {
                merged.insert(node.id.clone(), other.clone());
            }
        }
    }
    Value::Object(merged)
}
