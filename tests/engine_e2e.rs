//! End-to-end runs through the public facade with the real executor
//! registry and an in-memory store.

use flowgrid::model::{ControlKind, NodeRunStatus, ProcessorKind, SourceKind};
use flowgrid::{
    Connection, EngineConfig, Execution, ExecutionStatus, Flowgrid, Node, NodeKind, RetryPolicy,
    Trigger, TriggerMeta, Workflow, WorkflowStatus,
};
use flowgrid::store::MemoryStore;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Facade over a fresh in-memory store, with log capture honoring
/// `RUST_LOG` for debugging failed runs.
fn harness() -> (Flowgrid, Arc<MemoryStore>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    Flowgrid::in_memory(EngineConfig::default()).unwrap()
}

fn workflow(id: &str) -> Workflow {
    Workflow {
        id: id.into(),
        name: id.into(),
        status: WorkflowStatus::Active,
        trigger: Trigger::Manual,
        timeout_secs: 30,
        retry_policy: RetryPolicy::default(),
        stats: flowgrid::model::WorkflowStats::default(),
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
    for _ in 0..300 {
        let exec = facade.get_execution(execution_id).await.unwrap();
        if exec.is_terminal() {
            return exec;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("execution {execution_id} never finished");
}

#[tokio::test]
async fn fetch_filter_aggregate_pipeline() {
    let (facade, store) = harness();
    store.insert_workflow(
        workflow("pipeline"),
        vec![
            node(
                "fetch",
                NodeKind::Source(SourceKind::Document),
                json!({"data": {"items": [{"v": 1}, {"v": 5}]}}),
            ),
            node(
                "filter",
                NodeKind::Processor(ProcessorKind::Filter),
                json!({"condition": "payload.v > 3"}),
            ),
            node(
                "count",
                NodeKind::Processor(ProcessorKind::Aggregate),
                json!({"op": "count"}),
            ),
        ],
        vec![
            Connection::between("fetch", "filter"),
            Connection::between("filter", "count"),
        ],
    );

    let id = facade
        .execute("pipeline", json!({}), TriggerMeta::manual())
        .await
        .unwrap();
    let exec = wait_terminal(&facade, &id).await;

    assert_eq!(exec.status, ExecutionStatus::Success);
    assert_eq!(exec.output.unwrap(), json!({"count": 1}));
    assert_eq!(exec.node_logs.len(), 3);
    assert!(exec
        .node_logs
        .iter()
        .all(|l| l.status == NodeRunStatus::Success && l.attempts == 1));
}

#[tokio::test]
async fn branch_gates_only_one_path() {
    let (facade, store) = harness();
    store.insert_workflow(
        workflow("branching"),
        vec![
            node(
                "src",
                NodeKind::Source(SourceKind::Document),
                json!({"data": {"amount": 120}}),
            ),
            node(
                "gate",
                NodeKind::Control(ControlKind::Branch),
                json!({"condition": "payload.amount > 100"}),
            ),
            node(
                "big",
                NodeKind::Processor(ProcessorKind::Snippet),
                json!({"expression": "\"large order\""}),
            ),
            node(
                "small",
                NodeKind::Processor(ProcessorKind::Snippet),
                json!({"expression": "\"small order\""}),
            ),
        ],
        vec![
            Connection::between("src", "gate"),
            Connection::between("gate", "big").with_condition("payload.result == true"),
            Connection::between("gate", "small").with_condition("payload.result == false"),
        ],
    );

    let id = facade
        .execute("branching", json!({}), TriggerMeta::manual())
        .await
        .unwrap();
    let exec = wait_terminal(&facade, &id).await;

    assert_eq!(exec.status, ExecutionStatus::Success);
    // Both leaves run (the gate drops data, not execution), both emit
    // their snippet result; the shared "result" key merges, later node
    // definition wins.
    let output = exec.output.unwrap();
    assert_eq!(output["result"], "small order");
}

#[tokio::test]
async fn transform_and_handle_key_scalar_contributions() {
    let (facade, store) = harness();
    store.insert_workflow(
        workflow("reshaping"),
        vec![
            node(
                "src",
                NodeKind::Source(SourceKind::Document),
                json!({"data": {"user": {"name": "ada", "email": "ada@example.com"}}}),
            ),
            node("sink", NodeKind::Processor(ProcessorKind::Merge), json!({})),
        ],
        vec![Connection::between("src", "sink")
            .with_transform(json!({"kind": "path", "path": "user.name"}))
            .with_target_handle("who")],
    );

    let id = facade
        .execute("reshaping", json!({}), TriggerMeta::manual())
        .await
        .unwrap();
    let exec = wait_terminal(&facade, &id).await;

    assert_eq!(exec.status, ExecutionStatus::Success);
    assert_eq!(exec.output.unwrap(), json!({"who": "ada"}));
}

#[tokio::test]
async fn cycle_fails_with_stuck_nodes_named() {
    let (facade, store) = harness();
    store.insert_workflow(
        workflow("cyclic"),
        vec![
            node("a", NodeKind::Processor(ProcessorKind::Merge), json!({})),
            node("b", NodeKind::Processor(ProcessorKind::Merge), json!({})),
            node("c", NodeKind::Processor(ProcessorKind::Merge), json!({})),
        ],
        vec![
            Connection::between("a", "b"),
            Connection::between("b", "c"),
            Connection::between("c", "b"),
        ],
    );

    let id = facade
        .execute("cyclic", json!({}), TriggerMeta::manual())
        .await
        .unwrap();
    let exec = wait_terminal(&facade, &id).await;

    assert_eq!(exec.status, ExecutionStatus::Failed);
    let error = exec.error.unwrap();
    assert!(error.contains("b"));
    assert!(error.contains("c"));
    // Nothing was dispatched.
    assert!(exec.node_logs.is_empty());
}

#[tokio::test]
async fn non_critical_failure_does_not_fail_run() {
    let (facade, store) = harness();
    let mut flaky = node(
        "flaky",
        NodeKind::Source(SourceKind::Database),
        // No staged data: fails with a non-retryable config error.
        json!({}),
    );
    flaky.critical = false;

    store.insert_workflow(
        workflow("tolerant"),
        vec![
            flaky,
            node(
                "after",
                NodeKind::Processor(ProcessorKind::Snippet),
                json!({"expression": "true"}),
            ),
        ],
        vec![Connection::between("flaky", "after")],
    );

    let id = facade
        .execute("tolerant", json!({}), TriggerMeta::manual())
        .await
        .unwrap();
    let exec = wait_terminal(&facade, &id).await;

    assert_eq!(exec.status, ExecutionStatus::Success);
    let flaky_log = exec.node_logs.iter().find(|l| l.node_id == "flaky").unwrap();
    assert_eq!(flaky_log.status, NodeRunStatus::Failed);
    assert_eq!(flaky_log.attempts, 1);
    assert_eq!(flaky_log.error_class.as_deref(), Some("config"));
    assert_eq!(exec.output.unwrap()["result"], true);
}

#[tokio::test]
async fn unsafe_snippet_fails_the_node() {
    let (facade, store) = harness();
    store.insert_workflow(
        workflow("unsafe"),
        vec![node(
            "bad",
            NodeKind::Processor(ProcessorKind::Snippet),
            json!({"expression": "payload.x + eval(\"1\")"}),
        )],
        vec![],
    );

    let id = facade
        .execute("unsafe", json!({}), TriggerMeta::manual())
        .await
        .unwrap();
    let exec = wait_terminal(&facade, &id).await;

    assert_eq!(exec.status, ExecutionStatus::Failed);
    let log = &exec.node_logs[0];
    assert_eq!(log.status, NodeRunStatus::Failed);
    assert_eq!(log.attempts, 1);
    assert_eq!(log.error_class.as_deref(), Some("unsafe_expression"));
}

#[tokio::test]
async fn fan_in_merges_predecessors_in_definition_order() {
    let (facade, store) = harness();
    store.insert_workflow(
        workflow("fan_in"),
        vec![
            node(
                "left",
                NodeKind::Source(SourceKind::Document),
                json!({"data": {"x": 1, "shared": "from-left"}}),
            ),
            node(
                "right",
                NodeKind::Source(SourceKind::Document),
                json!({"data": {"y": 2, "shared": "from-right"}}),
            ),
            node("join", NodeKind::Processor(ProcessorKind::Merge), json!({})),
        ],
        vec![
            Connection::between("left", "join"),
            Connection::between("right", "join"),
        ],
    );

    let id = facade
        .execute("fan_in", json!({}), TriggerMeta::manual())
        .await
        .unwrap();
    let exec = wait_terminal(&facade, &id).await;

    assert_eq!(exec.status, ExecutionStatus::Success);
    let output = exec.output.unwrap();
    assert_eq!(output["x"], 1);
    assert_eq!(output["y"], 2);
    // Later connection wins the shared key.
    assert_eq!(output["shared"], "from-right");
}
