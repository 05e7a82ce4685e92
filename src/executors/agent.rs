//! Agent family: workflow steps that call into the agent bridge.
//!
//! An unreachable bridge resolves to the defined fallback response so
//! workflows degrade rather than fail; every other bridge error is a
//! contained node error.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::agent::{AgentBridge, AgentError};
use crate::error::NodeError;
use crate::model::{AgentOp, Node, NodeKind};
use crate::transform::render_template;

use super::{config_str, ExecContext, NodeExecutor};

pub struct AgentExecutor {
    bridge: Arc<dyn AgentBridge>,
}

impl AgentExecutor {
    pub fn new(bridge: Arc<dyn AgentBridge>) -> Self {
        Self { bridge }
    }

    /// Config errors surface as [`NodeError::Config`] before any bridge
    /// call; only bridge outcomes flow back as [`AgentError`].
    async fn run_op(
        &self,
        op: AgentOp,
        node: &Node,
        input: &Value,
    ) -> Result<Result<Value, AgentError>, NodeError> {
        Ok(match op {
            AgentOp::ExecuteTask => {
                let task = node.config.get("task").cloned().unwrap_or_else(|| input.clone());
                self.bridge.execute_task(&task).await
            }
            AgentOp::Query => {
                let template = node
                    .config
                    .get("prompt")
                    .and_then(Value::as_str)
                    .unwrap_or("{{ prompt }}");
                let prompt = render_template(template, input);
                self.bridge.query(&prompt, input).await
            }
            AgentOp::StoreMemory => {
                let key = config_str(node, "key")?;
                self.bridge
                    .store_memory(key, input)
                    .await
                    .map(|()| json!({ "stored": true, "key": key }))
            }
            AgentOp::RetrieveMemory => {
                let key = config_str(node, "key")?;
                self.bridge
                    .retrieve_memory(key)
                    .await
                    .map(|records| json!({ "records": records }))
            }
            AgentOp::MakeDecision => {
                let question = config_str(node, "question")?;
                let options = node.config.get("options").cloned().unwrap_or(Value::Null);
                self.bridge.make_decision(question, &options).await
            }
            AgentOp::ProcessLearning => self.bridge.process_learning(input).await,
        })
    }
}

#[async_trait]
impl NodeExecutor for AgentExecutor {
    async fn execute(
        &self,
        node: &Node,
        input: &Value,
        _ctx: &ExecContext,
    ) -> Result<Value, NodeError> {
        let op = match node.kind {
            NodeKind::Agent(op) => op,
            _ => return Err(NodeError::Config("not an agent node".into())),
        };
        match self.run_op(op, node, input).await? {
            Ok(result) => Ok(result),
            Err(AgentError::Unreachable(reason)) => {
                tracing::warn!(node_id = %node.id, %reason, "agent bridge unreachable, using fallback");
                Ok(self.bridge.fallback_response(op.name()))
            }
            Err(e) => Err(NodeError::Agent(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executors::tests::{node, registry};
    use crate::executors::NodeDispatch;

    async fn run(op: AgentOp, config: Value, input: Value) -> Result<Value, NodeError> {
        registry()
            .dispatch(
                &node("a", NodeKind::Agent(op), config),
                &input,
                &ExecContext::detached(),
            )
            .await
    }

    #[tokio::test]
    async fn test_unreachable_bridge_yields_fallback() {
        let out = run(AgentOp::ExecuteTask, json!({}), json!({"goal": "x"}))
            .await
            .unwrap();
        assert_eq!(out["status"], "fallback");
        assert_eq!(out["operation"], "execute_task");
        assert!(out["result"].is_null());
    }

    #[tokio::test]
    async fn test_query_falls_back_too() {
        let out = run(AgentOp::Query, json!({"prompt": "hi {{ name }}"}), json!({"name": "ada"}))
            .await
            .unwrap();
        assert_eq!(out["operation"], "query");
    }

    #[tokio::test]
    async fn test_store_memory_without_key_is_config_error() {
        // Config mistakes surface even when the bridge is down; the
        // rejection happens before the call leaves the executor.
        let err = run(AgentOp::StoreMemory, json!({}), json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::Config(_)));
    }
}
