//! Control family: branching, iteration, delays, and error absorption.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use crate::error::NodeError;
use crate::expr;
use crate::model::{ControlKind, Node, NodeKind};
use crate::transform::{self, lookup_path};

use super::{config_str, ExecContext, NodeExecutor};

const MAX_DELAY_SECS: u64 = 300;

pub struct ControlExecutor;

impl ControlExecutor {
    fn branch(node: &Node, input: &Value) -> Result<Value, NodeError> {
        let condition = config_str(node, "condition")?;
        let result = expr::evaluate_condition(condition, input)?;
        Ok(json!({ "result": result, "value": input }))
    }

    /// Apply a transform spec to each item of a collection.
    fn iterate(node: &Node, input: &Value) -> Result<Value, NodeError> {
        let path = node
            .config
            .get("path")
            .and_then(Value::as_str)
            .unwrap_or("items");
        let spec = node
            .config
            .get("spec")
            .ok_or_else(|| NodeError::Config("loop requires config.spec".into()))?;
        let parsed = transform::TransformSpec::parse(spec)?;

        let items = match lookup_path(input, path) {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            _ => {
                return Err(NodeError::Execution(format!(
                    "expected an array at '{path}'"
                )))
            }
        };
        let mapped = items
            .iter()
            .map(|item| transform::apply_parsed(&parsed, item))
            .collect::<Result<Vec<Value>, NodeError>>()?;
        Ok(json!({ "items": mapped }))
    }

    async fn delay(node: &Node, input: &Value, ctx: &ExecContext) -> Result<Value, NodeError> {
        let requested = node
            .config
            .get("seconds")
            .and_then(Value::as_u64)
            .ok_or_else(|| NodeError::Config("delay requires config.seconds".into()))?;
        let seconds = requested.min(MAX_DELAY_SECS);

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(seconds)) => {
                Ok(json!({ "delayed_secs": seconds, "value": input }))
            }
            _ = ctx.cancellation.cancelled() => {
                Err(NodeError::Execution("delay interrupted by cancellation".into()))
            }
        }
    }
}

#[async_trait]
impl NodeExecutor for ControlExecutor {
    async fn execute(
        &self,
        node: &Node,
        input: &Value,
        ctx: &ExecContext,
    ) -> Result<Value, NodeError> {
        let kind = match node.kind {
            NodeKind::Control(kind) => kind,
            _ => return Err(NodeError::Config("not a control node".into())),
        };
        match kind {
            ControlKind::Branch => Self::branch(node, input),
            ControlKind::Loop => Self::iterate(node, input),
            ControlKind::Delay => Self::delay(node, input, ctx).await,
            ControlKind::ErrorHandler => {
                // Downstream of a failed non-critical node this sees the
                // empty placeholder and still produces a handled record.
                Ok(json!({ "handled": true, "value": input }))
            }
        }
    }
}
