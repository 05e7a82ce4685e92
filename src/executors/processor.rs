//! Processor family: pure-ish reshaping of in-flight payloads, plus the
//! model-call step that rides the agent bridge.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::agent::{AgentBridge, AgentError};
use crate::error::NodeError;
use crate::expr;
use crate::model::{Node, NodeKind, ProcessorKind};
use crate::transform::{self, lookup_path, render_template};

use super::{config_str, ExecContext, NodeExecutor};

pub struct ProcessorExecutor {
    bridge: Arc<dyn AgentBridge>,
}

impl ProcessorExecutor {
    pub fn new(bridge: Arc<dyn AgentBridge>) -> Self {
        Self { bridge }
    }

    async fn model_call(&self, node: &Node, input: &Value) -> Result<Value, NodeError> {
        let prompt_template = config_str(node, "prompt")?;
        let prompt = render_template(prompt_template, input);
        match self.bridge.query(&prompt, input).await {
            Ok(result) => Ok(result),
            Err(AgentError::Unreachable(_)) => Ok(self.bridge.fallback_response("query")),
            Err(e) => Err(NodeError::Agent(e.to_string())),
        }
    }

    fn collection_path(node: &Node) -> &str {
        node.config
            .get("path")
            .and_then(Value::as_str)
            .unwrap_or("items")
    }

    fn filter(node: &Node, input: &Value) -> Result<Value, NodeError> {
        let path = Self::collection_path(node);
        let condition = config_str(node, "condition")?;
        let parsed = expr::parse(condition)?;
        let items = as_array(&lookup_path(input, path), path)?;
        let kept: Vec<Value> = items
            .into_iter()
            .filter(|item| expr::truthy(&expr::evaluate_parsed(&parsed, item)))
            .collect();
        Ok(json!({ "items": kept }))
    }

    fn aggregate(node: &Node, input: &Value) -> Result<Value, NodeError> {
        let path = Self::collection_path(node);
        let op = node
            .config
            .get("op")
            .and_then(Value::as_str)
            .unwrap_or("count");
        let items = as_array(&lookup_path(input, path), path)?;

        if op == "count" {
            return Ok(json!({ "count": items.len() }));
        }

        let field = node.config.get("field").and_then(Value::as_str);
        let numbers: Vec<f64> = items
            .iter()
            .filter_map(|item| match field {
                Some(f) => lookup_path(item, f).as_f64(),
                None => item.as_f64(),
            })
            .collect();

        let result = match op {
            "sum" => numbers.iter().sum::<f64>(),
            "avg" => {
                if numbers.is_empty() {
                    0.0
                } else {
                    numbers.iter().sum::<f64>() / numbers.len() as f64
                }
            }
            "min" => numbers.iter().copied().fold(f64::INFINITY, f64::min),
            "max" => numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            other => {
                return Err(NodeError::Config(format!(
                    "unknown aggregate op: {other}"
                )))
            }
        };
        if !result.is_finite() {
            return Ok(json!({ op: null }));
        }
        Ok(json!({ op: result }))
    }

    fn split(node: &Node, input: &Value) -> Result<Value, NodeError> {
        let path = Self::collection_path(node);
        let size = node
            .config
            .get("size")
            .and_then(Value::as_u64)
            .unwrap_or(1)
            .max(1) as usize;
        let items = as_array(&lookup_path(input, path), path)?;
        let chunks: Vec<Value> = items
            .chunks(size)
            .map(|chunk| Value::Array(chunk.to_vec()))
            .collect();
        Ok(json!({ "chunks": chunks }))
    }

    /// Flatten the assembled input map: object values shallow-merge in
    /// key order, scalars stay keyed as-is.
    fn merge(input: &Value) -> Result<Value, NodeError> {
        let map = input.as_object().ok_or_else(|| {
            NodeError::Execution("merge expects an object input".into())
        })?;
        let mut out = Map::new();
        for (key, value) in map {
            match value {
                Value::Object(inner) => {
                    for (k, v) in inner {
                        out.insert(k.clone(), v.clone());
                    }
                }
                other => {
                    out.insert(key.clone(), other.clone());
                }
            }
        }
        Ok(Value::Object(out))
    }

    fn snippet(node: &Node, input: &Value) -> Result<Value, NodeError> {
        // Restricted expression only; the evaluator is the security
        // boundary and there is no interpreter behind it.
        let source = config_str(node, "expression")?;
        let result = expr::evaluate(source, input)?;
        Ok(json!({ "result": result }))
    }
}

fn as_array(value: &Value, path: &str) -> Result<Vec<Value>, NodeError> {
    match value {
        Value::Array(items) => Ok(items.clone()),
        Value::Null => Ok(Vec::new()),
        _ => Err(NodeError::Execution(format!(
            "expected an array at '{path}'"
        ))),
    }
}

#[async_trait]
impl NodeExecutor for ProcessorExecutor {
    async fn execute(
        &self,
        node: &Node,
        input: &Value,
        _ctx: &ExecContext,
    ) -> Result<Value, NodeError> {
        let kind = match node.kind {
            NodeKind::Processor(kind) => kind,
            _ => return Err(NodeError::Config("not a processor node".into())),
        };
        match kind {
            ProcessorKind::ModelCall => self.model_call(node, input).await,
            ProcessorKind::Reshape => {
                let spec = node
                    .config
                    .get("spec")
                    .ok_or_else(|| NodeError::Config("reshape requires config.spec".into()))?;
                transform::apply(spec, input)
            }
            ProcessorKind::Filter => Self::filter(node, input),
            ProcessorKind::Aggregate => Self::aggregate(node, input),
            ProcessorKind::Split => Self::split(node, input),
            ProcessorKind::Merge => Self::merge(input),
            ProcessorKind::Snippet => Self::snippet(node, input),
        }
    }
}
