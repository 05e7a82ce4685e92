//! Node executor registry: closed tagged-variant dispatch over the five
//! node families. Extension is a build-time addition — a new variant in
//! [`NodeKind`](crate::model::NodeKind) plus a matching arm here; there is
//! no runtime registration table and no reflection.

mod agent;
mod control;
mod output;
mod processor;
mod source;

pub use agent::AgentExecutor;
pub use control::ControlExecutor;
pub use output::OutputExecutor;
pub use processor::ProcessorExecutor;
pub use source::SourceExecutor;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::agent::AgentBridge;
use crate::error::NodeError;
use crate::model::{Node, NodeKind};
use crate::security::{CredentialVault, UrlGuard};

/// Per-dispatch context handed to executors: the cooperative cancellation
/// flag for the owning run. Executors must check it inside their own
/// suspension points (sleeps, waits); network futures are bounded by the
/// engine's timeout wrapper instead.
#[derive(Clone)]
pub struct ExecContext {
    pub cancellation: CancellationToken,
}

impl ExecContext {
    pub fn detached() -> Self {
        Self {
            cancellation: CancellationToken::new(),
        }
    }
}

/// One executor family. Every executor receives the assembled input plus
/// the node (carrying its config) and returns the produced output or a
/// contained error.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    async fn execute(
        &self,
        node: &Node,
        input: &Value,
        ctx: &ExecContext,
    ) -> Result<Value, NodeError>;
}

/// The seam the execution engine dispatches through. Production uses
/// [`ExecutorRegistry`]; tests substitute scripted dispatchers.
#[async_trait]
pub trait NodeDispatch: Send + Sync {
    async fn dispatch(
        &self,
        node: &Node,
        input: &Value,
        ctx: &ExecContext,
    ) -> Result<Value, NodeError>;
}

/// Shared dependencies for the built-in executors.
pub struct ExecutorDeps {
    pub guard: UrlGuard,
    pub vault: Option<Arc<CredentialVault>>,
    pub bridge: Arc<dyn AgentBridge>,
    pub http_timeout: Duration,
}

pub struct ExecutorRegistry {
    source: SourceExecutor,
    processor: ProcessorExecutor,
    output: OutputExecutor,
    control: ControlExecutor,
    agent: AgentExecutor,
}

impl ExecutorRegistry {
    pub fn new(deps: ExecutorDeps) -> Result<Self, NodeError> {
        let client = deps.guard.guarded_client(deps.http_timeout)?;
        Ok(Self {
            source: SourceExecutor::new(deps.guard.clone(), client.clone(), deps.vault.clone()),
            processor: ProcessorExecutor::new(deps.bridge.clone()),
            output: OutputExecutor::new(deps.guard, client, deps.vault),
            control: ControlExecutor,
            agent: AgentExecutor::new(deps.bridge),
        })
    }
}

#[async_trait]
impl NodeDispatch for ExecutorRegistry {
    async fn dispatch(
        &self,
        node: &Node,
        input: &Value,
        ctx: &ExecContext,
    ) -> Result<Value, NodeError> {
        let executor: &dyn NodeExecutor = match node.kind {
            NodeKind::Source(_) => &self.source,
            NodeKind::Processor(_) => &self.processor,
            NodeKind::Output(_) => &self.output,
            NodeKind::Control(_) => &self.control,
            NodeKind::Agent(_) => &self.agent,
        };
        tracing::debug!(node_id = %node.id, family = node.kind.family(), "dispatching node");
        executor.execute(node, input, ctx).await
    }
}

/// Fetch a required string field from node config.
pub(crate) fn config_str<'a>(node: &'a Node, key: &str) -> Result<&'a str, NodeError> {
    node.config
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| {
            NodeError::Config(format!(
                "node '{}' missing required config field '{key}'",
                node.id
            ))
        })
}
