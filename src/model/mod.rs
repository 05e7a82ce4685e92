//! Domain model: workflows, nodes, connections, executions.

mod connection;
mod execution;
mod node;
mod workflow;

pub use connection::Connection;
pub use execution::{Execution, ExecutionStatus, NodeLog, NodeRunStatus, TriggerMeta};
pub use node::{AgentOp, ControlKind, Node, NodeKind, OutputKind, ProcessorKind, SourceKind};
pub use workflow::{RetryPolicy, Trigger, Workflow, WorkflowStats, WorkflowStatus};
