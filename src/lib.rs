//! # Flowgrid — a visual workflow automation engine
//!
//! `flowgrid` executes directed-acyclic workflow graphs: typed nodes wired
//! by conditional, transforming connections, run under per-node and
//! per-run budgets with classified retry. It supports:
//!
//! - **Node families**: sources (documents, spreadsheets, APIs, files,
//!   webhooks), processors (model calls, reshaping, filter/aggregate/
//!   split/merge, restricted snippets), outputs (webhooks, email, chat,
//!   database and file writes), control (branch, loop, delay, error
//!   handler), and agent operations bridged to an external AI service.
//! - **Data flow**: multi-predecessor input assembly with declarative
//!   transforms and conditional edges evaluated by a security-restricted
//!   expression engine.
//! - **Resilience**: keyword-classified retry with exponential backoff
//!   and jitter, critical/non-critical failure containment, cooperative
//!   cancellation, and run deadlines.
//! - **Security**: an SSRF guard on every outbound URL (resolved at
//!   dispatch time) and an AES-256-GCM credential vault.
//! - **Audit**: per-run execution records with per-node logs and atomic
//!   workflow statistics.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use flowgrid::{EngineConfig, Flowgrid, TriggerMeta};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (flowgrid, store) = Flowgrid::in_memory(EngineConfig::default()).unwrap();
//!     // ... seed `store` with a workflow, its nodes, and connections ...
//!     let id = flowgrid
//!         .execute("my-workflow", json!({"seed": 1}), TriggerMeta::manual())
//!         .await
//!         .unwrap();
//!     let execution = flowgrid.get_execution(&id).await.unwrap();
//!     println!("{:?}", execution.status);
//! }
//! ```

pub mod agent;
pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod executors;
pub mod expr;
pub mod graph;
pub mod model;
pub mod recorder;
pub mod security;
pub mod store;
pub mod transform;

pub use api::Flowgrid;
pub use config::EngineConfig;
pub use engine::ExecutionEngine;
pub use error::{NodeError, Retryability, RunError};
pub use model::{
    Connection, Execution, ExecutionStatus, Node, NodeKind, RetryPolicy, Trigger, TriggerMeta,
    Workflow, WorkflowStatus,
};
pub use security::{CredentialVault, GuardPolicy, UrlGuard};
