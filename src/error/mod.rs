//! Error types for the engine.
//!
//! Errors live at two levels: [`NodeError`] is contained at the node
//! boundary and recorded in that node's log; [`RunError`] fails the whole
//! execution. Retryability classification lives alongside [`NodeError`].

mod node_error;
mod run_error;

pub use node_error::{classify_message, NodeError, Retryability};
pub use run_error::RunError;
