//! Per-run graph view and topological ordering.

mod order;
mod store;

pub use order::topological_order;
pub use store::RunGraph;
