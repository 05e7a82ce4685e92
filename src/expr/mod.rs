//! Security-restricted expression evaluator.
//!
//! Conditions on connections and branch nodes are parsed into a closed
//! syntax tree and walked; the parser admits nothing but comparisons,
//! `and`/`or`, `in`, attribute/index access rooted at the single bound
//! variable `payload`, literals, and parentheses. Any other construct
//! fails closed with [`NodeError::UnsafeExpression`]. This is a hard
//! security boundary: there is no general-purpose fallback path.

mod eval;
mod lexer;
mod parser;

pub use eval::{evaluate_parsed, truthy};
pub use parser::{parse, CmpOp, Expr, PathSeg};

use serde_json::Value;

use crate::error::NodeError;

/// Parse and evaluate an expression against a payload, returning the
/// resulting value.
pub fn evaluate(source: &str, payload: &Value) -> Result<Value, NodeError> {
    let expr = parse(source)?;
    Ok(evaluate_parsed(&expr, payload))
}

/// Parse and evaluate an expression as a boolean condition.
pub fn evaluate_condition(source: &str, payload: &Value) -> Result<bool, NodeError> {
    Ok(truthy(&evaluate(source, payload)?))
}
