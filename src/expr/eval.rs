use serde_json::Value;

use super::parser::{CmpOp, Expr, PathSeg};

/// Walk the restricted AST against a payload. Total: missing paths and
/// type mismatches evaluate to `null`/`false` rather than erroring, so a
/// gate over absent data simply stays closed.
pub fn evaluate_parsed(expr: &Expr, payload: &Value) -> Value {
    match expr {
        Expr::Literal(v) => v.clone(),
        Expr::Path(segments) => resolve_path(payload, segments),
        Expr::Compare { op, left, right } => {
            let l = evaluate_parsed(left, payload);
            let r = evaluate_parsed(right, payload);
            Value::Bool(compare(*op, &l, &r))
        }
        Expr::In { left, right } => {
            let l = evaluate_parsed(left, payload);
            let r = evaluate_parsed(right, payload);
            Value::Bool(membership(&l, &r))
        }
        Expr::And(a, b) => {
            if !truthy(&evaluate_parsed(a, payload)) {
                return Value::Bool(false);
            }
            Value::Bool(truthy(&evaluate_parsed(b, payload)))
        }
        Expr::Or(a, b) => {
            if truthy(&evaluate_parsed(a, payload)) {
                return Value::Bool(true);
            }
            Value::Bool(truthy(&evaluate_parsed(b, payload)))
        }
    }
}

/// Truthiness of a payload value: null and false are false; numbers are
/// false at zero; strings, arrays, and objects are false when empty.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn resolve_path(payload: &Value, segments: &[PathSeg]) -> Value {
    let mut current = payload;
    for seg in segments {
        current = match seg {
            PathSeg::Key(key) => match current.get(key.as_str()) {
                Some(v) => v,
                None => return Value::Null,
            },
            PathSeg::Index(i) => match current.get(i) {
                Some(v) => v,
                None => return Value::Null,
            },
        };
    }
    current.clone()
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> bool {
    match op {
        CmpOp::Eq => values_equal(left, right),
        CmpOp::Ne => !values_equal(left, right),
        CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
            if let (Some(l), Some(r)) = (as_f64(left), as_f64(right)) {
                match op {
                    CmpOp::Lt => l < r,
                    CmpOp::Le => l <= r,
                    CmpOp::Gt => l > r,
                    CmpOp::Ge => l >= r,
                    _ => unreachable!(),
                }
            } else if let (Value::String(l), Value::String(r)) = (left, right) {
                match op {
                    CmpOp::Lt => l < r,
                    CmpOp::Le => l <= r,
                    CmpOp::Gt => l > r,
                    CmpOp::Ge => l >= r,
                    _ => unreachable!(),
                }
            } else {
                false
            }
        }
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    // Numeric equality ignores the integer/float distinction.
    if let (Some(l), Some(r)) = (as_f64(left), as_f64(right)) {
        return (l - r).abs() < f64::EPSILON;
    }
    left == right
}

/// Numbers and numeric strings both participate in numeric comparison.
fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn membership(needle: &Value, haystack: &Value) -> bool {
    match haystack {
        Value::Array(items) => items.iter().any(|item| values_equal(item, needle)),
        Value::String(s) => match needle {
            Value::String(sub) => s.contains(sub.as_str()),
            _ => false,
        },
        Value::Object(map) => match needle {
            Value::String(key) => map.contains_key(key),
            _ => false,
        },
        _ => false,
    }
}
