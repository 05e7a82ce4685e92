//! Declarative, side-effect-free payload reshaping.
//!
//! Transform specs travel as raw JSON on connections and are parsed at
//! apply time: a malformed or unknown spec yields [`NodeError::Transform`],
//! which the engine turns into a dropped contribution with a warning —
//! never a run abort.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;

use crate::error::NodeError;

/// Parsed transform spec.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformSpec {
    Identity,
    /// Path projection with optional field selection.
    Path {
        path: String,
        #[serde(default)]
        fields: Option<Vec<String>>,
    },
    /// String templating: `{{ a.b[0] }}` placeholders resolved against
    /// the payload.
    Template { template: String },
}

impl TransformSpec {
    pub fn parse(raw: &Value) -> Result<Self, NodeError> {
        serde_json::from_value(raw.clone())
            .map_err(|e| NodeError::Transform(format!("malformed transform spec: {e}")))
    }
}

/// Apply a raw transform spec to a payload. Pure and deterministic.
pub fn apply(raw_spec: &Value, payload: &Value) -> Result<Value, NodeError> {
    let spec = TransformSpec::parse(raw_spec)?;
    apply_parsed(&spec, payload)
}

pub fn apply_parsed(spec: &TransformSpec, payload: &Value) -> Result<Value, NodeError> {
    match spec {
        TransformSpec::Identity => Ok(payload.clone()),
        TransformSpec::Path { path, fields } => {
            let value = lookup_path(payload, path);
            Ok(match fields {
                Some(keys) => project_fields(&value, keys),
                None => value,
            })
        }
        TransformSpec::Template { template } => {
            Ok(Value::String(render_template(template, payload)))
        }
    }
}

/// Resolve a dot/index path like `a.b[0].c` against a payload. A missing
/// step yields `null` for the leaf, not an error.
pub fn lookup_path(payload: &Value, path: &str) -> Value {
    if path.is_empty() {
        return payload.clone();
    }
    let mut current = payload;
    for raw_seg in path.split('.') {
        // Each dotted segment may carry trailing [i] index accesses.
        let (key, indexes) = split_indexes(raw_seg);
        if !key.is_empty() {
            current = match current.get(key) {
                Some(v) => v,
                None => return Value::Null,
            };
        }
        for idx in indexes {
            current = match current.get(idx) {
                Some(v) => v,
                None => return Value::Null,
            };
        }
    }
    current.clone()
}

fn split_indexes(segment: &str) -> (&str, Vec<usize>) {
    match segment.find('[') {
        None => (segment, Vec::new()),
        Some(pos) => {
            let key = &segment[..pos];
            let indexes = segment[pos..]
                .split(['[', ']'])
                .filter(|s| !s.is_empty())
                .filter_map(|s| s.parse::<usize>().ok())
                .collect();
            (key, indexes)
        }
    }
}

/// Project an object (or each object of an array) down to the listed keys.
fn project_fields(value: &Value, keys: &[String]) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for key in keys {
                if let Some(v) = map.get(key) {
                    out.insert(key.clone(), v.clone());
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| project_fields(item, keys)).collect())
        }
        other => other.clone(),
    }
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").expect("static regex"))
}

/// Substitute `{{ path }}` placeholders with values resolved against the
/// payload. Unresolvable paths render as the empty string; non-string
/// values render as compact JSON.
pub fn render_template(template: &str, payload: &Value) -> String {
    placeholder_regex()
        .replace_all(template, |caps: &regex::Captures<'_>| {
            let value = lookup_path(payload, caps[1].trim());
            match value {
                Value::Null => String::new(),
                Value::String(s) => s,
                other => other.to_string(),
            }
        })
        .into_owned()
}
