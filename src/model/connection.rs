use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A directed, optionally gated and transformed edge between two nodes.
///
/// Both endpoints must belong to the same workflow; the graph store
/// enforces this when a run is assembled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    #[serde(default)]
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default = "default_handle")]
    pub source_handle: String,
    #[serde(default = "default_handle")]
    pub target_handle: String,
    /// Boolean condition evaluated against the transformed contribution;
    /// false drops the contribution without error.
    #[serde(default)]
    pub condition: Option<String>,
    /// Raw transform spec, parsed at apply time so a malformed spec
    /// degrades to a dropped contribution rather than a load failure.
    #[serde(default)]
    pub transform: Option<Value>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_handle() -> String {
    "main".to_string()
}

fn default_true() -> bool {
    true
}

impl Connection {
    /// Minimal plain edge, used pervasively in tests.
    pub fn between(source: &str, target: &str) -> Self {
        Self {
            id: format!("{source}->{target}"),
            source: source.to_string(),
            target: target.to_string(),
            source_handle: default_handle(),
            target_handle: default_handle(),
            condition: None,
            transform: None,
            enabled: true,
        }
    }

    pub fn with_condition(mut self, expr: &str) -> Self {
        self.condition = Some(expr.to_string());
        self
    }

    pub fn with_transform(mut self, spec: Value) -> Self {
        self.transform = Some(spec);
        self
    }

    pub fn with_target_handle(mut self, handle: &str) -> Self {
        self.target_handle = handle.to_string();
        self
    }
}
