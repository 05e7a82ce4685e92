//! Agent Bridge: the external AI-agent service, consumed as an opaque,
//! independently-timed request/response collaborator. The agent's own
//! reasoning and memory live behind this seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

use crate::security::UrlGuard;

#[derive(Debug, Error)]
pub enum AgentError {
    /// The bridge could not be reached at all; callers substitute the
    /// defined fallback response.
    #[error("Agent bridge unreachable: {0}")]
    Unreachable(String),
    #[error("Agent bridge rejected request: {0}")]
    Rejected(String),
    #[error("Agent bridge error: {0}")]
    Service(String),
}

/// One memory record as the bridge reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub key: String,
    pub value: Value,
    #[serde(default)]
    pub score: Option<f64>,
}

#[async_trait]
pub trait AgentBridge: Send + Sync {
    async fn execute_task(&self, task: &Value) -> Result<Value, AgentError>;

    async fn query(&self, prompt: &str, context: &Value) -> Result<Value, AgentError>;

    async fn store_memory(&self, key: &str, value: &Value) -> Result<(), AgentError>;

    async fn retrieve_memory(&self, key: &str) -> Result<Vec<MemoryRecord>, AgentError>;

    async fn make_decision(&self, question: &str, options: &Value) -> Result<Value, AgentError>;

    async fn process_learning(&self, feedback: &Value) -> Result<Value, AgentError>;

    /// The defined response substituted when the bridge is unreachable.
    fn fallback_response(&self, operation: &str) -> Value {
        json!({
            "status": "fallback",
            "operation": operation,
            "result": null,
            "reason": "agent bridge unreachable",
        })
    }
}

/// HTTP implementation posting JSON operations to a configured endpoint.
/// The endpoint passes the URL guard on every call and the request carries
/// its own timeout, independent of node budgets.
pub struct HttpAgentBridge {
    endpoint: String,
    guard: UrlGuard,
    client: reqwest::Client,
}

impl HttpAgentBridge {
    pub fn new(endpoint: String, guard: UrlGuard, timeout: Duration) -> Result<Self, AgentError> {
        let client = guard
            .guarded_client(timeout)
            .map_err(|e| AgentError::Service(e.to_string()))?;
        Ok(Self {
            endpoint,
            guard,
            client,
        })
    }

    async fn call(&self, operation: &str, body: Value) -> Result<Value, AgentError> {
        self.guard
            .validate(&self.endpoint)
            .await
            .map_err(|e| AgentError::Rejected(e.to_string()))?;

        let url = format!("{}/{operation}", self.endpoint.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    AgentError::Unreachable(e.to_string())
                } else {
                    AgentError::Service(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::Service(format!(
                "agent bridge returned {status}"
            )));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| AgentError::Service(format!("malformed bridge response: {e}")))
    }
}

#[async_trait]
impl AgentBridge for HttpAgentBridge {
    async fn execute_task(&self, task: &Value) -> Result<Value, AgentError> {
        self.call("execute-task", json!({ "task": task })).await
    }

    async fn query(&self, prompt: &str, context: &Value) -> Result<Value, AgentError> {
        self.call("query", json!({ "prompt": prompt, "context": context }))
            .await
    }

    async fn store_memory(&self, key: &str, value: &Value) -> Result<(), AgentError> {
        self.call("memory/store", json!({ "key": key, "value": value }))
            .await
            .map(|_| ())
    }

    async fn retrieve_memory(&self, key: &str) -> Result<Vec<MemoryRecord>, AgentError> {
        let result = self.call("memory/retrieve", json!({ "key": key })).await?;
        serde_json::from_value(result.get("records").cloned().unwrap_or(json!([])))
            .map_err(|e| AgentError::Service(format!("malformed memory records: {e}")))
    }

    async fn make_decision(&self, question: &str, options: &Value) -> Result<Value, AgentError> {
        self.call(
            "decide",
            json!({ "question": question, "options": options }),
        )
        .await
    }

    async fn process_learning(&self, feedback: &Value) -> Result<Value, AgentError> {
        self.call("learn", json!({ "feedback": feedback })).await
    }
}

/// Bridge stand-in for deployments without an agent service. Every
/// operation reports unreachable, so agent nodes resolve to the fallback
/// response.
pub struct UnavailableAgentBridge;

#[async_trait]
impl AgentBridge for UnavailableAgentBridge {
    async fn execute_task(&self, _task: &Value) -> Result<Value, AgentError> {
        Err(AgentError::Unreachable("no agent bridge configured".into()))
    }

    async fn query(&self, _prompt: &str, _context: &Value) -> Result<Value, AgentError> {
        Err(AgentError::Unreachable("no agent bridge configured".into()))
    }

    async fn store_memory(&self, _key: &str, _value: &Value) -> Result<(), AgentError> {
        Err(AgentError::Unreachable("no agent bridge configured".into()))
    }

    async fn retrieve_memory(&self, _key: &str) -> Result<Vec<MemoryRecord>, AgentError> {
        Err(AgentError::Unreachable("no agent bridge configured".into()))
    }

    async fn make_decision(&self, _question: &str, _options: &Value) -> Result<Value, AgentError> {
        Err(AgentError::Unreachable("no agent bridge configured".into()))
    }

    async fn process_learning(&self, _feedback: &Value) -> Result<Value, AgentError> {
        Err(AgentError::Unreachable("no agent bridge configured".into()))
    }
}
