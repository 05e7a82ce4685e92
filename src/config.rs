//! Engine configuration, deserialized from the embedding application's
//! settings. Every field has a working default so `EngineConfig::default()`
//! is a runnable posture.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::security::GuardPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default run deadline, overridable per workflow.
    pub run_timeout_secs: u64,
    /// Default per-node budget, overridable per node.
    pub node_timeout_secs: u64,
    /// Timeout for each outbound HTTP request issued by executors.
    pub http_timeout_secs: u64,
    pub guard: GuardPolicy,
    /// Base64-encoded 32-byte AES key for the credential vault. Absent
    /// means credentials pass through unsealed.
    pub vault_key: Option<String>,
    /// Base URL of the agent bridge service. Absent means agent nodes
    /// resolve to the fallback response.
    pub agent_endpoint: Option<String>,
    pub agent_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            run_timeout_secs: 300,
            node_timeout_secs: 30,
            http_timeout_secs: 30,
            guard: GuardPolicy::default(),
            vault_key: None,
            agent_endpoint: None,
            agent_timeout_secs: 30,
        }
    }
}

impl EngineConfig {
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    pub fn node_timeout(&self) -> Duration {
        Duration::from_secs(self.node_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn agent_timeout(&self) -> Duration {
        Duration::from_secs(self.agent_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_are_runnable() {
        let config = EngineConfig::default();
        assert_eq!(config.run_timeout_secs, 300);
        assert!(config.guard.block_metadata);
        assert!(config.vault_key.is_none());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: EngineConfig = serde_json::from_value(json!({
            "run_timeout_secs": 60,
            "agent_endpoint": "https://agent.internal"
        }))
        .unwrap();
        assert_eq!(config.run_timeout_secs, 60);
        assert_eq!(config.node_timeout_secs, 30);
        assert_eq!(config.agent_endpoint.as_deref(), Some("https://agent.internal"));
    }
}
