//! Output family: steps that push run results out of the engine.
//!
//! Webhook, ApiCall, and ChatMessage deliver over guarded HTTP. Email,
//! database, file, and notification outputs produce a structured delivery
//! record for the owning integration's queue; the engine does not speak
//! SMTP or hold database handles itself.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::NodeError;
use crate::model::{Node, NodeKind, OutputKind};
use crate::security::{CredentialVault, UrlGuard};
use crate::transform::render_template;

use super::{config_str, ExecContext, NodeExecutor};

pub struct OutputExecutor {
    guard: UrlGuard,
    client: reqwest::Client,
    vault: Option<Arc<CredentialVault>>,
}

impl OutputExecutor {
    pub fn new(
        guard: UrlGuard,
        client: reqwest::Client,
        vault: Option<Arc<CredentialVault>>,
    ) -> Self {
        Self {
            guard,
            client,
            vault,
        }
    }

    async fn deliver_http(&self, node: &Node, input: &Value) -> Result<Value, NodeError> {
        let url_template = config_str(node, "url")?;
        let url = render_template(url_template, input);
        let url = self.guard.validate(&url).await?;

        let body = match node.config.get("body") {
            Some(Value::String(template)) => {
                let rendered = render_template(template, input);
                serde_json::from_str::<Value>(&rendered).unwrap_or(Value::String(rendered))
            }
            Some(other) => other.clone(),
            None => input.clone(),
        };

        let mut request = self.client.post(url).json(&body);
        if let Some(Value::Object(map)) = node.config.get("headers") {
            for (name, value) in map {
                if let Some(v) = value.as_str() {
                    request = request.header(name, v);
                }
            }
        }
        if let Some(token) = self.bearer_token(node)? {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| NodeError::Http(format!("delivery failed: {e}")))?;
        let status = response.status().as_u16();
        if status >= 400 {
            return Err(NodeError::Http(format!("delivery target returned {status}")));
        }
        Ok(json!({ "delivered": true, "status": status }))
    }

    fn bearer_token(&self, node: &Node) -> Result<Option<String>, NodeError> {
        let Some(Value::Object(raw)) = node.config.get("credentials") else {
            return Ok(None);
        };
        let bundle: HashMap<String, String> = raw
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect();
        let opened = match &self.vault {
            Some(vault) => vault
                .open_bundle(&bundle)
                .map_err(|e| NodeError::Config(format!("credential bundle: {e}")))?,
            None => bundle,
        };
        Ok(opened
            .get("token")
            .or_else(|| opened.get("api_key"))
            .cloned())
    }

    /// Delivery record handed to the integration that owns the channel.
    fn queued(node: &Node, channel: &str, input: &Value, fields: &[&str]) -> Result<Value, NodeError> {
        let mut record = json!({
            "queued": true,
            "channel": channel,
            "queued_at": Utc::now().to_rfc3339(),
            "payload": input,
        });
        for field in fields {
            let template = config_str(node, field)?;
            record[*field] = Value::String(render_template(template, input));
        }
        Ok(record)
    }
}

#[async_trait]
impl NodeExecutor for OutputExecutor {
    async fn execute(
        &self,
        node: &Node,
        input: &Value,
        _ctx: &ExecContext,
    ) -> Result<Value, NodeError> {
        let kind = match node.kind {
            NodeKind::Output(kind) => kind,
            _ => return Err(NodeError::Config("not an output node".into())),
        };
        match kind {
            OutputKind::Webhook | OutputKind::ApiCall | OutputKind::ChatMessage => {
                self.deliver_http(node, input).await
            }
            OutputKind::Email => Self::queued(node, "email", input, &["to", "subject"]),
            OutputKind::DatabaseWrite => Self::queued(node, "database", input, &["table"]),
            OutputKind::FileWrite => Self::queued(node, "file", input, &["path"]),
            OutputKind::Notification => Self::queued(node, "notification", input, &["message"]),
        }
    }
}
