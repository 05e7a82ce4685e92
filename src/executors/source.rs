//! Source family: steps that bring data into a run.
//!
//! Api and UrlFetch perform live guarded HTTP. The document, spreadsheet,
//! database, and file variants surface data staged in node config by the
//! external integrations that own those stores; the webhook variant
//! surfaces the inbound payload the trigger already delivered.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::NodeError;
use crate::model::{Node, NodeKind, SourceKind};
use crate::security::{CredentialVault, UrlGuard};
use crate::transform::render_template;

use super::{config_str, ExecContext, NodeExecutor};

pub struct SourceExecutor {
    guard: UrlGuard,
    client: reqwest::Client,
    vault: Option<Arc<CredentialVault>>,
}

impl SourceExecutor {
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

    async fn fetch(&self, node: &Node, input: &Value) -> Result<Value, NodeError> {
        let url_template = config_str(node, "url")?;
        let url = render_template(url_template, input);
        let url = self.guard.validate(&url).await?;

        let method = node
            .config
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("GET")
            .to_uppercase();
        let mut request = match method.as_str() {
            "GET" => self.client.get(url),
            "POST" => self.client.post(url),
            other => {
                return Err(NodeError::Config(format!(
                    "unsupported source method: {other}"
                )))
            }
        };

        for (name, value) in self.request_headers(node)? {
            request = request.header(name, value);
        }
        if method == "POST" {
            if let Some(body) = node.config.get("body") {
                request = request.json(body);
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| NodeError::Http(format!("request failed: {e}")))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| NodeError::Http(format!("failed to read response body: {e}")))?;

        if status >= 400 {
            return Err(NodeError::Http(format!("upstream returned {status}")));
        }
        let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));
        Ok(json!({ "status": status, "body": body }))
    }

    /// Static headers plus vault-opened credentials from config.
    fn request_headers(&self, node: &Node) -> Result<Vec<(String, String)>, NodeError> {
        let mut headers: Vec<(String, String)> = Vec::new();
        if let Some(Value::Object(map)) = node.config.get("headers") {
            for (name, value) in map {
                if let Some(v) = value.as_str() {
                    headers.push((name.clone(), v.to_string()));
                }
            }
        }

        if let Some(Value::Object(raw)) = node.config.get("credentials") {
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
            if let Some(token) = opened.get("token").or_else(|| opened.get("api_key")) {
                headers.push(("Authorization".into(), format!("Bearer {token}")));
            }
        }
        Ok(headers)
    }

    /// Data staged in config by the owning integration.
    fn staged_data(node: &Node, kind: &str) -> Result<Value, NodeError> {
        node.config.get("data").cloned().ok_or_else(|| {
            NodeError::Config(format!(
                "{kind} source '{}' has no staged data; the owning integration must populate config.data",
                node.id
            ))
        })
    }
}

#[async_trait]
impl NodeExecutor for SourceExecutor {
    async fn execute(
        &self,
        node: &Node,
        input: &Value,
        _ctx: &ExecContext,
    ) -> Result<Value, NodeError> {
        let kind = match node.kind {
            NodeKind::Source(kind) => kind,
            _ => return Err(NodeError::Config("not a source node".into())),
        };
        match kind {
            SourceKind::Api | SourceKind::UrlFetch => self.fetch(node, input).await,
            SourceKind::Webhook => {
                // The trigger already delivered the payload as run input.
                Ok(input.clone())
            }
            SourceKind::Document => Self::staged_data(node, "document"),
            SourceKind::Spreadsheet => {
                let data = Self::staged_data(node, "spreadsheet")?;
                Ok(match data {
                    Value::Array(rows) => json!({ "rows": rows }),
                    other => other,
                })
            }
            SourceKind::Database => Self::staged_data(node, "database"),
            SourceKind::File => {
                let data = Self::staged_data(node, "file")?;
                let mut out = Map::new();
                out.insert("content".into(), data);
                if let Some(path) = node.config.get("path") {
                    out.insert("path".into(), path.clone());
                }
                Ok(Value::Object(out))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executors::tests::{node, registry};
    use crate::executors::NodeDispatch;
    use serde_json::json;

    #[tokio::test]
    async fn test_staged_document_source() {
        let registry = registry();
        let n = node(
            "doc",
            NodeKind::Source(SourceKind::Document),
            json!({"data": {"items": [1, 2]}}),
        );
        let out = registry
            .dispatch(&n, &json!({}), &ExecContext::detached())
            .await
            .unwrap();
        assert_eq!(out, json!({"items": [1, 2]}));
    }

    #[tokio::test]
    async fn test_staged_spreadsheet_wraps_rows() {
        let registry = registry();
        let n = node(
            "sheet",
            NodeKind::Source(SourceKind::Spreadsheet),
            json!({"data": [{"a": 1}]}),
        );
        let out = registry
            .dispatch(&n, &json!({}), &ExecContext::detached())
            .await
            .unwrap();
        assert_eq!(out, json!({"rows": [{"a": 1}]}));
    }

    #[tokio::test]
    async fn test_missing_staged_data_is_config_error() {
        let registry = registry();
        let n = node("db", NodeKind::Source(SourceKind::Database), json!({}));
        let err = registry
            .dispatch(&n, &json!({}), &ExecContext::detached())
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::Config(_)));
    }

    #[tokio::test]
    async fn test_webhook_source_passes_input_through() {
        let registry = registry();
        let n = node("hook", NodeKind::Source(SourceKind::Webhook), json!({}));
        let payload = json!({"event": "push"});
        let out = registry
            .dispatch(&n, &payload, &ExecContext::detached())
            .await
            .unwrap();
        assert_eq!(out, payload);
    }

    #[tokio::test]
    async fn test_fetch_blocked_target_is_security_error() {
        let registry = registry();
        let n = node(
            "api",
            NodeKind::Source(SourceKind::Api),
            json!({"url": "http://169.254.169.254/latest/meta-data/"}),
        );
        let err = registry
            .dispatch(&n, &json!({}), &ExecContext::detached())
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::Security(_)));
    }

    #[tokio::test]
    async fn test_fetch_url_is_templated_from_input() {
        let registry = registry();
        let n = node(
            "api",
            NodeKind::Source(SourceKind::Api),
            json!({"url": "http://localhost/{{ id }}"}),
        );
        // Template resolves before the guard runs; localhost is then rejected.
        let err = registry
            .dispatch(&n, &json!({"id": 7}), &ExecContext::detached())
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::Security(_)));
    }
}
