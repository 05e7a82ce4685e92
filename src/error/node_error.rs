use thiserror::Error;

/// Node-level errors. Contained at the node boundary: recorded in the
/// node's log and escalated to a run failure only for critical nodes with
/// exhausted retries.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Unsafe expression: {0}")]
    UnsafeExpression(String),
    #[error("Security error: {0}")]
    Security(String),
    #[error("Transform error: {0}")]
    Transform(String),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Agent bridge error: {0}")]
    Agent(String),
    #[error("Execution error: {0}")]
    Execution(String),
    #[error("Timeout: node execution exceeded time limit")]
    Timeout,
}

impl NodeError {
    /// Stable class name for node logs and structured output.
    pub fn class(&self) -> &'static str {
        match self {
            NodeError::Config(_) => "config",
            NodeError::UnsafeExpression(_) => "unsafe_expression",
            NodeError::Security(_) => "security",
            NodeError::Transform(_) => "transform",
            NodeError::Http(_) => "http",
            NodeError::Agent(_) => "agent",
            NodeError::Execution(_) => "execution",
            NodeError::Timeout => "timeout",
        }
    }

    /// Classify for the retry policy. Structured variants short-circuit;
    /// everything else falls back to message-keyword classification.
    pub fn retryability(&self) -> Retryability {
        match self {
            NodeError::Config(_) | NodeError::UnsafeExpression(_) | NodeError::Security(_) => {
                Retryability::NonRetryable
            }
            NodeError::Timeout => Retryability::Retryable,
            NodeError::Transform(m)
            | NodeError::Http(m)
            | NodeError::Agent(m)
            | NodeError::Execution(m) => classify_message(m),
        }
    }
}

impl From<serde_json::Error> for NodeError {
    fn from(e: serde_json::Error) -> Self {
        NodeError::Config(e.to_string())
    }
}

/// Whether a failed attempt may be redispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retryability {
    Retryable,
    NonRetryable,
}

const NON_RETRYABLE_KEYWORDS: &[&str] = &[
    "configuration",
    "permission",
    "denied",
    "validation",
    "invalid",
    "not found",
    "unauthorized",
    "forbidden",
];

const RETRYABLE_KEYWORDS: &[&str] = &[
    "timeout",
    "timed out",
    "connection",
    "network",
    "rate limit",
    "temporar",
    "unavailable",
    "reset",
];

/// Keyword classification of an error message. Non-retryable keywords win
/// over retryable ones; unclassified messages default to retryable.
pub fn classify_message(message: &str) -> Retryability {
    let lower = message.to_lowercase();
    if NON_RETRYABLE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Retryability::NonRetryable;
    }
    if RETRYABLE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Retryability::Retryable;
    }
    Retryability::Retryable
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_security_is_non_retryable() {
        let e = NodeError::Security("blocked IP".into());
        assert_eq!(e.retryability(), Retryability::NonRetryable);
    }

    #[test]
    fn test_unsafe_expression_is_non_retryable() {
        let e = NodeError::UnsafeExpression("call".into());
        assert_eq!(e.retryability(), Retryability::NonRetryable);
    }

    #[test]
    fn test_timeout_is_retryable() {
        assert_eq!(NodeError::Timeout.retryability(), Retryability::Retryable);
    }

    #[test]
    fn test_classify_non_retryable_keywords() {
        assert_eq!(classify_message("permission denied"), Retryability::NonRetryable);
        assert_eq!(classify_message("Validation failed"), Retryability::NonRetryable);
        assert_eq!(classify_message("resource not found"), Retryability::NonRetryable);
        assert_eq!(classify_message("bad configuration"), Retryability::NonRetryable);
    }

    #[test]
    fn test_classify_retryable_keywords() {
        assert_eq!(classify_message("connection refused"), Retryability::Retryable);
        assert_eq!(classify_message("rate limit exceeded"), Retryability::Retryable);
        assert_eq!(classify_message("temporarily unavailable"), Retryability::Retryable);
    }

    #[test]
    fn test_classify_unknown_defaults_to_retryable() {
        assert_eq!(classify_message("something odd happened"), Retryability::Retryable);
    }

    #[test]
    fn test_non_retryable_wins_over_retryable() {
        // Both keyword classes present: forbid retry.
        assert_eq!(
            classify_message("connection forbidden by policy"),
            Retryability::NonRetryable
        );
    }

    #[test]
    fn test_class_names() {
        assert_eq!(NodeError::Timeout.class(), "timeout");
        assert_eq!(NodeError::Security("x".into()).class(), "security");
        assert_eq!(NodeError::Transform("x".into()).class(), "transform");
    }
}
