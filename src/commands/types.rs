//! Command types: parameters, results, and execution context.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{AuthMethod, Grant, Identity};
use crate::error::{AgentError, ValidationErrorKind};

/// Wrapper around the request's params object.
#[derive(Debug, Clone)]
pub struct CommandParams {
    inner: serde_json::Value,
}

impl CommandParams {
    pub fn new(value: serde_json::Value) -> Self {
        Self { inner: value }
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.inner
    }

    /// Get a required string parameter.
    pub fn get_string(&self, key: &str) -> Result<String, AgentError> {
        self.get_optional_string(key)
            .ok_or_else(|| missing_parameter(key))
    }

    /// Get an optional string parameter.
    pub fn get_optional_string(&self, key: &str) -> Option<String> {
        self.inner
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }

    /// Require that a string parameter exists.
    pub fn require_string(&self, key: &str) -> Result<(), AgentError> {
        self.get_string(key).map(|_| ())
    }

    /// Reject a present parameter that is not a string.
    pub fn optional_string_type(&self, key: &str) -> Result<(), AgentError> {
        match self.inner.get(key) {
            None | Some(serde_json::Value::Null) | Some(serde_json::Value::String(_)) => Ok(()),
            Some(_) => Err(AgentError::Validation {
                kind: ValidationErrorKind::InvalidParameter {
                    param: key.to_string(),
                    message: "expected a string".to_string(),
                },
            }),
        }
    }
}

impl From<serde_json::Value> for CommandParams {
    fn from(value: serde_json::Value) -> Self {
        Self::new(value)
    }
}

fn missing_parameter(key: &str) -> AgentError {
    AgentError::Validation {
        kind: ValidationErrorKind::MissingParameter {
            param: key.to_string(),
        },
    }
}

/// Result of command execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl CommandResult {
    /// Create a success result with data.
    pub fn success(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error_code: None,
            error_message: None,
        }
    }

    /// Create a failure result.
    pub fn failure(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error_code: Some(code.into()),
            error_message: Some(message.into()),
        }
    }
}

/// Who is calling and how they got through the checkpoint.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub request_id: Uuid,
    pub identity: Identity,
    pub via: AuthMethod,
    /// Unix seconds when the request was received.
    pub timestamp: i64,
    pub method: String,
}

impl ExecutionContext {
    /// Build the context for an authorized call.
    pub fn new(request_id: Uuid, grant: Grant, timestamp: i64, method: String) -> Self {
        Self {
            request_id,
            identity: grant.identity,
            via: grant.via,
            timestamp,
            method,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_params_get_string() {
        let params = CommandParams::new(serde_json::json!({
            "token": "abc",
            "count": 42
        }));

        assert_eq!(params.get_string("token").unwrap(), "abc");
        assert!(params.get_string("count").is_err());
        assert!(matches!(
            params.get_string("missing"),
            Err(AgentError::Validation {
                kind: ValidationErrorKind::MissingParameter { .. }
            })
        ));
    }

    #[test]
    fn test_optional_string_type() {
        let params = CommandParams::new(serde_json::json!({"a": "x", "b": 1, "c": null}));
        assert!(params.optional_string_type("a").is_ok());
        assert!(params.optional_string_type("c").is_ok());
        assert!(params.optional_string_type("missing").is_ok());
        assert!(params.optional_string_type("b").is_err());
    }

    #[test]
    fn test_params_on_null_value() {
        let params = CommandParams::from(serde_json::Value::Null);
        assert_eq!(params.get_optional_string("token"), None);
    }

    #[test]
    fn test_command_result_failure() {
        let result = CommandResult::failure("ERR_CODE", "Something failed");
        assert!(!result.success);
        assert!(result.data.is_none());
        assert_eq!(result.error_code, Some("ERR_CODE".to_string()));
    }

    #[test]
    fn test_context_from_grant() {
        let grant = Grant {
            identity: Identity::new("10.0.0.1"),
            via: AuthMethod::Session,
        };
        let ctx = ExecutionContext::new(Uuid::nil(), grant, 1_700_000_000, "/m".to_string());
        assert_eq!(ctx.identity.as_str(), "10.0.0.1");
        assert_eq!(ctx.via, AuthMethod::Session);
    }
}
