//! Request types for the agent protocol.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Metadata key carrying the credential.
pub const AUTHORIZATION_KEY: &str = "authorization";

/// A remote procedure call from a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Fully-qualified method (e.g., "/runixo.AgentService/Ping").
    pub method: String,

    /// Call metadata; keys are matched case-insensitively.
    #[serde(default)]
    pub metadata: HashMap<String, String>,

    /// Method parameters as a JSON object.
    #[serde(default)]
    pub params: serde_json::Value,
}

impl RpcRequest {
    /// Create a request with no metadata or params.
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            metadata: HashMap::new(),
            params: serde_json::json!({}),
        }
    }

    /// Attach the `authorization` metadata value.
    pub fn with_authorization(mut self, value: impl Into<String>) -> Self {
        self.metadata
            .insert(AUTHORIZATION_KEY.to_string(), value.into());
        self
    }

    /// Set the params object.
    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }

    /// The credential from metadata, if any.
    pub fn authorization(&self) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(AUTHORIZATION_KEY))
            .map(|(_, value)| value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_lookup_ignores_key_case() {
        let mut request = RpcRequest::new("/runixo.AgentService/Ping");
        request
            .metadata
            .insert("Authorization".to_string(), "Bearer abc".to_string());
        assert_eq!(request.authorization(), Some("Bearer abc"));
    }

    #[test]
    fn test_missing_metadata_defaults() {
        let request: RpcRequest =
            serde_json::from_str(r#"{"method": "/runixo.AgentService/Ping"}"#).unwrap();
        assert!(request.metadata.is_empty());
        assert!(request.authorization().is_none());
        assert!(request.params.is_null());
    }

    #[test]
    fn test_builder() {
        let request = RpcRequest::new("/runixo.AgentService/Ping")
            .with_authorization("secret")
            .with_params(serde_json::json!({"k": 1}));
        assert_eq!(request.authorization(), Some("secret"));
        assert_eq!(request.params["k"], 1);
    }
}
