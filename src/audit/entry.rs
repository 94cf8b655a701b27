//! Audit entry types.

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::{AuthMethod, Identity};

use super::sanitize::sanitize_params;

/// One audited call.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    /// RFC 3339 timestamp.
    pub timestamp: String,
    pub request_id: Uuid,
    pub method: String,
    pub identity: String,
    /// How the call got through the checkpoint; absent when it did not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via: Option<AuthMethod>,
    /// Params with sensitive values redacted.
    pub params: serde_json::Value,
    pub outcome: AuditOutcome,
    pub duration_ms: u64,
}

impl AuditEntry {
    /// Start an entry stamped with the current time.
    pub fn new(
        request_id: Uuid,
        method: impl Into<String>,
        identity: &Identity,
        params: &serde_json::Value,
    ) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            request_id,
            method: method.into(),
            identity: identity.as_str().to_string(),
            via: None,
            params: sanitize_params(params),
            outcome: AuditOutcome::Success,
            duration_ms: 0,
        }
    }

    pub fn with_via(mut self, via: AuthMethod) -> Self {
        self.via = Some(via);
        self
    }

    /// Set the outcome and elapsed time.
    pub fn finish(mut self, outcome: AuditOutcome, duration_ms: u64) -> Self {
        self.outcome = outcome;
        self.duration_ms = duration_ms;
        self
    }
}

/// What happened to the call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuditOutcome {
    /// Authorized and executed.
    Success,
    /// Rejected at the checkpoint.
    Denied { error_code: String },
    /// Authorized but the command failed.
    Failure { error_code: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denied_entry_serialization() {
        let entry = AuditEntry::new(
            Uuid::nil(),
            "/runixo.AgentService/Ping",
            &Identity::new("10.0.0.9"),
            &serde_json::json!({}),
        )
        .finish(
            AuditOutcome::Denied {
                error_code: "UNAUTHENTICATED".to_string(),
            },
            3,
        );

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["outcome"]["status"], "denied");
        assert_eq!(json["outcome"]["error_code"], "UNAUTHENTICATED");
        assert_eq!(json["identity"], "10.0.0.9");
        assert_eq!(json["duration_ms"], 3);
        assert!(json.get("via").is_none());
    }

    #[test]
    fn test_token_param_is_redacted() {
        let entry = AuditEntry::new(
            Uuid::nil(),
            "/runixo.AgentService/Authenticate",
            &Identity::new("10.0.0.9"),
            &serde_json::json!({"token": "correct-token"}),
        )
        .with_via(AuthMethod::Bootstrap);

        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("correct-token"));
        assert!(json.contains("\"via\":\"bootstrap\""));
        assert!(json.contains("\"status\":\"success\""));
    }
}
