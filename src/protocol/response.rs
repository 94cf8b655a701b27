//! Response types for the agent protocol.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Error codes sent to clients.
pub mod codes {
    pub const UNAUTHENTICATED: &str = "UNAUTHENTICATED";
    pub const RESOURCE_EXHAUSTED: &str = "RESOURCE_EXHAUSTED";
    pub const UNKNOWN_METHOD: &str = "UNKNOWN_METHOD";
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const EXECUTION_ERROR: &str = "EXECUTION_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Replace detailed error messages with a fixed message per code.
///
/// Authentication failures in particular must never reveal which check
/// rejected the credential.
fn sanitize_error_message(code: &str) -> String {
    match code {
        codes::UNAUTHENTICATED => "Authentication failed".to_string(),
        codes::RESOURCE_EXHAUSTED => "Too many failed attempts, try again later".to_string(),
        codes::UNKNOWN_METHOD => "Unknown method".to_string(),
        codes::INVALID_REQUEST => "Malformed request".to_string(),
        codes::VALIDATION_ERROR => "Invalid request parameters".to_string(),
        codes::EXECUTION_ERROR => "Internal execution error".to_string(),
        codes::INTERNAL_ERROR => "Internal server error".to_string(),
        _ => "An error occurred".to_string(),
    }
}

/// A response from the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Whether the request succeeded.
    pub success: bool,

    /// Unique identifier for this request/response pair.
    pub request_id: Uuid,

    /// Response data on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Error details on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
}

/// Error details in a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "UNAUTHENTICATED", "RESOURCE_EXHAUSTED").
    pub code: String,

    /// Human-readable error message.
    pub message: String,

    /// Additional error details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl Response {
    /// Create a success response with a specific request ID.
    pub fn success_with_id(request_id: Uuid, data: serde_json::Value) -> Self {
        Self {
            success: true,
            request_id,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response with a specific request ID.
    ///
    /// The message is replaced by the fixed message for `code` before it
    /// leaves the process; the original is only logged at debug level.
    pub fn error_with_id(
        request_id: Uuid,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let code = code.into();
        let original_message = message.into();

        debug!(
            request_id = %request_id,
            code = %code,
            message = %original_message,
            "Error response (sanitized for client)"
        );

        Self {
            success: false,
            request_id,
            data: None,
            error: Some(ErrorResponse {
                message: sanitize_error_message(&code),
                code,
                details: None,
            }),
        }
    }

    /// Attach details to an error response.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        if let Some(error) = self.error.as_mut() {
            error.details = Some(details);
        }
        self
    }

    /// Error code, if this is an error response.
    pub fn error_code(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.code.as_str())
    }
}
