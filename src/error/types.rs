//! Error types for the Runixo agent.

use thiserror::Error;

/// Main error type for the agent.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Configuration-related errors.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Socket-related errors.
    #[error("Socket error: {message}")]
    Socket { message: String },

    /// Authentication errors.
    #[error("Authentication error: {kind}")]
    Auth { kind: AuthErrorKind },

    /// Validation errors.
    #[error("Validation error: {kind}")]
    Validation { kind: ValidationErrorKind },

    /// Command execution errors.
    #[error("Command error: {kind}")]
    Command { kind: CommandErrorKind },

    /// Protocol errors.
    #[error("Protocol error: {kind}")]
    Protocol { kind: ProtocolErrorKind },

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AgentError {
    /// Shorthand for an authentication error of the given kind.
    pub fn auth(kind: AuthErrorKind) -> Self {
        AgentError::Auth { kind }
    }

    /// Whether this error is an active lockout rejection.
    pub fn is_locked(&self) -> bool {
        matches!(
            self,
            AgentError::Auth {
                kind: AuthErrorKind::Locked { .. }
            }
        )
    }
}

/// Authentication error kinds.
///
/// Everything except `Locked` and `RandomnessFailure` is reported to the
/// caller as one uniform "authentication failed" signal.
#[derive(Error, Debug)]
pub enum AuthErrorKind {
    #[error("Missing credential")]
    MissingCredential,

    #[error("Malformed credential: {reason}")]
    MalformedCredential { reason: String },

    #[error("Invalid credential")]
    InvalidCredential,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Token expired at {expires_at}")]
    TokenExpired { expires_at: i64 },

    #[error("Too many failed attempts, retry after {retry_after_seconds}s")]
    Locked { retry_after_seconds: u64 },

    #[error("Secure random source unavailable")]
    RandomnessFailure,

    #[error("Failed to load secret: {message}")]
    SecretError { message: String },
}

impl AuthErrorKind {
    /// True for the kinds that fold into the uniform unauthenticated signal.
    pub fn is_credential_failure(&self) -> bool {
        matches!(
            self,
            AuthErrorKind::MissingCredential
                | AuthErrorKind::MalformedCredential { .. }
                | AuthErrorKind::InvalidCredential
                | AuthErrorKind::InvalidSignature
                | AuthErrorKind::TokenExpired { .. }
        )
    }
}

/// Validation error kinds.
#[derive(Error, Debug)]
pub enum ValidationErrorKind {
    #[error("Missing required parameter: {param}")]
    MissingParameter { param: String },

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },
}

/// Command error kinds.
#[derive(Error, Debug)]
pub enum CommandErrorKind {
    #[error("Unknown method: {name}")]
    UnknownMethod { name: String },

    #[error("Command execution failed: {message}")]
    ExecutionFailed { message: String },
}

/// Protocol error kinds.
#[derive(Error, Debug)]
pub enum ProtocolErrorKind {
    #[error("Message too large: {size} bytes exceeds maximum of {max} bytes")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Invalid message format: {message}")]
    InvalidMessageFormat { message: String },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Connection timed out")]
    ConnectionTimeout,
}

/// Result type alias for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_failures_fold_together() {
        assert!(AuthErrorKind::MissingCredential.is_credential_failure());
        assert!(AuthErrorKind::InvalidSignature.is_credential_failure());
        assert!(AuthErrorKind::TokenExpired { expires_at: 0 }.is_credential_failure());
        assert!(!AuthErrorKind::Locked {
            retry_after_seconds: 900
        }
        .is_credential_failure());
        assert!(!AuthErrorKind::RandomnessFailure.is_credential_failure());
    }

    #[test]
    fn test_is_locked() {
        let err = AgentError::auth(AuthErrorKind::Locked {
            retry_after_seconds: 900,
        });
        assert!(err.is_locked());
        assert!(!AgentError::auth(AuthErrorKind::InvalidCredential).is_locked());
    }
}
