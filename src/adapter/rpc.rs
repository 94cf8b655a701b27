//! RPC socket adapter.

use std::net::SocketAddr;

use uuid::Uuid;

use crate::auth::{AuthRequest, Gateway, Grant};
use crate::error::{AgentError, AgentResult, AuthErrorKind, CommandErrorKind, ProtocolErrorKind};
use crate::protocol::{codes, Response, RpcRequest};

/// Run the checkpoint for one RPC frame.
pub fn authorize(
    gateway: &Gateway,
    request: &RpcRequest,
    peer: Option<SocketAddr>,
) -> AgentResult<Grant> {
    gateway.authorize(&AuthRequest {
        method: &request.method,
        peer,
        authorization: request.authorization(),
    })
}

/// Protocol error code for an error.
pub fn error_code(err: &AgentError) -> &'static str {
    match err {
        AgentError::Auth {
            kind: AuthErrorKind::Locked { .. },
        } => codes::RESOURCE_EXHAUSTED,
        AgentError::Auth { kind } if kind.is_credential_failure() => codes::UNAUTHENTICATED,
        AgentError::Validation { .. } => codes::VALIDATION_ERROR,
        AgentError::Command {
            kind: CommandErrorKind::UnknownMethod { .. },
        } => codes::UNKNOWN_METHOD,
        AgentError::Command {
            kind: CommandErrorKind::ExecutionFailed { .. },
        } => codes::EXECUTION_ERROR,
        AgentError::Protocol {
            kind: ProtocolErrorKind::InvalidMessageFormat { .. },
        }
        | AgentError::Serialization(_) => codes::INVALID_REQUEST,
        _ => codes::INTERNAL_ERROR,
    }
}

/// Build the error response for `err`.
///
/// Lockout rejections carry `retry_after_seconds` in the details.
pub fn error_response(request_id: Uuid, err: &AgentError) -> Response {
    let response = Response::error_with_id(request_id, error_code(err), err.to_string());
    match err {
        AgentError::Auth {
            kind: AuthErrorKind::Locked {
                retry_after_seconds,
            },
        } => response.with_details(serde_json::json!({
            "retry_after_seconds": retry_after_seconds,
        })),
        _ => response,
    }
}
