//! Per-connection handler.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::adapter::rpc;
use crate::audit::{AuditEntry, AuditLogger, AuditOutcome};
use crate::auth::{Gateway, Identity};
use crate::commands::{CommandParams, CommandRegistry, ExecutionContext};
use crate::config::Settings;
use crate::error::{AgentError, ProtocolErrorKind};
use crate::protocol::{
    codes, read_message_with_timeout, write_message_with_timeout, Response, RpcRequest,
};

use super::listener::ConnectionMetrics;

/// Everything a connection task needs, shared across connections.
pub struct ConnectionState {
    pub settings: Arc<Settings>,
    pub gateway: Arc<Gateway>,
    pub command_registry: Arc<CommandRegistry>,
    pub audit_logger: Option<Arc<AuditLogger>>,
    pub metrics: Arc<ConnectionMetrics>,
}

/// Serve frames from one client until it disconnects or times out.
///
/// Every frame is authorized on its own; an earlier success on the same
/// connection grants nothing.
pub async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    state: Arc<ConnectionState>,
) -> Result<(), AgentError> {
    let (mut reader, mut writer) = stream.into_split();

    loop {
        match process_request(&mut reader, &mut writer, peer, &state).await {
            Ok(()) => continue,
            Err(AgentError::Protocol {
                kind: ProtocolErrorKind::ConnectionClosed,
            }) => {
                debug!(peer = %peer, "Client disconnected");
                return Ok(());
            }
            Err(AgentError::Protocol {
                kind: ProtocolErrorKind::ConnectionTimeout,
            }) => {
                warn!(peer = %peer, "Connection timed out");
                return Ok(());
            }
            Err(e) => return Err(e),
        }
    }
}

async fn process_request<R, W>(
    reader: &mut R,
    writer: &mut W,
    peer: SocketAddr,
    state: &ConnectionState,
) -> Result<(), AgentError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let limits = &state.settings.limits;
    let socket_timeout = Duration::from_secs(limits.socket_timeout_seconds);
    let msg = read_message_with_timeout(reader, limits.max_message_size, socket_timeout).await?;

    let request_id = Uuid::new_v4();
    let start_time = Instant::now();

    let request: RpcRequest = match serde_json::from_slice(&msg) {
        Ok(request) => request,
        Err(e) => {
            warn!(request_id = %request_id, peer = %peer, error = %e, "Malformed request");
            let err = AgentError::Protocol {
                kind: ProtocolErrorKind::InvalidMessageFormat {
                    message: format!("Invalid JSON: {}", e),
                },
            };
            let response = rpc::error_response(request_id, &err);
            return send(writer, &response, socket_timeout).await;
        }
    };

    info!(
        request_id = %request_id,
        method = %request.method,
        peer = %peer,
        "Received request"
    );

    let response = match rpc::authorize(&state.gateway, &request, Some(peer)) {
        Ok(grant) => {
            state.metrics.record_request(true);

            let requires_audit = state
                .command_registry
                .get(&request.method)
                .map_or(true, |cmd| cmd.requires_audit());
            let audit = requires_audit.then(|| {
                AuditEntry::new(request_id, &request.method, &grant.identity, &request.params)
                    .with_via(grant.via)
            });

            let ctx = ExecutionContext::new(
                request_id,
                grant,
                Utc::now().timestamp(),
                request.method.clone(),
            );
            let registry = Arc::clone(&state.command_registry);
            let method = request.method.clone();
            let params = CommandParams::new(request.params);

            let result =
                tokio::task::spawn_blocking(move || registry.dispatch(&ctx, &method, params)).await;

            let (response, outcome) = match result {
                Ok(Ok(cmd_result)) if cmd_result.success => (
                    Response::success_with_id(
                        request_id,
                        cmd_result.data.unwrap_or_else(|| serde_json::json!({})),
                    ),
                    AuditOutcome::Success,
                ),
                Ok(Ok(cmd_result)) => {
                    let code = cmd_result
                        .error_code
                        .unwrap_or_else(|| codes::EXECUTION_ERROR.to_string());
                    let message = cmd_result.error_message.unwrap_or_default();
                    (
                        Response::error_with_id(request_id, code.clone(), message),
                        AuditOutcome::Failure { error_code: code },
                    )
                }
                Ok(Err(e)) => {
                    warn!(
                        request_id = %request_id,
                        method = %request.method,
                        error = %e,
                        "Command failed"
                    );
                    let error_code = rpc::error_code(&e).to_string();
                    let outcome = if matches!(e, AgentError::Auth { .. }) {
                        AuditOutcome::Denied { error_code }
                    } else {
                        AuditOutcome::Failure { error_code }
                    };
                    (rpc::error_response(request_id, &e), outcome)
                }
                Err(e) => {
                    error!(
                        request_id = %request_id,
                        method = %request.method,
                        error = %e,
                        "Command task panicked"
                    );
                    (
                        Response::error_with_id(request_id, codes::INTERNAL_ERROR, e.to_string()),
                        AuditOutcome::Failure {
                            error_code: codes::INTERNAL_ERROR.to_string(),
                        },
                    )
                }
            };

            if let Some(entry) = audit {
                write_audit(state, entry.finish(outcome, elapsed_ms(start_time)));
            }

            response
        }
        Err(e) => {
            state.metrics.record_request(false);
            warn!(
                request_id = %request_id,
                method = %request.method,
                peer = %peer,
                error = %e,
                "Request rejected at checkpoint"
            );

            let identity = Identity::from_peer(Some(peer));
            let entry = AuditEntry::new(request_id, &request.method, &identity, &request.params)
                .finish(
                    AuditOutcome::Denied {
                        error_code: rpc::error_code(&e).to_string(),
                    },
                    elapsed_ms(start_time),
                );
            write_audit(state, entry);

            rpc::error_response(request_id, &e)
        }
    };

    send(writer, &response, socket_timeout).await
}

async fn send<W>(writer: &mut W, response: &Response, limit: Duration) -> Result<(), AgentError>
where
    W: AsyncWrite + Unpin,
{
    let bytes = serde_json::to_vec(response)?;
    write_message_with_timeout(writer, &bytes, limit).await
}

fn write_audit(state: &ConnectionState, entry: AuditEntry) {
    if let Some(logger) = &state.audit_logger {
        if let Err(e) = logger.log(&entry) {
            error!(error = %e, "Failed to write audit log entry");
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
