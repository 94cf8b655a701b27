//! TCP listener for the RPC socket.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, error, info, warn};

use crate::audit::AuditLogger;
use crate::auth::Gateway;
use crate::commands::CommandRegistry;
use crate::config::Settings;
use crate::error::{AgentError, ProtocolErrorKind};

use super::connection::{handle_connection, ConnectionState};

/// Request and connection counters.
#[derive(Debug, Default)]
pub struct ConnectionMetrics {
    requests_total: AtomicU64,
    requests_denied: AtomicU64,
    active_connections: AtomicUsize,
}

impl ConnectionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request; `allowed` is false when the checkpoint rejected it.
    pub fn record_request(&self, allowed: bool) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if !allowed {
            self.requests_denied.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn total_requests(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn denied_requests(&self) -> u64 {
        self.requests_denied.load(Ordering::Relaxed)
    }

    pub fn active(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }
}

/// RPC server bound to `server.listen_address`.
pub struct SocketListener {
    listener: TcpListener,
    state: Arc<ConnectionState>,
    connection_semaphore: Arc<Semaphore>,
}

impl SocketListener {
    /// Bind the listener and build the command registry around `gateway`.
    pub async fn bind(settings: Arc<Settings>, gateway: Arc<Gateway>) -> Result<Self, AgentError> {
        let address = settings.server.listen_address;
        let listener = TcpListener::bind(address)
            .await
            .map_err(|e| AgentError::Socket {
                message: format!("Failed to bind to {}: {}", address, e),
            })?;

        let connection_semaphore = Arc::new(Semaphore::new(
            settings.limits.max_concurrent_connections,
        ));
        info!(
            max_connections = settings.limits.max_concurrent_connections,
            "Connection limiting enabled"
        );

        let command_registry = Arc::new(CommandRegistry::new(Arc::clone(&gateway)));

        let audit_logger = if settings.audit.enabled {
            match AuditLogger::new(&settings.audit.log_path) {
                Ok(logger) => {
                    info!(path = %settings.audit.log_path.display(), "Audit logging enabled");
                    Some(Arc::new(logger))
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        path = %settings.audit.log_path.display(),
                        "Failed to create audit logger, audit logging disabled"
                    );
                    None
                }
            }
        } else {
            info!("Audit logging disabled");
            None
        };

        let state = Arc::new(ConnectionState {
            settings,
            gateway,
            command_registry,
            audit_logger,
            metrics: Arc::new(ConnectionMetrics::new()),
        });

        info!(address = %address, "RPC listener bound");

        Ok(Self {
            listener,
            state,
            connection_semaphore,
        })
    }

    /// The bound address (useful when binding port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, AgentError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn metrics(&self) -> Arc<ConnectionMetrics> {
        Arc::clone(&self.state.metrics)
    }

    /// Accept connections until `shutdown` is notified.
    ///
    /// Open connections keep running; see [`Self::wait_for_drain`].
    pub async fn run(&self, shutdown: Arc<Notify>) -> Result<(), AgentError> {
        info!("RPC listener running, waiting for connections...");

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    let (stream, peer) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!(error = %e, "Failed to accept connection");
                            continue;
                        }
                    };

                    let semaphore = Arc::clone(&self.connection_semaphore);
                    let Ok(permit) = semaphore.try_acquire_owned() else {
                        warn!(
                            peer = %peer,
                            max = self.state.settings.limits.max_concurrent_connections,
                            "Connection limit reached, rejecting connection"
                        );
                        continue;
                    };

                    let state = Arc::clone(&self.state);
                    state.metrics.connection_opened();
                    debug!(
                        peer = %peer,
                        active = state.metrics.active(),
                        "New connection accepted"
                    );

                    tokio::spawn(async move {
                        let _permit = permit;
                        if let Err(e) = handle_connection(stream, peer, Arc::clone(&state)).await {
                            if !matches!(
                                e,
                                AgentError::Protocol { kind: ProtocolErrorKind::ConnectionClosed }
                            ) {
                                error!(peer = %peer, error = %e, "Connection handler error");
                            }
                        }
                        state.metrics.connection_closed();
                        debug!(peer = %peer, active = state.metrics.active(), "Connection closed");
                    });
                }
                _ = shutdown.notified() => {
                    info!("Shutdown signal received, stopping listener");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Wait until no connection is active.
    pub async fn wait_for_drain(&self) {
        let poll_interval = Duration::from_millis(100);

        while self.state.metrics.active() > 0 {
            debug!(
                active = self.state.metrics.active(),
                "Waiting for connections to drain"
            );
            tokio::time::sleep(poll_interval).await;
        }

        info!("All connections drained");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_counting() {
        let metrics = ConnectionMetrics::new();
        metrics.record_request(true);
        metrics.record_request(false);
        metrics.record_request(false);
        assert_eq!(metrics.total_requests(), 3);
        assert_eq!(metrics.denied_requests(), 2);

        metrics.connection_opened();
        assert_eq!(metrics.active(), 1);
        metrics.connection_closed();
        assert_eq!(metrics.active(), 0);
    }
}
