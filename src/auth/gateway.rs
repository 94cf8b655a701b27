//! The authorization checkpoint shared by every transport.
//!
//! Transport adapters resolve the caller's peer address and the raw
//! `authorization` value, call [`Gateway::authorize`], and translate the
//! result into their own status codes. Business handlers run only after an
//! `Ok` result.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SecurityConfig;
use crate::error::{AgentError, AgentResult, AuthErrorKind};

use super::attempts::{AttemptTracker, LockoutPolicy, ReaperHandle};
use super::credentials::CredentialStore;
use super::identity::Identity;
use super::session::SessionRegistry;
use super::token::{looks_signed, TokenIssuer};

/// The single method allowed through without a credential.
pub const AUTHENTICATE_METHOD: &str = "/runixo.AgentService/Authenticate";

/// Prefix accepted in front of a credential. Case-sensitive.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Default lifetime of delegated tokens.
pub const DEFAULT_SESSION_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// What a transport knows about an inbound call.
#[derive(Debug, Clone, Copy)]
pub struct AuthRequest<'a> {
    /// Fully-qualified method identifier.
    pub method: &'a str,
    /// Transport-level peer address.
    pub peer: Option<SocketAddr>,
    /// Raw value of the `authorization` field.
    pub authorization: Option<&'a str>,
}

/// How a caller got through the checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Delegated token found in the session registry.
    Session,
    /// Static shared secret.
    StaticSecret,
    /// The exempt bootstrap method; no credential was checked.
    Bootstrap,
}

/// Successful authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    /// Resolved caller identity.
    pub identity: Identity,
    /// Path that accepted the call.
    pub via: AuthMethod,
}

/// A freshly minted delegated token.
#[derive(Debug, Clone, Serialize)]
pub struct DelegatedToken {
    /// Signed token to present as the credential.
    pub token: String,
    /// Expiry in unix seconds.
    pub expires_at: i64,
}

/// Observability snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayStats {
    /// Delegated sessions currently registered.
    pub active_sessions: usize,
    /// Identities with a failure record.
    pub tracked_identities: usize,
    /// Whether the static secret was generated at startup.
    pub secret_generated: bool,
}

/// Gateway tunables.
#[derive(Debug, Clone, Copy)]
pub struct GatewayConfig {
    /// Failure threshold, lockout window and reaper settings.
    pub lockout: LockoutPolicy,
    /// Lifetime of delegated tokens.
    pub session_token_ttl: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            lockout: LockoutPolicy::default(),
            session_token_ttl: DEFAULT_SESSION_TOKEN_TTL,
        }
    }
}

impl From<&SecurityConfig> for GatewayConfig {
    fn from(config: &SecurityConfig) -> Self {
        Self {
            lockout: LockoutPolicy {
                max_failures: config.max_failed_attempts,
                lockout: Duration::from_secs(config.lockout_seconds),
                stale_after: Duration::from_secs(config.stale_record_seconds),
                max_identities: config.max_tracked_identities,
                reap_interval: Duration::from_secs(config.reap_interval_seconds),
            },
            session_token_ttl: Duration::from_secs(config.session_token_ttl_seconds),
        }
    }
}

/// Composes credential verification, lockout and sessions.
pub struct Gateway {
    credentials: CredentialStore,
    attempts: Arc<AttemptTracker>,
    sessions: SessionRegistry,
    issuer: TokenIssuer,
    session_token_ttl: Duration,
    reaper: Mutex<Option<ReaperHandle>>,
}

impl Gateway {
    /// Build a gateway and start its reaper.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(credentials: CredentialStore, config: GatewayConfig) -> Self {
        let attempts = Arc::new(AttemptTracker::new(config.lockout));
        let reaper = attempts.start_reaper();

        info!(
            max_failures = config.lockout.max_failures,
            lockout_seconds = config.lockout.lockout.as_secs(),
            max_identities = config.lockout.max_identities,
            "Authentication gateway started"
        );

        Self {
            credentials,
            attempts,
            sessions: SessionRegistry::new(),
            issuer: TokenIssuer::new(),
            session_token_ttl: config.session_token_ttl,
            reaper: Mutex::new(Some(reaper)),
        }
    }

    /// Build a gateway from the security configuration.
    pub fn from_config(config: &SecurityConfig) -> AgentResult<Self> {
        let credentials = CredentialStore::from_config(config)?;
        Ok(Self::new(credentials, GatewayConfig::from(config)))
    }

    /// Whether the method is the exempt bootstrap call.
    pub fn is_exempt(method: &str) -> bool {
        method == AUTHENTICATE_METHOD
    }

    /// Run the checkpoint for one inbound call.
    pub fn authorize(&self, request: &AuthRequest<'_>) -> AgentResult<Grant> {
        let identity = Identity::from_peer(request.peer);

        if Self::is_exempt(request.method) {
            return Ok(Grant {
                identity,
                via: AuthMethod::Bootstrap,
            });
        }

        if self.attempts.is_locked(identity.as_str()) {
            debug!(identity = %identity, method = %request.method, "Rejected locked identity");
            return Err(self.locked_error());
        }

        let Some(credential) = extract_credential(request.authorization) else {
            return Err(self.reject(&identity, AuthErrorKind::MissingCredential));
        };

        let via = if self.check_session(credential) {
            AuthMethod::Session
        } else if self.credentials.verify_secret(credential) {
            AuthMethod::StaticSecret
        } else {
            return Err(self.reject(&identity, AuthErrorKind::InvalidCredential));
        };

        self.attempts.reset(identity.as_str());
        debug!(identity = %identity, method = %request.method, via = ?via, "Request authorized");

        Ok(Grant { identity, via })
    }

    /// Exchange the static secret for a delegated token.
    ///
    /// Backs the bootstrap method. The lockout and failure accounting apply
    /// exactly as for `authorize`.
    pub fn authenticate(
        &self,
        identity: &Identity,
        presented: Option<&str>,
    ) -> AgentResult<DelegatedToken> {
        if self.attempts.is_locked(identity.as_str()) {
            return Err(self.locked_error());
        }

        let Some(secret) = extract_credential(presented) else {
            return Err(self.reject(identity, AuthErrorKind::MissingCredential));
        };

        if !self.credentials.verify_secret(secret) {
            return Err(self.reject(identity, AuthErrorKind::InvalidCredential));
        }
        self.attempts.reset(identity.as_str());

        let (token, payload) = self
            .issuer
            .generate_signed_token(self.credentials.signing_key(), self.session_token_ttl)?;
        self.sessions.create_session(&token, identity.as_str());

        info!(identity = %identity, expires_at = payload.expires_at, "Delegated token issued");

        Ok(DelegatedToken {
            token,
            expires_at: payload.expires_at,
        })
    }

    /// Revoke one delegated session.
    pub fn revoke_session(&self, token: &str) -> bool {
        self.sessions.revoke_session(token)
    }

    /// Revoke every delegated session.
    pub fn revoke_all_sessions(&self) -> usize {
        let revoked = self.sessions.revoke_all_sessions();
        info!(revoked, "All sessions revoked");
        revoked
    }

    /// Snapshot of gateway state.
    pub fn stats(&self) -> GatewayStats {
        GatewayStats {
            active_sessions: self.sessions.active_session_count(),
            tracked_identities: self.attempts.tracked_identities(),
            secret_generated: self.credentials.is_generated(),
        }
    }

    /// Retry-after hint sent with lockout rejections.
    pub fn retry_after(&self) -> Duration {
        self.attempts.policy().lockout
    }

    /// The attempt tracker.
    pub fn attempts(&self) -> &AttemptTracker {
        &self.attempts
    }

    /// The session registry.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Stop the reaper. Safe to call more than once.
    pub async fn shutdown(&self) {
        let reaper = self.reaper.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(reaper) = reaper {
            reaper.stop().await;
            info!("Authentication gateway stopped");
        }
    }

    /// Whether the reaper task is still running.
    pub fn is_reaper_running(&self) -> bool {
        self.reaper
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(ReaperHandle::is_running)
    }

    /// Session lookup, then signature and expiry of signed session tokens.
    fn check_session(&self, credential: &str) -> bool {
        if self.sessions.validate_session(credential).is_none() {
            return false;
        }
        if !looks_signed(credential) {
            return true;
        }

        match self
            .issuer
            .validate_signed_token(credential, self.credentials.signing_key())
        {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "Session token no longer valid, revoking");
                self.sessions.revoke_session(credential);
                false
            }
        }
    }

    /// Record a failure and build the matching rejection.
    fn reject(&self, identity: &Identity, kind: AuthErrorKind) -> AgentError {
        if self.attempts.record_failure(identity.as_str()) {
            warn!(
                identity = %identity,
                lockout_seconds = self.retry_after().as_secs(),
                "Identity locked out after repeated authentication failures"
            );
            return self.locked_error();
        }
        debug!(identity = %identity, reason = %kind, "Authentication failed");
        AgentError::auth(kind)
    }

    fn locked_error(&self) -> AgentError {
        AgentError::auth(AuthErrorKind::Locked {
            retry_after_seconds: self.retry_after().as_secs(),
        })
    }
}

/// Strip an optional `Bearer ` prefix. Empty values count as missing.
pub fn extract_credential(authorization: Option<&str>) -> Option<&str> {
    let raw = authorization?;
    let credential = raw.strip_prefix(BEARER_PREFIX).unwrap_or(raw);
    (!credential.is_empty()).then_some(credential)
}
