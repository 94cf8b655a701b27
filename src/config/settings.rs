//! Configuration settings for the Runixo agent.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::auth::MIN_STATIC_SECRET_LENGTH;
use crate::error::AgentError;

/// Upper bound for every configured duration (one year).
pub const MAX_DURATION_SECONDS: u64 = 365 * 24 * 60 * 60;

/// Main configuration structure for the agent.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

/// RPC listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the RPC listener binds to.
    #[serde(default = "default_listen_address")]
    pub listen_address: SocketAddr,
}

/// Security configuration.
///
/// The static secret comes from `auth_token` or `auth_token_path`; the
/// signing key for delegated tokens is configured independently.
#[derive(Clone, Deserialize)]
pub struct SecurityConfig {
    /// Inline static secret.
    #[serde(default)]
    pub auth_token: Option<String>,
    /// File holding the static secret (mode 0600 or 0400).
    #[serde(default)]
    pub auth_token_path: Option<PathBuf>,
    /// File holding the delegated-token signing key.
    #[serde(default)]
    pub signing_key_path: Option<PathBuf>,
    /// Lifetime of delegated tokens in seconds.
    #[serde(default = "default_session_token_ttl")]
    pub session_token_ttl_seconds: u64,
    /// Failures before an identity is locked out.
    #[serde(default = "default_max_failed_attempts")]
    pub max_failed_attempts: u32,
    /// Lockout duration in seconds.
    #[serde(default = "default_lockout_seconds")]
    pub lockout_seconds: u64,
    /// Maximum identities tracked for lockout.
    #[serde(default = "default_max_tracked_identities")]
    pub max_tracked_identities: usize,
    /// Interval between stale-record sweeps in seconds.
    #[serde(default = "default_reap_interval")]
    pub reap_interval_seconds: u64,
    /// How long after a lockout ends its record is kept, in seconds.
    #[serde(default = "default_stale_record")]
    pub stale_record_seconds: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format ("pretty" or "json").
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Limits configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum message size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Maximum concurrent connections.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_connections: usize,
    /// Socket read/write timeout in seconds.
    #[serde(default = "default_socket_timeout")]
    pub socket_timeout_seconds: u64,
}

/// Audit logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Whether audit logging is enabled.
    #[serde(default)]
    pub enabled: bool,
    /// Path to the audit log file.
    #[serde(default = "default_audit_log_path")]
    pub log_path: PathBuf,
}

// Default value functions
fn default_listen_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9527))
}

fn default_session_token_ttl() -> u64 {
    24 * 60 * 60
}

fn default_max_failed_attempts() -> u32 {
    5
}

fn default_lockout_seconds() -> u64 {
    900
}

fn default_max_tracked_identities() -> usize {
    10_000
}

fn default_reap_interval() -> u64 {
    300
}

fn default_stale_record() -> u64 {
    1800
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_max_message_size() -> usize {
    1_048_576 // 1MB
}

fn default_max_concurrent() -> usize {
    100
}

fn default_socket_timeout() -> u64 {
    30
}

fn default_audit_log_path() -> PathBuf {
    PathBuf::from("/var/log/runixo/audit.log")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            auth_token: None,
            auth_token_path: None,
            signing_key_path: None,
            session_token_ttl_seconds: default_session_token_ttl(),
            max_failed_attempts: default_max_failed_attempts(),
            lockout_seconds: default_lockout_seconds(),
            max_tracked_identities: default_max_tracked_identities(),
            reap_interval_seconds: default_reap_interval(),
            stale_record_seconds: default_stale_record(),
        }
    }
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("auth_token_path", &self.auth_token_path)
            .field("signing_key_path", &self.signing_key_path)
            .field("session_token_ttl_seconds", &self.session_token_ttl_seconds)
            .field("max_failed_attempts", &self.max_failed_attempts)
            .field("lockout_seconds", &self.lockout_seconds)
            .field("max_tracked_identities", &self.max_tracked_identities)
            .field("reap_interval_seconds", &self.reap_interval_seconds)
            .field("stale_record_seconds", &self.stale_record_seconds)
            .finish()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_message_size: default_max_message_size(),
            max_concurrent_connections: default_max_concurrent(),
            socket_timeout_seconds: default_socket_timeout(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_path: default_audit_log_path(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AgentError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| AgentError::Config {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            AgentError::Config { message } => AgentError::Config {
                message: format!("{} ({})", message, path.display()),
            },
            other => other,
        })
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, AgentError> {
        let settings: Settings = toml::from_str(content).map_err(|e| AgentError::Config {
            message: format!("Failed to parse config: {}", e),
        })?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate the settings.
    fn validate(&self) -> Result<(), AgentError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(AgentError::Config {
                message: format!(
                    "Invalid log level '{}'. Valid levels: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(AgentError::Config {
                message: format!(
                    "Invalid log format '{}'. Valid formats: {:?}",
                    self.logging.format, valid_formats
                ),
            });
        }

        let security = &self.security;
        if let Some(token) = &security.auth_token {
            if token.len() < MIN_STATIC_SECRET_LENGTH {
                return Err(AgentError::Config {
                    message: format!(
                        "security.auth_token must be at least {} characters",
                        MIN_STATIC_SECRET_LENGTH
                    ),
                });
            }
        }

        let positive = [
            ("security.max_failed_attempts", u64::from(security.max_failed_attempts)),
            ("security.lockout_seconds", security.lockout_seconds),
            ("security.max_tracked_identities", security.max_tracked_identities as u64),
            ("security.reap_interval_seconds", security.reap_interval_seconds),
            ("security.session_token_ttl_seconds", security.session_token_ttl_seconds),
            ("limits.max_concurrent_connections", self.limits.max_concurrent_connections as u64),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(AgentError::Config {
                message: format!("{} must be greater than zero", name),
            });
        }

        let durations = [
            ("security.lockout_seconds", security.lockout_seconds),
            ("security.stale_record_seconds", security.stale_record_seconds),
            ("security.reap_interval_seconds", security.reap_interval_seconds),
            ("security.session_token_ttl_seconds", security.session_token_ttl_seconds),
        ];
        if let Some((name, _)) = durations
            .iter()
            .find(|(_, value)| *value > MAX_DURATION_SECONDS)
        {
            return Err(AgentError::Config {
                message: format!("{} must not exceed {} seconds", name, MAX_DURATION_SECONDS),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_default_values() {
        assert_eq!(default_lockout_seconds(), 900);
        assert_eq!(default_max_failed_attempts(), 5);
        assert_eq!(default_log_level(), "info");
        assert_eq!(default_log_format(), "pretty");
    }

    #[test]
    fn test_minimal_config() {
        let settings = Settings::from_toml("[server]\n").unwrap();
        assert_eq!(settings.server.listen_address.port(), 9527);
        assert_eq!(settings.security.max_tracked_identities, 10_000);
        assert_eq!(settings.security.reap_interval_seconds, 300);
        assert!(!settings.audit.enabled);
    }

    #[test]
    fn test_full_security_section() {
        let toml = format!(
            r#"
            [server]
            listen_address = "127.0.0.1:7000"

            [security]
            auth_token = "{}"
            lockout_seconds = 60
            max_failed_attempts = 3

            [logging]
            level = "debug"
            format = "json"
            "#,
            SECRET
        );
        let settings = Settings::from_toml(&toml).unwrap();
        assert_eq!(settings.security.auth_token.as_deref(), Some(SECRET));
        assert_eq!(settings.security.lockout_seconds, 60);
        assert_eq!(settings.security.max_failed_attempts, 3);
    }

    #[test]
    fn test_short_secret_rejected() {
        let result = Settings::from_toml("[server]\n[security]\nauth_token = \"short\"\n");
        assert!(matches!(result, Err(AgentError::Config { .. })));
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let result = Settings::from_toml("[server]\n[security]\nmax_failed_attempts = 0\n");
        assert!(matches!(result, Err(AgentError::Config { .. })));
    }

    #[test]
    fn test_oversized_durations_rejected() {
        for key in [
            "lockout_seconds",
            "stale_record_seconds",
            "reap_interval_seconds",
            "session_token_ttl_seconds",
        ] {
            let toml = format!("[server]\n[security]\n{} = 9223372036854775807\n", key);
            assert!(
                matches!(Settings::from_toml(&toml), Err(AgentError::Config { .. })),
                "{} accepted",
                key
            );
        }

        let toml = format!(
            "[server]\n[security]\nlockout_seconds = {}\n",
            MAX_DURATION_SECONDS
        );
        assert!(Settings::from_toml(&toml).is_ok());
    }

    #[test]
    fn test_invalid_log_format_rejected() {
        let result = Settings::from_toml("[server]\n[logging]\nformat = \"xml\"\n");
        assert!(matches!(result, Err(AgentError::Config { .. })));
    }

    #[test]
    fn test_debug_redacts_token() {
        let mut security = SecurityConfig::default();
        security.auth_token = Some(SECRET.to_string());
        assert!(!format!("{:?}", security).contains(SECRET));
    }
}
