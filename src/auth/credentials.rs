//! Static secret and signing key storage.

use std::fmt;
use std::io::Write;
use std::path::Path;

use subtle::ConstantTimeEq;
use tracing::{info, warn};

use crate::config::SecurityConfig;
use crate::error::{AgentError, AgentResult, AuthErrorKind};

use super::token::{SigningKey, TokenIssuer};

/// Minimum length of a configured static secret.
pub const MIN_STATIC_SECRET_LENGTH: usize = 32;

/// Compare two byte strings without short-circuiting on the first difference.
///
/// Length is not hidden; only the position of a mismatch is.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Whether a static secret satisfies the minimum length for configured mode.
pub fn validate_token_format(token: &str) -> bool {
    token.len() >= MIN_STATIC_SECRET_LENGTH
}

/// Holds the shared static secret and the delegated-token signing key.
pub struct CredentialStore {
    secret: String,
    generated: bool,
    signing_key: SigningKey,
}

impl CredentialStore {
    /// Build a store from explicit values.
    ///
    /// An absent or empty secret is replaced by a freshly generated one; an
    /// absent signing key is generated for the lifetime of the process.
    pub fn new(secret: Option<String>, signing_key: Option<SigningKey>) -> AgentResult<Self> {
        let issuer = TokenIssuer::new();

        let (secret, generated) = match secret.filter(|s| !s.is_empty()) {
            Some(secret) => {
                if !validate_token_format(&secret) {
                    warn!(
                        min_length = MIN_STATIC_SECRET_LENGTH,
                        "Static secret is shorter than the recommended minimum"
                    );
                }
                (secret, false)
            }
            None => {
                warn!("No static secret configured, generated a random one for this process");
                (issuer.generate_token()?, true)
            }
        };

        let signing_key = match signing_key {
            Some(key) => key,
            None => {
                info!("No signing key configured, delegated tokens use an ephemeral key");
                SigningKey::generate()?
            }
        };

        Ok(Self {
            secret,
            generated,
            signing_key,
        })
    }

    /// Resolve credentials from the security configuration.
    ///
    /// The static secret comes from `auth_token`, then `auth_token_path`. When
    /// the path is configured but the file does not exist yet, a generated
    /// secret is written there with mode 0600 so operators can read it.
    pub fn from_config(config: &SecurityConfig) -> AgentResult<Self> {
        let issuer = TokenIssuer::new();
        let mut generated = false;

        let secret = match (&config.auth_token, &config.auth_token_path) {
            (Some(token), _) if !token.is_empty() => Some(token.clone()),
            (_, Some(path)) if path.exists() => {
                let raw = load_secret(path)?;
                let token = String::from_utf8(raw)
                    .map_err(|_| {
                        AgentError::auth(AuthErrorKind::SecretError {
                            message: format!("Secret file {} is not valid UTF-8", path.display()),
                        })
                    })?
                    .trim()
                    .to_string();
                if !validate_token_format(&token) {
                    return Err(AgentError::auth(AuthErrorKind::SecretError {
                        message: format!(
                            "Secret in {} is shorter than {} characters",
                            path.display(),
                            MIN_STATIC_SECRET_LENGTH
                        ),
                    }));
                }
                Some(token)
            }
            (_, Some(path)) => {
                let token = issuer.generate_token()?;
                write_secret(path, token.as_bytes())?;
                warn!(
                    path = %path.display(),
                    "No static secret configured, generated one and stored it"
                );
                generated = true;
                Some(token)
            }
            (_, None) => None,
        };

        let signing_key = match &config.signing_key_path {
            Some(path) if path.exists() => Some(SigningKey::new(&load_secret(path)?)),
            Some(path) => {
                let encoded = hex::encode(SigningKey::random_bytes()?);
                write_secret(path, encoded.as_bytes())?;
                info!(path = %path.display(), "Generated delegated-token signing key");
                Some(SigningKey::new(encoded.as_bytes()))
            }
            None => None,
        };

        let mut store = Self::new(secret, signing_key)?;
        store.generated |= generated;
        Ok(store)
    }

    /// Constant-time comparison of a presented credential with the secret.
    pub fn verify_secret(&self, candidate: &str) -> bool {
        constant_time_eq(candidate.as_bytes(), self.secret.as_bytes())
    }

    /// Whether the secret was generated rather than configured.
    pub fn is_generated(&self) -> bool {
        self.generated
    }

    /// Key used to sign delegated tokens.
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("secret", &"[REDACTED]")
            .field("generated", &self.generated)
            .field("signing_key", &self.signing_key)
            .finish()
    }
}

/// Load a secret from a file.
///
/// The file must not be readable by group or others.
pub fn load_secret(path: &Path) -> AgentResult<Vec<u8>> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        AgentError::auth(AuthErrorKind::SecretError {
            message: format!("Failed to read metadata of {}: {}", path.display(), e),
        })
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(AgentError::auth(AuthErrorKind::SecretError {
                message: format!(
                    "Secret file {} has insecure permissions {:04o}, expected 0600 or 0400",
                    path.display(),
                    mode & 0o777
                ),
            }));
        }
    }
    #[cfg(not(unix))]
    let _ = metadata;

    std::fs::read(path).map_err(|e| {
        AgentError::auth(AuthErrorKind::SecretError {
            message: format!("Failed to read secret from {}: {}", path.display(), e),
        })
    })
}

/// Write a secret to a new file readable only by the owner.
fn write_secret(path: &Path, contents: &[u8]) -> AgentResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(|e| {
        AgentError::auth(AuthErrorKind::SecretError {
            message: format!("Failed to create secret file {}: {}", path.display(), e),
        })
    })?;
    file.write_all(contents)?;
    file.sync_all()?;
    Ok(())
}
