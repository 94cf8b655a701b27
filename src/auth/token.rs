//! Opaque and HMAC-signed delegated tokens.
//!
//! A signed token is `base64url(payload) "." base64url(mac)` where the MAC is
//! HMAC-SHA256 over the *encoded* payload segment. Both segments use the
//! URL-safe alphabet without padding.

use std::fmt;
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use ring::hmac;
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, AgentResult, AuthErrorKind};

use super::credentials::constant_time_eq;

/// Number of random bytes behind every opaque token.
pub const TOKEN_BYTES: usize = 32;

/// HMAC-SHA256 key for delegated tokens.
#[derive(Clone)]
pub struct SigningKey {
    key: hmac::Key,
}

impl SigningKey {
    /// Create a key from raw key material.
    pub fn new(material: &[u8]) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, material),
        }
    }

    /// Create a key from fresh random material.
    pub fn generate() -> AgentResult<Self> {
        Ok(Self::new(&Self::random_bytes()?))
    }

    /// Random key material from the system source.
    pub fn random_bytes() -> AgentResult<[u8; TOKEN_BYTES]> {
        let mut bytes = [0u8; TOKEN_BYTES];
        SystemRandom::new()
            .fill(&mut bytes)
            .map_err(|_| AgentError::auth(AuthErrorKind::RandomnessFailure))?;
        Ok(bytes)
    }

    fn sign(&self, data: &[u8]) -> String {
        URL_SAFE_NO_PAD.encode(hmac::sign(&self.key, data).as_ref())
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey([REDACTED])")
    }
}

/// Claims carried by a signed token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTokenPayload {
    /// Random secret value, hex-encoded.
    #[serde(rename = "tok")]
    pub secret: String,
    /// Issue time in unix seconds.
    #[serde(rename = "iat")]
    pub issued_at: i64,
    /// Expiry time in unix seconds.
    #[serde(rename = "exp")]
    pub expires_at: i64,
}

impl SignedTokenPayload {
    /// Whether the token is past its expiry at the given unix time.
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

/// Mints and validates tokens.
pub struct TokenIssuer {
    rng: SystemRandom,
}

impl TokenIssuer {
    /// Create an issuer backed by the system random source.
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }

    /// Generate an opaque token: 32 random bytes as 64 lowercase hex chars.
    pub fn generate_token(&self) -> AgentResult<String> {
        let mut bytes = [0u8; TOKEN_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| AgentError::auth(AuthErrorKind::RandomnessFailure))?;
        Ok(hex::encode(bytes))
    }

    /// Generate a signed token valid for `ttl`, with the payload it carries.
    pub fn generate_signed_token(
        &self,
        key: &SigningKey,
        ttl: Duration,
    ) -> AgentResult<(String, SignedTokenPayload)> {
        let now = Utc::now().timestamp();
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let payload = SignedTokenPayload {
            secret: self.generate_token()?,
            issued_at: now,
            expires_at: now.saturating_add(ttl_secs),
        };

        let encoded = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload)?);
        let signature = key.sign(encoded.as_bytes());

        Ok((format!("{}.{}", encoded, signature), payload))
    }

    /// Validate a signed token and return its payload.
    ///
    /// The signature is checked before the payload is decoded. Expired
    /// tokens are rejected with `TokenExpired`.
    pub fn validate_signed_token(
        &self,
        token: &str,
        key: &SigningKey,
    ) -> AgentResult<SignedTokenPayload> {
        let payload = verify_signature(token, key)?;

        if payload.is_expired_at(Utc::now().timestamp()) {
            return Err(AgentError::auth(AuthErrorKind::TokenExpired {
                expires_at: payload.expires_at,
            }));
        }

        Ok(payload)
    }
}

impl Default for TokenIssuer {
    fn default() -> Self {
        Self::new()
    }
}

/// Check the MAC of a signed token and decode its payload, ignoring expiry.
pub fn verify_signature(token: &str, key: &SigningKey) -> AgentResult<SignedTokenPayload> {
    let (encoded, signature) = token.split_once('.').ok_or_else(|| {
        AgentError::auth(AuthErrorKind::MalformedCredential {
            reason: "missing signature segment".to_string(),
        })
    })?;

    let expected = key.sign(encoded.as_bytes());
    if !constant_time_eq(signature.as_bytes(), expected.as_bytes()) {
        return Err(AgentError::auth(AuthErrorKind::InvalidSignature));
    }

    let raw = URL_SAFE_NO_PAD.decode(encoded).map_err(|_| {
        AgentError::auth(AuthErrorKind::MalformedCredential {
            reason: "payload is not base64url".to_string(),
        })
    })?;

    serde_json::from_slice(&raw).map_err(|_| {
        AgentError::auth(AuthErrorKind::MalformedCredential {
            reason: "payload is not valid claims".to_string(),
        })
    })
}

/// Whether a credential has the shape of a signed token.
pub fn looks_signed(credential: &str) -> bool {
    credential.contains('.')
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    fn key() -> SigningKey {
        SigningKey::new(b"delegation-signing-key-for-tests")
    }

    fn flip(c: char) -> char {
        if c == 'A' {
            'B'
        } else {
            'A'
        }
    }

    #[test]
    fn test_generate_token_format() {
        let token = TokenIssuer::new().generate_token().unwrap();
        assert_eq!(token.len(), 64);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_generate_token_uniqueness() {
        let issuer = TokenIssuer::new();
        let tokens: HashSet<String> = (0..1000)
            .map(|_| issuer.generate_token().unwrap())
            .collect();
        assert_eq!(tokens.len(), 1000);
    }

    #[test]
    fn test_signed_token_round_trip() {
        let issuer = TokenIssuer::new();
        let (token, issued) = issuer.generate_signed_token(&key(), HOUR).unwrap();

        let payload = issuer.validate_signed_token(&token, &key()).unwrap();
        assert_eq!(payload, issued);
        assert_eq!(payload.secret.len(), 64);
        assert_eq!(payload.expires_at - payload.issued_at, 3600);
    }

    #[test]
    fn test_signed_token_wrong_key() {
        let issuer = TokenIssuer::new();
        let (token, _) = issuer.generate_signed_token(&key(), HOUR).unwrap();

        let other = SigningKey::new(b"some-other-key");
        assert!(matches!(
            issuer.validate_signed_token(&token, &other),
            Err(AgentError::Auth {
                kind: AuthErrorKind::InvalidSignature
            })
        ));
    }

    #[test]
    fn test_any_flipped_character_is_rejected() {
        let issuer = TokenIssuer::new();
        let (token, _) = issuer.generate_signed_token(&key(), HOUR).unwrap();
        let dot = token.find('.').unwrap();

        for (index, c) in token.char_indices() {
            if index == dot {
                continue;
            }
            let mut tampered: Vec<char> = token.chars().collect();
            tampered[index] = flip(c);
            let tampered: String = tampered.into_iter().collect();

            let result = issuer.validate_signed_token(&tampered, &key());
            assert!(
                matches!(
                    result,
                    Err(AgentError::Auth {
                        kind: AuthErrorKind::InvalidSignature
                    })
                ),
                "tampering at {} was not rejected",
                index
            );
        }
    }

    #[test]
    fn test_malformed_token() {
        let issuer = TokenIssuer::new();
        assert!(matches!(
            issuer.validate_signed_token("no-dot-here", &key()),
            Err(AgentError::Auth {
                kind: AuthErrorKind::MalformedCredential { .. }
            })
        ));
    }

    #[test]
    fn test_validly_signed_garbage_payload() {
        let encoded = URL_SAFE_NO_PAD.encode(b"not json");
        let token = format!("{}.{}", encoded, key().sign(encoded.as_bytes()));

        assert!(matches!(
            verify_signature(&token, &key()),
            Err(AgentError::Auth {
                kind: AuthErrorKind::MalformedCredential { .. }
            })
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let issuer = TokenIssuer::new();
        let (token, _) = issuer
            .generate_signed_token(&key(), Duration::ZERO)
            .unwrap();

        assert!(matches!(
            issuer.validate_signed_token(&token, &key()),
            Err(AgentError::Auth {
                kind: AuthErrorKind::TokenExpired { .. }
            })
        ));
        // The signature itself is still intact.
        assert!(verify_signature(&token, &key()).is_ok());
    }

    #[test]
    fn test_signing_key_debug_redacted() {
        assert_eq!(format!("{:?}", key()), "SigningKey([REDACTED])");
    }
}
