//! HTTP-style management adapter.
//!
//! Translates checkpoint decisions into status codes and headers. The
//! server framing is left to whoever embeds it; this module only decides
//! what to send back.

use std::net::SocketAddr;

use serde_json::{json, Value};

use crate::auth::{AuthRequest, Gateway, Grant};
use crate::error::{AgentError, AuthErrorKind};
use crate::protocol::codes;

pub const STATUS_UNAUTHORIZED: u16 = 401;
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;
pub const STATUS_INTERNAL_ERROR: u16 = 500;

/// A reply ready to be written by the HTTP layer.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl HttpReply {
    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// The `Authorization` header value, matched case-insensitively by name.
pub fn authorization_header(headers: &[(String, String)]) -> Option<&str> {
    find_header(headers, "authorization")
}

/// Run the checkpoint for one HTTP request.
///
/// `path` is used as the method identifier.
pub fn authorize(
    gateway: &Gateway,
    path: &str,
    peer: Option<SocketAddr>,
    headers: &[(String, String)],
) -> Result<Grant, HttpReply> {
    gateway
        .authorize(&AuthRequest {
            method: path,
            peer,
            authorization: authorization_header(headers),
        })
        .map_err(|e| deny_reply(&e))
}

/// Reply for a rejected request.
pub fn deny_reply(err: &AgentError) -> HttpReply {
    let (status, code, message, retry_after) = match err {
        AgentError::Auth {
            kind: AuthErrorKind::Locked {
                retry_after_seconds,
            },
        } => (
            STATUS_TOO_MANY_REQUESTS,
            codes::RESOURCE_EXHAUSTED,
            "Too many failed attempts, try again later",
            Some(*retry_after_seconds),
        ),
        AgentError::Auth { kind } if kind.is_credential_failure() => (
            STATUS_UNAUTHORIZED,
            codes::UNAUTHENTICATED,
            "Authentication failed",
            None,
        ),
        _ => (
            STATUS_INTERNAL_ERROR,
            codes::INTERNAL_ERROR,
            "Internal server error",
            None,
        ),
    };

    let mut headers = security_headers();
    if let Some(seconds) = retry_after {
        headers.push(("Retry-After".to_string(), seconds.to_string()));
    }
    if status == STATUS_UNAUTHORIZED {
        headers.push(("WWW-Authenticate".to_string(), "Bearer".to_string()));
    }

    HttpReply {
        status,
        headers,
        body: json!({
            "success": false,
            "error": { "code": code, "message": message },
        }),
    }
}

fn security_headers() -> Vec<(String, String)> {
    vec![
        ("Content-Type".to_string(), "application/json".to_string()),
        ("X-Content-Type-Options".to_string(), "nosniff".to_string()),
        ("X-Frame-Options".to_string(), "DENY".to_string()),
    ]
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthMethod, CredentialStore, GatewayConfig};

    fn gateway() -> Gateway {
        let credentials = CredentialStore::new(Some("correct-token".to_string()), None).unwrap();
        Gateway::new(credentials, GatewayConfig::default())
    }

    fn headers(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn peer() -> Option<SocketAddr> {
        Some("192.0.2.10:51000".parse().unwrap())
    }

    #[test]
    fn test_header_name_case_insensitive() {
        let h = headers(&[("AUTHORIZATION", "Bearer x")]);
        assert_eq!(authorization_header(&h), Some("Bearer x"));
        assert_eq!(authorization_header(&headers(&[("Accept", "*/*")])), None);
    }

    #[tokio::test]
    async fn test_allowed_request_passes_through() {
        let gateway = gateway();
        let h = headers(&[("authorization", "Bearer correct-token")]);

        let grant = authorize(&gateway, "/api/status", peer(), &h).unwrap();
        assert_eq!(grant.via, AuthMethod::StaticSecret);
        assert_eq!(grant.identity.as_str(), "192.0.2.10");

        gateway.shutdown().await;
    }

    #[tokio::test]
    async fn test_bad_credential_is_401() {
        let gateway = gateway();
        let h = headers(&[("Authorization", "Bearer wrong")]);

        let reply = authorize(&gateway, "/api/status", peer(), &h).unwrap_err();
        assert_eq!(reply.status, STATUS_UNAUTHORIZED);
        assert_eq!(reply.header("www-authenticate"), Some("Bearer"));
        assert_eq!(reply.header("x-content-type-options"), Some("nosniff"));
        assert_eq!(reply.body["error"]["code"], codes::UNAUTHENTICATED);
        assert!(reply.header("Retry-After").is_none());

        gateway.shutdown().await;
    }

    #[tokio::test]
    async fn test_lockout_is_429_with_retry_after() {
        let gateway = gateway();
        let h = headers(&[("Authorization", "Bearer wrong")]);

        for _ in 0..4 {
            let reply = authorize(&gateway, "/api/status", peer(), &h).unwrap_err();
            assert_eq!(reply.status, STATUS_UNAUTHORIZED);
        }

        let reply = authorize(&gateway, "/api/status", peer(), &h).unwrap_err();
        assert_eq!(reply.status, STATUS_TOO_MANY_REQUESTS);
        assert_eq!(reply.header("Retry-After"), Some("900"));
        assert_eq!(reply.body["success"], false);

        gateway.shutdown().await;
    }

    #[test]
    fn test_internal_errors_are_500() {
        let reply = deny_reply(&AgentError::auth(AuthErrorKind::RandomnessFailure));
        assert_eq!(reply.status, STATUS_INTERNAL_ERROR);
        assert_eq!(reply.body["error"]["message"], "Internal server error");
    }
}
