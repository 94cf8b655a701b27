//! Caller identity derived from the transport peer address.

use std::fmt;
use std::net::SocketAddr;

/// Identity used when the transport cannot supply a peer address.
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// Unit of attempt tracking and lockout.
///
/// Only the IP address is used; the source port changes with every
/// connection and would let a client reset its own counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    /// Wrap an already-derived identity string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Derive an identity from a peer address.
    pub fn from_peer(peer: Option<SocketAddr>) -> Self {
        match peer {
            Some(addr) => Self(addr.ip().to_canonical().to_string()),
            None => Self(UNKNOWN_IDENTITY.to_string()),
        }
    }

    /// The identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_is_ignored() {
        let a = Identity::from_peer(Some("192.0.2.7:40000".parse().unwrap()));
        let b = Identity::from_peer(Some("192.0.2.7:40001".parse().unwrap()));
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "192.0.2.7");
    }

    #[test]
    fn test_mapped_ipv6_is_canonical() {
        let mapped = Identity::from_peer(Some("[::ffff:192.0.2.7]:9000".parse().unwrap()));
        assert_eq!(mapped.as_str(), "192.0.2.7");
    }

    #[test]
    fn test_missing_peer() {
        assert_eq!(Identity::from_peer(None).as_str(), UNKNOWN_IDENTITY);
    }
}
