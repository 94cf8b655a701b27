//! Authentication module.
//!
//! Handles static-secret verification, per-identity lockout, signed
//! delegated tokens and the session registry, composed behind the
//! [`Gateway`] checkpoint.

mod attempts;
mod credentials;
mod gateway;
mod identity;
mod session;
mod token;

pub use attempts::{AttemptRecord, AttemptTracker, LockoutPolicy, ReaperHandle};
pub use credentials::{
    constant_time_eq, load_secret, validate_token_format, CredentialStore,
    MIN_STATIC_SECRET_LENGTH,
};
pub use gateway::{
    extract_credential, AuthMethod, AuthRequest, DelegatedToken, Gateway, GatewayConfig,
    GatewayStats, Grant, AUTHENTICATE_METHOD, BEARER_PREFIX,
};
pub use identity::{Identity, UNKNOWN_IDENTITY};
pub use session::{Session, SessionRegistry};
pub use token::{verify_signature, SignedTokenPayload, SigningKey, TokenIssuer};
