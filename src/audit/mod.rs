//! Audit logging module.
//!
//! Every checkpoint decision and dispatched method can be written as one
//! JSON object per line. Credentials never reach the log: params pass
//! through [`sanitize_params`] and command output is not recorded.

mod entry;
mod logger;
mod sanitize;

pub use entry::{AuditEntry, AuditOutcome};
pub use logger::AuditLogger;
pub use sanitize::sanitize_params;
