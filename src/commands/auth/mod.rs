//! Authentication management commands.

mod authenticate;
mod revoke;
mod status;

pub use authenticate::AuthenticateCommand;
pub use revoke::RevokeSessionsCommand;
pub use status::GetAuthStatusCommand;
