//! Session revocation.

use std::sync::Arc;

use tracing::info;

use crate::auth::Gateway;
use crate::error::AgentError;

use super::super::traits::Command;
use super::super::types::{CommandParams, CommandResult, ExecutionContext};

/// `RevokeSessions`: drop one delegated session by token, or all of them.
///
/// Used when the static secret is rotated.
pub struct RevokeSessionsCommand {
    gateway: Arc<Gateway>,
}

impl RevokeSessionsCommand {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }
}

impl Command for RevokeSessionsCommand {
    fn name(&self) -> &'static str {
        "/runixo.AgentService/RevokeSessions"
    }

    fn validate(&self, params: &CommandParams) -> Result<(), AgentError> {
        params.optional_string_type("token")
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        params: CommandParams,
    ) -> Result<CommandResult, AgentError> {
        let revoked = match params.get_optional_string("token") {
            Some(token) => usize::from(self.gateway.revoke_session(&token)),
            None => self.gateway.revoke_all_sessions(),
        };

        info!(
            request_id = %ctx.request_id,
            identity = %ctx.identity,
            revoked,
            "Sessions revoked"
        );

        Ok(CommandResult::success(serde_json::json!({ "revoked": revoked })))
    }
}
