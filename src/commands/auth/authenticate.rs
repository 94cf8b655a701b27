//! Bootstrap exchange of the static secret for a delegated token.

use std::sync::Arc;

use crate::auth::{Gateway, AUTHENTICATE_METHOD};
use crate::error::AgentError;

use super::super::traits::Command;
use super::super::types::{CommandParams, CommandResult, ExecutionContext};

/// `Authenticate`: the only method reachable without a credential.
///
/// The presented secret goes through [`Gateway::authenticate`], so a caller
/// guessing here is locked out exactly like one guessing on any other method.
pub struct AuthenticateCommand {
    gateway: Arc<Gateway>,
}

impl AuthenticateCommand {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }
}

impl Command for AuthenticateCommand {
    fn name(&self) -> &'static str {
        AUTHENTICATE_METHOD
    }

    fn validate(&self, params: &CommandParams) -> Result<(), AgentError> {
        // A missing token is left to the gateway so it counts as a failure.
        params.optional_string_type("token")
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        params: CommandParams,
    ) -> Result<CommandResult, AgentError> {
        let presented = params.get_optional_string("token");
        let delegated = self
            .gateway
            .authenticate(&ctx.identity, presented.as_deref())?;

        Ok(CommandResult::success(serde_json::to_value(delegated)?))
    }
}
