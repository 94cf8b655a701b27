//! Ping command for health checking.

use chrono::Utc;

use crate::error::AgentError;

use super::super::traits::Command;
use super::super::types::{CommandParams, CommandResult, ExecutionContext};

/// Returns a pong with the server time.
pub struct PingCommand;

impl Command for PingCommand {
    fn name(&self) -> &'static str {
        "/runixo.AgentService/Ping"
    }

    fn validate(&self, _params: &CommandParams) -> Result<(), AgentError> {
        Ok(())
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        _params: CommandParams,
    ) -> Result<CommandResult, AgentError> {
        Ok(CommandResult::success(serde_json::json!({
            "pong": true,
            "timestamp": Utc::now().timestamp(),
            "request_id": ctx.request_id.to_string(),
        })))
    }

    fn requires_audit(&self) -> bool {
        // High-frequency health check
        false
    }
}
