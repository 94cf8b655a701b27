//! Command trait definition.

use crate::error::AgentError;

use super::types::{CommandParams, CommandResult, ExecutionContext};

/// A method the agent serves once a call is through the checkpoint.
///
/// # Example
///
/// ```ignore
/// pub struct EchoCommand;
///
/// impl Command for EchoCommand {
///     fn name(&self) -> &'static str {
///         "/runixo.AgentService/Echo"
///     }
///
///     fn validate(&self, params: &CommandParams) -> Result<(), AgentError> {
///         params.require_string("text")
///     }
///
///     fn execute(
///         &self,
///         _ctx: &ExecutionContext,
///         params: CommandParams,
///     ) -> Result<CommandResult, AgentError> {
///         let text = params.get_string("text")?;
///         Ok(CommandResult::success(serde_json::json!({ "text": text })))
///     }
/// }
/// ```
pub trait Command: Send + Sync {
    /// Fully-qualified method identifier the command is registered under.
    fn name(&self) -> &'static str;

    /// Check parameters before `execute` runs.
    fn validate(&self, params: &CommandParams) -> Result<(), AgentError>;

    /// Run the command.
    ///
    /// Called from `spawn_blocking`.
    fn execute(
        &self,
        ctx: &ExecutionContext,
        params: CommandParams,
    ) -> Result<CommandResult, AgentError>;

    /// Whether calls to this command are written to the audit log.
    fn requires_audit(&self) -> bool {
        true
    }
}
