//! Authentication status for operators.

use std::sync::Arc;

use crate::auth::Gateway;
use crate::error::AgentError;

use super::super::traits::Command;
use super::super::types::{CommandParams, CommandResult, ExecutionContext};

/// `GetAuthStatus`: session and lockout counters plus the caller's own view.
pub struct GetAuthStatusCommand {
    gateway: Arc<Gateway>,
}

impl GetAuthStatusCommand {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }
}

impl Command for GetAuthStatusCommand {
    fn name(&self) -> &'static str {
        "/runixo.AgentService/GetAuthStatus"
    }

    fn validate(&self, _params: &CommandParams) -> Result<(), AgentError> {
        Ok(())
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        _params: CommandParams,
    ) -> Result<CommandResult, AgentError> {
        let stats = self.gateway.stats();

        Ok(CommandResult::success(serde_json::json!({
            "active_sessions": stats.active_sessions,
            "tracked_identities": stats.tracked_identities,
            "secret_generated": stats.secret_generated,
            "caller": {
                "identity": ctx.identity.as_str(),
                "via": ctx.via,
            },
        })))
    }

    fn requires_audit(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthMethod, Identity};
    use crate::commands::auth::test_support::{context, gateway, SECRET};

    #[tokio::test]
    async fn test_reports_counters() {
        let gateway = gateway();
        gateway
            .authenticate(&Identity::new("10.2.0.1"), Some(SECRET))
            .unwrap();
        gateway
            .authenticate(&Identity::new("10.2.0.2"), Some("wrong"))
            .unwrap_err();

        let cmd = GetAuthStatusCommand::new(Arc::clone(&gateway));
        let ctx = context("10.2.0.1", AuthMethod::StaticSecret, cmd.name());
        let data = cmd
            .execute(&ctx, CommandParams::new(serde_json::json!({})))
            .unwrap()
            .data
            .unwrap();

        assert_eq!(data["active_sessions"], 1);
        assert_eq!(data["tracked_identities"], 1);
        assert_eq!(data["secret_generated"], false);
        assert_eq!(data["caller"]["via"], "static_secret");
        assert!(!cmd.requires_audit());

        gateway.shutdown().await;
    }
}
