//! Command registry for dispatching authorized calls to handlers.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::auth::Gateway;
use crate::error::{AgentError, CommandErrorKind};

use super::auth::{AuthenticateCommand, GetAuthStatusCommand, RevokeSessionsCommand};
use super::system::PingCommand;
use super::traits::Command;
use super::types::{CommandParams, CommandResult, ExecutionContext};

/// Registry of served methods keyed by fully-qualified method id.
#[derive(Clone)]
pub struct CommandRegistry {
    commands: HashMap<&'static str, Arc<dyn Command>>,
}

impl CommandRegistry {
    /// Create a registry with every built-in method.
    pub fn new(gateway: Arc<Gateway>) -> Self {
        let mut registry = Self {
            commands: HashMap::new(),
        };

        registry.register(Arc::new(PingCommand));

        registry.register(Arc::new(AuthenticateCommand::new(Arc::clone(&gateway))));
        registry.register(Arc::new(GetAuthStatusCommand::new(Arc::clone(&gateway))));
        registry.register(Arc::new(RevokeSessionsCommand::new(gateway)));

        info!(
            count = registry.commands.len(),
            "Command registry initialized"
        );

        registry
    }

    fn register(&mut self, command: Arc<dyn Command>) {
        let name = command.name();
        debug!(method = name, "Registering command");
        self.commands.insert(name, command);
    }

    /// Get a command by method id.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.get(name).cloned()
    }

    /// Validate and execute the command registered under `method`.
    pub fn dispatch(
        &self,
        ctx: &ExecutionContext,
        method: &str,
        params: CommandParams,
    ) -> Result<CommandResult, AgentError> {
        let command = self.commands.get(method).ok_or_else(|| AgentError::Command {
            kind: CommandErrorKind::UnknownMethod {
                name: method.to_string(),
            },
        })?;

        command.validate(&params)?;
        command.execute(ctx, params)
    }

    /// All registered method ids.
    pub fn list_methods(&self) -> Vec<&'static str> {
        let mut methods: Vec<_> = self.commands.keys().copied().collect();
        methods.sort_unstable();
        methods
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthMethod, AUTHENTICATE_METHOD};
    use crate::commands::auth::test_support::{context, gateway};

    #[tokio::test]
    async fn test_registry_has_methods() {
        let gateway = gateway();
        let registry = CommandRegistry::new(Arc::clone(&gateway));

        assert_eq!(
            registry.list_methods(),
            vec![
                AUTHENTICATE_METHOD,
                "/runixo.AgentService/GetAuthStatus",
                "/runixo.AgentService/Ping",
                "/runixo.AgentService/RevokeSessions",
            ]
        );
        assert!(registry.get("/runixo.AgentService/Nope").is_none());

        gateway.shutdown().await;
    }

    #[tokio::test]
    async fn test_dispatch_unknown_method() {
        let gateway = gateway();
        let registry = CommandRegistry::new(Arc::clone(&gateway));
        let ctx = context("127.0.0.1", AuthMethod::StaticSecret, "/x");

        let result = registry.dispatch(&ctx, "/x", CommandParams::new(serde_json::json!({})));
        assert!(matches!(
            result,
            Err(AgentError::Command {
                kind: CommandErrorKind::UnknownMethod { .. }
            })
        ));

        gateway.shutdown().await;
    }

    #[tokio::test]
    async fn test_dispatch_validates_first() {
        let gateway = gateway();
        let registry = CommandRegistry::new(Arc::clone(&gateway));
        let ctx = context(
            "127.0.0.1",
            AuthMethod::StaticSecret,
            "/runixo.AgentService/RevokeSessions",
        );

        let result = registry.dispatch(
            &ctx,
            "/runixo.AgentService/RevokeSessions",
            CommandParams::new(serde_json::json!({"token": 42})),
        );
        assert!(matches!(result, Err(AgentError::Validation { .. })));

        gateway.shutdown().await;
    }
}
