use super::command_registry::CommandRegistry;
use crate::application::knowledge_base::KnowledgeBase;
use crate::domain::errors::DispatchError;
use crate::domain::knowledge::CommandLogEntry;
use crate::domain::ports::{Command, CommandArgs};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Invokes registered commands by name under a timeout and records every call.
pub struct CommandDispatcher {
    registry: RwLock<CommandRegistry>,
    timeout: Duration,
    knowledge_base: Option<KnowledgeBase>,
}

impl CommandDispatcher {
    pub fn new(
        registry: CommandRegistry,
        timeout: Duration,
        knowledge_base: Option<KnowledgeBase>,
    ) -> Self {
        Self {
            registry: RwLock::new(registry),
            timeout,
            knowledge_base,
        }
    }

    pub async fn register(&self, command: Arc<dyn Command>) {
        self.registry.write().await.register(command);
    }

    pub async fn unregister(&self, name: &str) -> bool {
        self.registry.write().await.unregister(name).is_some()
    }

    pub async fn command_names(&self) -> Vec<String> {
        self.registry.read().await.names()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs `name` with `args`.
    ///
    /// Outputs whose `status` is present and not `"success"` are returned as-is but logged
    /// as unsuccessful.
    pub async fn dispatch(
        &self,
        name: &str,
        args: CommandArgs,
        context: Value,
    ) -> Result<Value, DispatchError> {
        let started = Instant::now();
        let command = self.registry.read().await.resolve(name);

        let result = match command {
            None => Err(DispatchError::UnknownCommand {
                name: name.to_string(),
            }),
            Some(command) => match tokio::time::timeout(self.timeout, command.invoke(&args)).await
            {
                Ok(Ok(output)) => Ok(output),
                Ok(Err(e)) => Err(DispatchError::Failed {
                    name: name.to_string(),
                    reason: format!("{:#}", e),
                }),
                Err(_) => Err(DispatchError::Timeout {
                    name: name.to_string(),
                    duration_ms: self.timeout.as_millis() as u64,
                }),
            },
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        let (success, output) = match &result {
            Ok(output) => (
                output
                    .get("status")
                    .and_then(Value::as_str)
                    .is_none_or(|s| s == "success"),
                output.clone(),
            ),
            Err(e) => (false, json!({ "error": e.to_string() })),
        };

        match &result {
            Ok(_) => debug!("Dispatcher: {} finished in {}ms", name, duration_ms),
            Err(e) => warn!("Dispatcher: {}", e),
        }

        if let Some(kb) = &self.knowledge_base {
            let entry = CommandLogEntry::new(
                name,
                Value::Object(args),
                context,
                &output,
                success,
                duration_ms,
            );
            if let Err(e) = kb.log_execution(&entry).await {
                warn!("Dispatcher: failed to log {} execution: {:#}", name, e);
            }
        }

        result
    }
}
