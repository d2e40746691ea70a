use crate::domain::ports::Command;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Name → command lookup table.
#[derive(Default, Clone)]
pub struct CommandRegistry {
    commands: BTreeMap<String, Arc<dyn Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `command` under its own name, replacing any previous holder of that name.
    pub fn register(&mut self, command: Arc<dyn Command>) -> Option<Arc<dyn Command>> {
        let name = command.name().to_string();
        info!("CommandRegistry: registered {}", name);
        self.commands.insert(name, command)
    }

    pub fn unregister(&mut self, name: &str) -> Option<Arc<dyn Command>> {
        let removed = self.commands.remove(name);
        if removed.is_some() {
            info!("CommandRegistry: unregistered {}", name);
        }
        removed
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.commands.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
