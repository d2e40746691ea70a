use thiserror::Error;

/// Errors raised while resolving or invoking a named command
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Unknown command: {name}")]
    UnknownCommand { name: String },

    #[error("Command {name} timed out after {duration_ms}ms")]
    Timeout { name: String, duration_ms: u64 },

    #[error("Command {name} failed: {reason}")]
    Failed { name: String, reason: String },
}

/// Errors related to declared parameter domains
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Invalid domain for {command}/{strategy}.{parameter}: {reason}")]
    InvalidDomain {
        command: String,
        strategy: String,
        parameter: String,
        reason: String,
    },
}

/// Errors related to strategy signal plugins
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Unknown strategy plugin: {name}")]
    UnknownPlugin { name: String },

    #[error("Strategy plugin {name} has external provenance and external plugins are disabled")]
    UntrustedPlugin { name: String },

    #[error("Invalid parameter {parameter} for plugin {plugin}: {reason}")]
    InvalidParameter {
        plugin: String,
        parameter: String,
        reason: String,
    },

    #[error("Insufficient data: need {needed} bars, got {available}")]
    InsufficientData { needed: usize, available: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_error_formatting() {
        let error = DispatchError::Timeout {
            name: "backtest".to_string(),
            duration_ms: 30000,
        };
        let msg = error.to_string();
        assert!(msg.contains("backtest"));
        assert!(msg.contains("30000"));
    }

    #[test]
    fn test_plugin_error_formatting() {
        let error = PluginError::InsufficientData {
            needed: 200,
            available: 40,
        };
        assert_eq!(error.to_string(), "Insufficient data: need 200 bars, got 40");
    }
}
