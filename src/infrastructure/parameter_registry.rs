//! Declared tunable parameters per (command, strategy).
//!
//! Loaded once at startup from `parameter_registry.json`:
//! `{command -> {strategy -> {param -> domain}}}`. An absent file is created with the
//! built-in defaults; a corrupt one is replaced by them.

use crate::domain::errors::RegistryError;
use crate::domain::optimization::{ParamValue, ParameterDefinition, ParameterSpace};
use crate::infrastructure::artifact_store::{read_json, write_json_atomic};
use anyhow::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Strategy key consulted when a command has no entry for the requested strategy.
pub const DEFAULT_STRATEGY_KEY: &str = "_default";

pub type RegistryDocument = BTreeMap<String, BTreeMap<String, ParameterSpace>>;

#[derive(Debug, Clone)]
pub struct ParameterRegistry {
    entries: RegistryDocument,
    file_path: Option<PathBuf>,
}

impl ParameterRegistry {
    /// In-memory registry, not backed by a file.
    pub fn from_document(entries: RegistryDocument) -> Self {
        Self {
            entries: sanitize(entries),
            file_path: None,
        }
    }

    pub fn with_defaults() -> Self {
        Self::from_document(default_document())
    }

    /// Loads the registry file, writing defaults back when it is absent or corrupt.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = match read_json::<RegistryDocument>(&path).await {
            Ok(Some(doc)) => {
                info!("ParameterRegistry: loaded {:?}", path);
                doc
            }
            Ok(None) => {
                info!("ParameterRegistry: {:?} absent, writing defaults", path);
                let doc = default_document();
                write_json_atomic(&path, &doc).await?;
                doc
            }
            Err(e) => {
                warn!(
                    "ParameterRegistry: {:?} is corrupt ({:#}), rewriting with defaults",
                    path, e
                );
                let doc = default_document();
                write_json_atomic(&path, &doc).await?;
                doc
            }
        };

        Ok(Self {
            entries: sanitize(entries),
            file_path: Some(path),
        })
    }

    /// Parameter space for `(command, strategy)`.
    ///
    /// Lookup order: exact strategy, then the command's `_default` entry, then the only
    /// strategy of a single-strategy command.
    pub fn get(&self, command: &str, strategy: &str) -> Option<&ParameterSpace> {
        let Some(strategies) = self.entries.get(command) else {
            warn!("ParameterRegistry: no parameters declared for command {}", command);
            return None;
        };

        if let Some(space) = strategies.get(strategy) {
            return Some(space);
        }
        if let Some(space) = strategies.get(DEFAULT_STRATEGY_KEY) {
            return Some(space);
        }
        if strategies.len() == 1 {
            return strategies.values().next();
        }

        warn!(
            "ParameterRegistry: no parameters declared for {}/{}",
            command, strategy
        );
        None
    }

    pub fn commands(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn strategies(&self, command: &str) -> Vec<&str> {
        self.entries
            .get(command)
            .map(|s| {
                s.keys()
                    .filter(|k| k.as_str() != DEFAULT_STRATEGY_KEY)
                    .map(String::as_str)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }
}

/// Checks one domain for internal consistency.
pub fn validate_definition(
    command: &str,
    strategy: &str,
    parameter: &str,
    definition: &ParameterDefinition,
) -> Result<(), RegistryError> {
    let reason = match definition {
        ParameterDefinition::Int { min, max, step } => {
            if min > max {
                Some(format!("min {} exceeds max {}", min, max))
            } else if *step <= 0 {
                Some(format!("step must be positive, got {}", step))
            } else {
                None
            }
        }
        ParameterDefinition::Float { min, max, step } => {
            if !min.is_finite() || !max.is_finite() || !step.is_finite() {
                Some("bounds and step must be finite".to_string())
            } else if min > max {
                Some(format!("min {} exceeds max {}", min, max))
            } else if *step <= 0.0 {
                Some(format!("step must be positive, got {}", step))
            } else {
                None
            }
        }
        ParameterDefinition::Enum { values } => {
            if values.is_empty() {
                Some("enum declares no values".to_string())
            } else {
                None
            }
        }
    };

    match reason {
        Some(reason) => Err(RegistryError::InvalidDomain {
            command: command.to_string(),
            strategy: strategy.to_string(),
            parameter: parameter.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Drops strategies with an invalid domain so the optimizer never samples from one.
fn sanitize(mut entries: RegistryDocument) -> RegistryDocument {
    for (command, strategies) in entries.iter_mut() {
        strategies.retain(|strategy, space| {
            for (parameter, definition) in space.iter() {
                if let Err(e) = validate_definition(command, strategy, parameter, definition) {
                    warn!("ParameterRegistry: ignoring {}/{}: {}", command, strategy, e);
                    return false;
                }
            }
            true
        });
    }
    entries
}

pub fn default_document() -> RegistryDocument {
    let mut backtest = BTreeMap::new();
    backtest.insert(
        "ma_crossover".to_string(),
        ParameterSpace::new()
            .with("short_ma", ParameterDefinition::int(5, 100, 1))
            .with("long_ma", ParameterDefinition::int(20, 250, 1)),
    );
    backtest.insert(
        "rsi_reversion".to_string(),
        ParameterSpace::new()
            .with("rsi_period", ParameterDefinition::int(5, 30, 1))
            .with("oversold", ParameterDefinition::float(15.0, 40.0, 0.5))
            .with("overbought", ParameterDefinition::float(60.0, 85.0, 0.5)),
    );
    backtest.insert(
        "momentum_breakout".to_string(),
        ParameterSpace::new()
            .with("lookback", ParameterDefinition::int(10, 120, 5))
            .with("exit_lookback", ParameterDefinition::int(5, 60, 5))
            .with(
                "confirm_close",
                ParameterDefinition::enumeration(vec![
                    ParamValue::Bool(true),
                    ParamValue::Bool(false),
                ]),
            ),
    );
    backtest.insert(
        "bollinger_reversion".to_string(),
        ParameterSpace::new()
            .with("period", ParameterDefinition::int(10, 50, 1))
            .with("num_std", ParameterDefinition::float(1.0, 3.0, 0.1)),
    );

    let mut doc = RegistryDocument::new();
    doc.insert("backtest".to_string(), backtest);
    doc
}
