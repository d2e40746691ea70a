//! Data directory and knowledge base location.

use super::EnvSource;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct StorageEnvConfig {
    pub data_dir: PathBuf,
    pub database_url: String,
}

impl StorageEnvConfig {
    pub(crate) fn load(source: &impl EnvSource) -> Self {
        let data_dir = PathBuf::from(source.string_or("DATA_DIR", "data"));
        let default_db = format!("sqlite://{}", data_dir.join("knowledge_base.db").display());
        Self {
            database_url: source.string_or("DATABASE_URL", &default_db),
            data_dir,
        }
    }

    pub fn status_path(&self) -> PathBuf {
        self.data_dir.join("optimization_status.json")
    }

    pub fn live_config_path(&self) -> PathBuf {
        self.data_dir.join("live_strategy_config.json")
    }

    pub fn memory_path(&self) -> PathBuf {
        self.data_dir.join("strategy_memory.json")
    }

    pub fn registry_path(&self) -> PathBuf {
        self.data_dir.join("parameter_registry.json")
    }

    pub fn analyzer_state_path(&self) -> PathBuf {
        self.data_dir.join("analyzer_state.json")
    }

    pub fn correlation_report_path(&self) -> PathBuf {
        self.data_dir.join("correlation_report.json")
    }
}
