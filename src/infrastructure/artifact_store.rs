//! Atomic JSON artifacts consumed by external status/UI layers.
//!
//! Every write goes to a sibling `.tmp` file which is then renamed over the target, so a
//! reader sees either the previous document or the new one, never a partial write.

use crate::domain::market::LiveStrategyConfig;
use crate::domain::monitoring::{AnalyzerState, CorrelationReport};
use crate::domain::optimization::OptimizationStatus;
use crate::domain::ports::{LiveConfigSink, StatusSink};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Serializes `value` and atomically replaces `path` with it.
pub async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value).context("Failed to serialize artifact")?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }

    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, content)
        .await
        .with_context(|| format!("Failed to write temp file {:?}", temp_path))?;
    fs::rename(&temp_path, path)
        .await
        .with_context(|| format!("Failed to rename temp file onto {:?}", path))?;

    debug!("Wrote artifact {:?}", path);
    Ok(())
}

/// Reads a JSON document. Missing files are `Ok(None)`; malformed ones are errors.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {:?}", path)),
    };
    let value =
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))?;
    Ok(Some(value))
}

/// Reads a JSON document, treating missing or malformed files as absent.
pub async fn read_json_lenient<T: DeserializeOwned>(path: &Path) -> Option<T> {
    match read_json(path).await {
        Ok(value) => value,
        Err(e) => {
            warn!("Ignoring unreadable artifact {:?}: {:#}", path, e);
            None
        }
    }
}

/// Continuously overwritten optimization status file.
pub struct JsonStatusFile {
    path: PathBuf,
}

impl JsonStatusFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn read(&self) -> Option<OptimizationStatus> {
        read_json_lenient(&self.path).await
    }
}

#[async_trait]
impl StatusSink for JsonStatusFile {
    async fn publish(&self, status: &OptimizationStatus) -> Result<()> {
        write_json_atomic(&self.path, status).await
    }
}

/// Live strategy configuration file, overwritten per autonomous cycle.
pub struct JsonLiveConfigFile {
    path: PathBuf,
}

impl JsonLiveConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn read(&self) -> Option<LiveStrategyConfig> {
        read_json_lenient(&self.path).await
    }
}

#[async_trait]
impl LiveConfigSink for JsonLiveConfigFile {
    async fn publish(&self, config: &LiveStrategyConfig) -> Result<()> {
        write_json_atomic(&self.path, config).await
    }
}

/// Analyzer activation flag and interval, shared with whoever toggles it.
#[derive(Clone)]
pub struct AnalyzerStateFile {
    path: PathBuf,
}

impl AnalyzerStateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Current state; missing or unreadable files yield the defaults.
    pub async fn load(&self) -> AnalyzerState {
        read_json_lenient(&self.path).await.unwrap_or_default()
    }

    pub async fn save(&self, state: &AnalyzerState) -> Result<()> {
        write_json_atomic(&self.path, state).await
    }

    /// Read-modify-write helper.
    pub async fn update<F>(&self, apply: F) -> Result<AnalyzerState>
    where
        F: FnOnce(&mut AnalyzerState),
    {
        let mut state = self.load().await;
        apply(&mut state);
        self.save(&state).await?;
        Ok(state)
    }
}

#[derive(Clone)]
pub struct CorrelationReportFile {
    path: PathBuf,
}

impl CorrelationReportFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn read(&self) -> Option<CorrelationReport> {
        read_json_lenient(&self.path).await
    }

    pub async fn write(&self, report: &CorrelationReport) -> Result<()> {
        write_json_atomic(&self.path, report).await
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    /// Fresh, unique temp directory for a test.
    pub fn temp_dir(label: &str) -> PathBuf {
        let unique_id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!(
            "adaptive_tuner_{}_{}_{}_{}",
            label,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0),
            unique_id
        ));
        std::fs::create_dir_all(&dir).expect("Failed to create test temp dir");
        dir
    }

    pub fn cleanup(dir: PathBuf) {
        std::fs::remove_dir_all(dir).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{cleanup, temp_dir};
    use super::*;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_atomic_write_replaces_and_leaves_no_temp() {
        let dir = temp_dir("artifact");
        let path = dir.join("nested").join("doc.json");

        let mut doc = BTreeMap::new();
        doc.insert("a".to_string(), 1);
        write_json_atomic(&path, &doc).await.unwrap();
        doc.insert("a".to_string(), 2);
        write_json_atomic(&path, &doc).await.unwrap();

        let loaded: BTreeMap<String, i32> = read_json(&path).await.unwrap().unwrap();
        assert_eq!(loaded["a"], 2);
        assert!(!path.with_extension("tmp").exists());
        cleanup(dir);
    }

    #[tokio::test]
    async fn test_lenient_read_of_corrupt_file() {
        let dir = temp_dir("artifact_corrupt");
        let path = dir.join("doc.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(read_json::<BTreeMap<String, i32>>(&path).await.is_err());
        assert!(read_json_lenient::<BTreeMap<String, i32>>(&path).await.is_none());
        assert!(
            read_json::<BTreeMap<String, i32>>(&dir.join("missing.json"))
                .await
                .unwrap()
                .is_none()
        );
        cleanup(dir);
    }

    #[tokio::test]
    async fn test_analyzer_state_update_round_trip() {
        let dir = temp_dir("analyzer_state");
        let file = AnalyzerStateFile::new(dir.join("analyzer_state.json"));

        assert!(!file.load().await.active);
        file.update(|s| {
            s.active = true;
            s.interval_hours = 2.5;
        })
        .await
        .unwrap();

        let state = file.load().await;
        assert!(state.active);
        assert_eq!(state.interval_hours, 2.5);
        cleanup(dir);
    }
}
