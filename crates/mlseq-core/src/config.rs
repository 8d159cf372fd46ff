//! Pipeline and backend configuration.
//!
//! Configuration is a JSON document; every field is optional and falls back
//! to the defaults below. Environment variables override the backend
//! endpoints:
//!
//! - `MLSEQ_BACKEND_URL`: primary conversion service URL
//! - `MLSEQ_BACKUP_URL`: backup URL tried when model discovery fails

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{PipelineError, PipelineResult};

/// Default primary conversion service URL.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";

/// Environment variable overriding the primary backend URL.
pub const BACKEND_URL_ENV: &str = "MLSEQ_BACKEND_URL";

/// Environment variable overriding the backup backend URL.
pub const BACKUP_URL_ENV: &str = "MLSEQ_BACKUP_URL";

/// Segmentation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitOptions {
    /// Silent gap (ticks) that must be exceeded to close a chunk.
    pub min_rest: u32,
    /// Notes a chunk must hold before a gap closes it.
    pub min_notes: usize,
    /// Soft cap on notes per chunk.
    pub max_notes: usize,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            min_rest: 0,
            min_notes: 1,
            max_notes: 30,
        }
    }
}

/// Timing and retry policy of the conversion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Debounce window after a track edit.
    pub debounce_ms: u64,
    /// Debounce window after a forced reconversion.
    pub reset_debounce_ms: u64,
    /// Wait before retrying a failed conversion.
    pub retry_backoff_ms: u64,
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    /// Ticks per quarter note of encoded payloads.
    pub timebase: u16,
    /// Segmentation parameters.
    pub split: SplitOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 2000,
            reset_debounce_ms: 1000,
            retry_backoff_ms: 1000,
            max_retries: 1,
            timebase: 480,
            split: SplitOptions::default(),
        }
    }
}

impl PipelineConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn reset_debounce(&self) -> Duration {
        Duration::from_millis(self.reset_debounce_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Conversion service endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Primary service URL.
    pub url: String,
    /// Optional backup URL.
    pub backup_url: Option<String>,
    /// Per-request timeout; none means wait until cancelled.
    pub request_timeout_ms: Option<u64>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_BACKEND_URL.to_string(),
            backup_url: None,
            request_timeout_ms: None,
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

/// Full configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub backend: BackendConfig,
}

impl Config {
    /// Loads a configuration file.
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| PipelineError::Config {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Loads the file if given, otherwise defaults; then applies env overrides.
    pub fn resolve(path: Option<&Path>) -> PipelineResult<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Applies `MLSEQ_BACKEND_URL` / `MLSEQ_BACKUP_URL`.
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var(BACKEND_URL_ENV).ok(),
            std::env::var(BACKUP_URL_ENV).ok(),
        );
    }

    fn apply_overrides(&mut self, url: Option<String>, backup: Option<String>) {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.backend.url = url;
        }
        if let Some(backup) = backup.filter(|u| !u.trim().is_empty()) {
            self.backend.backup_url = Some(backup);
        }
    }
}
