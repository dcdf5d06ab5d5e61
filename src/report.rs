//! JSON report output.
//!
//! Every command emits its structured result over HTTP; when a report
//! directory is configured the same payload is also written to a
//! timestamped JSON file. Report failures are logged, never fatal.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

// ============================================================================
// Report Writer
// ============================================================================

/// Writes command results as pretty-printed JSON files.
#[derive(Debug, Clone, Default)]
pub struct ReportWriter {
    dir: Option<PathBuf>,
}

impl ReportWriter {
    /// A writer targeting `dir`; pass `None` to disable file output.
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    /// Serialize `value` to `<dir>/<prefix>_<timestamp>.json`.
    ///
    /// Returns the written path, or `None` when file output is disabled.
    pub fn write<T: Serialize>(&self, prefix: &str, value: &T) -> Result<Option<PathBuf>> {
        let Some(dir) = &self.dir else {
            return Ok(None);
        };

        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create report directory {}", dir.display()))?;

        let filename = format!("{}_{}.json", prefix, Utc::now().format("%Y%m%d_%H%M%S"));
        let path = dir.join(filename);

        let json = serde_json::to_string_pretty(value).context("Failed to serialize report")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write report {}", path.display()))?;

        info!(path = %path.display(), "Report written");
        Ok(Some(path))
    }

    /// Best-effort variant used by the HTTP handlers: logs and swallows
    /// failures so a full disk never turns into a 500.
    pub fn write_best_effort<T: Serialize>(&self, prefix: &str, value: &T) -> Option<PathBuf> {
        match self.write(prefix, value) {
            Ok(path) => path,
            Err(e) => {
                warn!(prefix, error = %e, "Failed to write report");
                None
            }
        }
    }

    /// Whether file output is enabled.
    pub fn enabled(&self) -> bool {
        self.dir.is_some()
    }

    /// The configured directory, if any.
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }
}

// ============================================================================
// Tests
// ============================================================================
