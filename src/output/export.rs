//! JSON export of a completed run

use crate::defaults::TEST_VERSION;
use crate::error::{AppError, Result};
use crate::models::RunResults;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Snapshot written to disk after a run
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument<'a> {
    pub timestamp: DateTime<Utc>,
    pub test_version: &'static str,
    pub server_url: &'a str,
    #[serde(flatten)]
    pub results: &'a RunResults,
}

/// Writes run results as pretty-printed JSON
#[derive(Debug, Clone)]
pub struct ResultExporter {
    path: PathBuf,
}

impl ResultExporter {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document<'a>(&self, results: &'a RunResults, server_url: &'a str) -> ExportDocument<'a> {
        ExportDocument {
            timestamp: Utc::now(),
            test_version: TEST_VERSION,
            server_url,
            results,
        }
    }

    /// Serialize `results` and write them to the configured path, replacing any existing file
    pub async fn write(&self, results: &RunResults, server_url: &str) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.document(results, server_url))?;

        tokio::fs::write(&self.path, json).await.map_err(|e| {
            AppError::io(format!("Failed to write results to {}: {}", self.path.display(), e))
        })
    }
}
