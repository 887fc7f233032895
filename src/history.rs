// src/history.rs

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use tracing::warn;

/// One successfully loaded period, as recorded in the ledger.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub period: String,
    pub chunks: usize,
    pub rows: u64,
    pub at: DateTime<Utc>,
}

/// Append-only JSON-lines ledger of processed periods. The driver consults
/// it on startup so re-running the tool does not re-load months that are
/// already in the warehouse.
pub struct History {
    path: PathBuf,
}

impl History {
    /// Open (or create) the ledger under `history_dir`.
    pub fn new(history_dir: impl Into<PathBuf>) -> Result<Self> {
        let history_dir = history_dir.into();
        fs::create_dir_all(&history_dir)
            .with_context(|| format!("creating history directory {}", history_dir.display()))?;
        Ok(Self {
            path: history_dir.join("processed.jsonl"),
        })
    }

    /// Record a successful load for `period`.
    pub fn record_processed(&self, period: &str, chunks: usize, rows: u64) -> Result<()> {
        let record = ProcessedRecord {
            period: period.to_string(),
            chunks,
            rows,
            at: Utc::now(),
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;
        let line = serde_json::to_string(&record).context("serializing history record")?;
        writeln!(file, "{line}").with_context(|| format!("appending to {}", self.path.display()))?;
        Ok(())
    }

    /// All distinct period strings ever recorded. Unparseable lines are
    /// logged and skipped so a damaged ledger never blocks a run.
    pub fn load_processed(&self) -> Result<HashSet<String>> {
        let mut set = HashSet::new();
        if !self.path.exists() {
            return Ok(set);
        }
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        for (n, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ProcessedRecord>(line) {
                Ok(record) => {
                    set.insert(record.period);
                }
                Err(e) => warn!(line = n + 1, "skipping bad history line: {}", e),
            }
        }
        Ok(set)
    }
}
