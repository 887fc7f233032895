// src/pipeline.rs

use anyhow::{Context, Result};
use reqwest::Client;
use std::fs;
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::fetch::{self, FetchOutcome};
use crate::history::History;
use crate::load::{WarehouseLoader, WriteDisposition};
use crate::periods::Period;
use crate::process;
use crate::workspace;

/// What became of one period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeriodStatus {
    Loaded { chunks: usize, rows: u64 },
    Skipped { reason: String },
    Failed { reason: String },
}

#[derive(Debug, Clone)]
pub struct PeriodOutcome {
    pub period: Period,
    pub status: PeriodStatus,
}

/// Aggregated outcomes of one run. Failures are carried here instead of
/// being logged and forgotten at the point they happen.
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<PeriodOutcome>,
}

impl RunReport {
    pub fn loaded(&self) -> usize {
        self.count(|s| matches!(s, PeriodStatus::Loaded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, PeriodStatus::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, PeriodStatus::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&PeriodStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }

    pub fn log_summary(&self) {
        info!(
            loaded = self.loaded(),
            skipped = self.skipped(),
            failed = self.failed(),
            "run complete"
        );
        for outcome in &self.outcomes {
            match &outcome.status {
                PeriodStatus::Loaded { chunks, rows } => {
                    info!(period = %outcome.period, chunks, rows, "loaded");
                }
                PeriodStatus::Skipped { reason } => {
                    info!(period = %outcome.period, reason, "skipped");
                }
                PeriodStatus::Failed { reason } => {
                    error!(period = %outcome.period, reason, "failed");
                }
            }
        }
    }
}

/// Sequential per-period driver: fetch and extract, split into chunks, load
/// each chunk, clean the scratch directories. One period at a time, one
/// chunk at a time; the scratch directories are owned exclusively for the
/// whole run.
pub struct Pipeline<'a, L> {
    client: Client,
    config: &'a Config,
    loader: L,
    history: History,
}

impl<'a, L: WarehouseLoader> Pipeline<'a, L> {
    pub fn new(client: Client, config: &'a Config, loader: L, history: History) -> Self {
        Pipeline {
            client,
            config,
            loader,
            history,
        }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Process every period in order. A failing period never aborts the
    /// run; its outcome is recorded and the loop moves on.
    pub async fn run(&self, periods: &[Period]) -> Result<RunReport> {
        let processed = self.history.load_processed()?;

        let mut report = RunReport::default();
        for &period in periods {
            let status = if !self.config.reprocess && processed.contains(&period.to_string()) {
                info!(%period, "already loaded, skipping");
                PeriodStatus::Skipped {
                    reason: "already loaded".to_string(),
                }
            } else {
                match self.process_period(period).await {
                    Ok(status) => status,
                    Err(e) => {
                        error!(%period, "period failed: {:#}", e);
                        PeriodStatus::Failed {
                            reason: format!("{e:#}"),
                        }
                    }
                }
            };
            report.outcomes.push(PeriodOutcome { period, status });
        }
        Ok(report)
    }

    async fn process_period(&self, period: Period) -> Result<PeriodStatus> {
        info!(%period, "processing");

        if self.config.fetch_archives {
            let fetched = self.fetch_and_split(period).await;

            // Clean the unzip scratch on the failure path too: a failed
            // split would otherwise leave its CSV behind and the next
            // period's extraction would see two source files.
            workspace::clean_dir(&self.config.unzip_dir)?;
            match fetched {
                Ok(true) => {}
                Ok(false) => {
                    return Ok(PeriodStatus::Skipped {
                        reason: "archive not published".to_string(),
                    });
                }
                Err(e) => {
                    workspace::clean_dir(&self.config.split_dir)?;
                    return Err(e);
                }
            }
        }

        let load_id = format!("flights_{period}");
        let loaded = self.load_chunks(&load_id).await;

        // Post-clean runs on the failure path too so the next period starts
        // from an empty split directory.
        workspace::clean_dir(&self.config.split_dir)?;

        let (chunks, rows) = loaded?;
        self.history
            .record_processed(&period.to_string(), chunks, rows)?;
        Ok(PeriodStatus::Loaded { chunks, rows })
    }

    /// Download and split one period's archive. `Ok(false)` means the
    /// archive is not published yet.
    async fn fetch_and_split(&self, period: Period) -> Result<bool> {
        match fetch::download_archive(
            &self.client,
            &self.config.base_url,
            &period,
            &self.config.unzip_dir,
        )
        .await?
        {
            FetchOutcome::Missing => Ok(false),
            FetchOutcome::Extracted(files) => {
                info!(%period, files = files.len(), "extracted archive");
                process::split_csv(
                    &self.config.unzip_dir,
                    &self.config.split_dir,
                    self.config.chunk_size,
                )?;
                Ok(true)
            }
        }
    }

    /// Load every chunk in the split directory in ascending numeric order.
    /// The first loader error aborts the remaining chunks of this period.
    async fn load_chunks(&self, load_id: &str) -> Result<(usize, u64)> {
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.config.split_dir)
            .with_context(|| {
                format!("reading split directory {}", self.config.split_dir.display())
            })?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        paths.sort_by_key(|p| {
            p.file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(u64::MAX)
        });

        let mut chunks = 0;
        let mut rows = 0u64;
        for path in paths {
            let is_csv = path
                .extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
            if !is_csv {
                warn!(path = %path.display(), "skipping non-CSV entry");
                continue;
            }

            let summary = self
                .loader
                .load_csv(&path, &self.config.table, load_id, WriteDisposition::Append)
                .await
                .with_context(|| format!("loading chunk {}", path.display()))?;
            info!(%summary, "chunk loaded");
            chunks += 1;
            rows += summary.rows;
        }
        Ok((chunks, rows))
    }
}
