// src/config.rs

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::periods::Period;

/// BTS PREZIP prefix for the on-time performance archives; the period string
/// and `.zip` are appended to form the download URL.
const DEFAULT_BASE_URL: &str =
    "https://transtats.bts.gov/PREZIP/On_Time_Reporting_Carrier_On_Time_Performance_(1987_present)_";

/// Run configuration, loadable from YAML. Every field has a default so an
/// empty file (or no file at all) is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub base_url: String,
    /// Scratch space for extracted archives.
    pub unzip_dir: PathBuf,
    /// Scratch space for chunk files.
    pub split_dir: PathBuf,
    pub history_dir: PathBuf,
    /// Maximum data lines per chunk file.
    pub chunk_size: usize,
    pub start_year: i32,
    pub start_month: u32,
    /// Optional explicit end of the range; both or neither must be set.
    /// When unset the range ends three months before today.
    pub end_year: Option<i32>,
    pub end_month: Option<u32>,
    /// When false, skip download/split and load whatever is already in
    /// `split_dir`.
    pub fetch_archives: bool,
    /// When true, re-load periods the history ledger already records.
    pub reprocess: bool,
    /// Warehouse schema for the flight data.
    pub dataset: String,
    /// Target table for the chunk loads.
    pub table: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_url: DEFAULT_BASE_URL.to_string(),
            unzip_dir: PathBuf::from("unzipped"),
            split_dir: PathBuf::from("splits"),
            history_dir: PathBuf::from("history"),
            chunk_size: 100_000,
            start_year: 2018,
            start_month: 1,
            end_year: None,
            end_month: None,
            fetch_archives: true,
            reprocess: false,
            dataset: "src_flights".to_string(),
            table: "performance".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            bail!("chunk_size must be at least 1");
        }
        if self.base_url.is_empty() {
            bail!("base_url must not be empty");
        }
        self.start_period()?;
        self.end_period()?;
        Ok(())
    }

    pub fn start_period(&self) -> Result<Period> {
        Period::new(self.start_year, self.start_month).context("invalid start period")
    }

    pub fn end_period(&self) -> Result<Option<Period>> {
        match (self.end_year, self.end_month) {
            (None, None) => Ok(None),
            (Some(year), Some(month)) => {
                Ok(Some(Period::new(year, month).context("invalid end period")?))
            }
            _ => bail!("end_year and end_month must be set together"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.chunk_size, 100_000);
        assert!(config.fetch_archives);
        assert!(config.end_period().unwrap().is_none());
    }

    #[test]
    fn partial_yaml_overrides_defaults() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "chunk_size: 500")?;
        writeln!(file, "start_year: 2024")?;
        writeln!(file, "start_month: 10")?;

        let config = Config::load(file.path())?;
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.start_period()?.to_string(), "2024_10");
        assert_eq!(config.split_dir, PathBuf::from("splits"));
        Ok(())
    }

    #[test]
    fn unknown_fields_are_rejected() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "chunk_sz: 500")?;
        assert!(Config::load(file.path()).is_err());
        Ok(())
    }

    #[test]
    fn unpaired_end_fields_are_rejected() {
        let config = Config {
            end_year: Some(2024),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let config = Config {
            chunk_size: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_start_month_is_rejected() {
        let config = Config {
            start_month: 13,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
