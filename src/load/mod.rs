// src/load/mod.rs

pub mod postgres;

pub use postgres::PostgresLoader;

use anyhow::Result;
use std::fmt;
use std::path::Path;

/// Whether a load wipes the target table first or appends to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteDisposition {
    Replace,
    Append,
}

impl WriteDisposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteDisposition::Replace => "replace",
            WriteDisposition::Append => "append",
        }
    }
}

/// What a load reported back. Logged by the driver, never used for control
/// flow.
#[derive(Debug, Clone)]
pub struct LoadSummary {
    pub table: String,
    pub load_id: String,
    pub rows: u64,
}

impl fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "loaded {} rows into {} (batch {})",
            self.rows, self.table, self.load_id
        )
    }
}

/// Seam for the warehouse. The pipeline only ever hands over a CSV file, a
/// target table, a batch identifier, and a disposition; everything else is
/// the loader's business.
pub trait WarehouseLoader {
    fn load_csv(
        &self,
        path: &Path,
        table: &str,
        load_id: &str,
        disposition: WriteDisposition,
    ) -> impl std::future::Future<Output = Result<LoadSummary>> + Send;
}
