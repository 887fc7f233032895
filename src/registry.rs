// src/registry.rs

use anyhow::{Context, Result};
use glob::glob;
use std::path::Path;
use tracing::{info, warn};

use crate::load::{LoadSummary, WarehouseLoader, WriteDisposition};

/// FAA aircraft registry release files. Each is a headered CSV despite the
/// `.txt` extension, and each maps to one reference table.
pub const REGISTRY_TABLES: &[&str] = &[
    "ACFTREF", "DEALER", "DOCINDEX", "ENGINE", "MASTER", "RESERVED",
];

/// Refresh every reference table from the files found under `data_dir`.
/// Files are matched as `*{NAME}.txt`; a table with no matching file is
/// logged and skipped. When a table matches several files the first one
/// loads with a replace disposition and the rest append, so a multi-file
/// release refreshes the table as one batch.
pub async fn load_registry<L: WarehouseLoader>(
    loader: &L,
    data_dir: &Path,
) -> Result<Vec<LoadSummary>> {
    let mut summaries = Vec::new();
    for &name in REGISTRY_TABLES {
        let pattern = format!("{}/*{}.txt", data_dir.display(), name);
        let mut matches: Vec<_> = glob(&pattern)
            .with_context(|| format!("bad glob pattern {pattern}"))?
            .filter_map(|entry| entry.ok())
            .collect();

        if matches.is_empty() {
            warn!(table = name, %pattern, "no registry file found, skipping");
            continue;
        }
        matches.sort();

        let table = name.to_lowercase();
        let load_id = format!("registry_{table}");
        for (i, path) in matches.iter().enumerate() {
            let disposition = if i == 0 {
                WriteDisposition::Replace
            } else {
                WriteDisposition::Append
            };
            let summary = loader
                .load_csv(path, &table, &load_id, disposition)
                .await
                .with_context(|| format!("loading registry table {table}"))?;
            info!(%summary, "registry table loaded");
            summaries.push(summary);
        }
    }
    Ok(summaries)
}
