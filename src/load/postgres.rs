// src/load/postgres.rs

use anyhow::{bail, Context, Result};
use sqlx::postgres::{PgPool, PgPoolCopyExt, PgPoolOptions};
use std::path::Path;
use tracing::{debug, info};

use super::{LoadSummary, WarehouseLoader, WriteDisposition};

/// Loads CSV files into Postgres with `COPY ... FROM STDIN`. Tables are
/// created on first sight with every column typed `text`, the way a staging
/// layer wants them; downstream models cast as needed.
pub struct PostgresLoader {
    pool: PgPool,
    dataset: String,
}

impl PostgresLoader {
    /// Connect to `database_url` and ensure the dataset schema exists.
    pub async fn connect(database_url: &str, dataset: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(database_url)
            .await
            .context("connecting to warehouse")?;

        let ddl = format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(dataset));
        sqlx::query(&ddl)
            .execute(&pool)
            .await
            .with_context(|| format!("creating schema {dataset}"))?;

        Ok(Self {
            pool,
            dataset: dataset.to_string(),
        })
    }

    fn qualified(&self, table: &str) -> String {
        format!("{}.{}", quote_ident(&self.dataset), quote_ident(table))
    }

    async fn ensure_table(&self, table: &str, columns: &[String]) -> Result<()> {
        let cols = columns
            .iter()
            .map(|c| format!("{} text", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.qualified(table),
            cols
        );
        sqlx::query(&ddl)
            .execute(&self.pool)
            .await
            .with_context(|| format!("creating table {}", table))?;
        Ok(())
    }
}

impl WarehouseLoader for PostgresLoader {
    async fn load_csv(
        &self,
        path: &Path,
        table: &str,
        load_id: &str,
        disposition: WriteDisposition,
    ) -> Result<LoadSummary> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;

        let header = first_line(&bytes)
            .with_context(|| format!("{} has no header line", path.display()))?;
        let columns = header_columns(header);
        if columns.is_empty() {
            bail!("{} has an empty header", path.display());
        }

        self.ensure_table(table, &columns).await?;

        if disposition == WriteDisposition::Replace {
            let sql = format!("TRUNCATE {}", self.qualified(table));
            sqlx::query(&sql)
                .execute(&self.pool)
                .await
                .with_context(|| format!("truncating {}", table))?;
            debug!(table, "truncated for replace disposition");
        }

        let copy_sql = format!(
            "COPY {} FROM STDIN WITH (FORMAT csv, HEADER true)",
            self.qualified(table)
        );
        let mut copy = self
            .pool
            .copy_in_raw(&copy_sql)
            .await
            .with_context(|| format!("starting COPY into {}", table))?;
        copy.send(bytes.as_slice())
            .await
            .with_context(|| format!("streaming {} into {}", path.display(), table))?;
        let rows = copy
            .finish()
            .await
            .with_context(|| format!("finishing COPY into {}", table))?;

        info!(table, load_id, rows, disposition = disposition.as_str(), "copy complete");
        Ok(LoadSummary {
            table: table.to_string(),
            load_id: load_id.to_string(),
            rows,
        })
    }
}

fn first_line(bytes: &[u8]) -> Option<&str> {
    let text = std::str::from_utf8(bytes).ok()?;
    text.lines().next()
}

/// Normalize the CSV header into Postgres column names: strip quotes,
/// lowercase, squash anything non-alphanumeric to `_`, and prefix names that
/// start with a digit.
fn header_columns(header: &str) -> Vec<String> {
    header
        .split(',')
        .map(|field| normalize_column(field.trim().trim_matches('"')))
        .filter(|c| !c.is_empty())
        .collect()
}

fn normalize_column(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', ""))
}
