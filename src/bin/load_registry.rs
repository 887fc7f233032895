//! Refresh the FAA airframe registry reference tables from a local
//! directory of release files (`*_MASTER.txt`, `*_ENGINE.txt`, ...).

use anyhow::{Context, Result};
use btscraper::{load::PostgresLoader, registry};
use std::{env, path::PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env_filter).init();

    let data_dir = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data"));
    let dataset = env::args()
        .nth(2)
        .unwrap_or_else(|| "src_airframes".to_string());

    let database_url =
        env::var("DATABASE_URL").context("DATABASE_URL must be set to the warehouse DSN")?;
    let loader = PostgresLoader::connect(&database_url, &dataset).await?;

    let summaries = registry::load_registry(&loader, &data_dir).await?;
    for summary in &summaries {
        info!(%summary, "refreshed");
    }
    info!(tables = summaries.len(), "registry refresh complete");
    Ok(())
}
