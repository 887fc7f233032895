use anyhow::{Context, Result};
use btscraper::{
    config::Config,
    history::History,
    load::PostgresLoader,
    periods::resolve_range,
    pipeline::Pipeline,
};
use chrono::Utc;
use reqwest::Client;
use std::{env, fs, path::Path};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) load config ──────────────────────────────────────────────
    let config = match env::args().nth(1) {
        Some(path) => Config::load(Path::new(&path))?,
        None => Config::default(),
    };
    for dir in [&config.unzip_dir, &config.split_dir, &config.history_dir] {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating directory {}", dir.display()))?;
    }

    // ─── 3) resolve the period range ─────────────────────────────────
    let periods = resolve_range(
        config.start_period()?,
        config.end_period()?,
        Utc::now().date_naive(),
    )?;
    info!(
        first = %periods[0],
        last = %periods[periods.len() - 1],
        count = periods.len(),
        "resolved period range"
    );

    // ─── 4) connect the warehouse loader ─────────────────────────────
    let database_url =
        env::var("DATABASE_URL").context("DATABASE_URL must be set to the warehouse DSN")?;
    let loader = PostgresLoader::connect(&database_url, &config.dataset).await?;

    // ─── 5) run the pipeline and report ──────────────────────────────
    let history = History::new(&config.history_dir)?;
    let pipeline = Pipeline::new(Client::new(), &config, loader, history);
    let report = pipeline.run(&periods).await?;
    report.log_summary();

    if report.failed() > 0 {
        std::process::exit(1);
    }
    Ok(())
}
