// src/fetch/zips.rs

use anyhow::{bail, Context, Result};
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use std::fs::{self, File};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::periods::Period;

/// Result of trying to fetch one monthly archive. BTS publishes with a lag
/// of roughly three months, so a 404 for a recent period is an expected
/// condition, not a failure.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Archive downloaded and extracted; paths of the extracted files.
    Extracted(Vec<PathBuf>),
    /// The remote archive does not exist (HTTP 404).
    Missing,
}

/// The monthly archive URL is the base prefix with `{year}_{month}.zip`
/// appended, e.g. `..._2024_10.zip`.
pub fn archive_url(base: &str, period: &Period) -> String {
    format!("{base}{period}.zip")
}

/// Download the archive for `period` and extract every file entry into
/// `dest_dir`. The compressed bytes live only in memory; nothing but the
/// extracted CSVs touches disk.
pub async fn download_archive(
    client: &Client,
    base_url: &str,
    period: &Period,
    dest_dir: &Path,
) -> Result<FetchOutcome> {
    let url = archive_url(base_url, period);
    debug!(%url, "requesting archive");

    let response = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("requesting {url}"))?;

    if response.status() == StatusCode::NOT_FOUND {
        info!(%url, "archive not published yet");
        return Ok(FetchOutcome::Missing);
    }
    if !response.status().is_success() {
        bail!("HTTP {} fetching {}", response.status(), url);
    }

    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.with_context(|| format!("reading response body of {url}"))?;
        body.extend_from_slice(&chunk);
    }
    info!(%url, bytes = body.len(), "download complete");

    let extracted = extract_archive(&body, dest_dir)
        .with_context(|| format!("extracting archive from {url}"))?;
    Ok(FetchOutcome::Extracted(extracted))
}

/// Extract every file entry of the zip in `bytes` into `dest_dir`, flattened
/// to the entry's file name. Returns the written paths.
pub fn extract_archive(bytes: &[u8], dest_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dest_dir)
        .with_context(|| format!("creating {}", dest_dir.display()))?;

    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).context("opening downloaded bytes as zip")?;

    let mut written = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        // Archives are flat in practice; strip any path components anyway so
        // a hostile entry name cannot escape dest_dir.
        let Some(file_name) = Path::new(&name).file_name() else {
            warn!(entry = %name, "skipping entry without a file name");
            continue;
        };
        let dest = dest_dir.join(file_name);

        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut buf)
            .with_context(|| format!("reading zip entry {name}"))?;
        let mut out =
            File::create(&dest).with_context(|| format!("creating {}", dest.display()))?;
        out.write_all(&buf)
            .with_context(|| format!("writing {}", dest.display()))?;

        debug!(entry = %name, dest = %dest.display(), bytes = buf.len(), "extracted");
        written.push(dest);
    }
    Ok(written)
}
