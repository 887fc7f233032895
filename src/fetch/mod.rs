// src/fetch/mod.rs

pub mod zips;

pub use zips::{archive_url, download_archive, extract_archive, FetchOutcome};
