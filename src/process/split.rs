// src/process/split.rs

use anyhow::{bail, Context, Result};
use encoding_rs::WINDOWS_1252;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Locate the single `*.csv` file inside `source_dir`. Zero or multiple
/// matches are errors: the BTS archives contain exactly one data file, and
/// anything else means a previous stage left the workspace dirty.
fn find_source_csv(source_dir: &Path) -> Result<PathBuf> {
    let mut matches: Vec<PathBuf> = fs::read_dir(source_dir)
        .with_context(|| format!("reading source directory {}", source_dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();

    match matches.len() {
        1 => Ok(matches.remove(0)),
        0 => bail!("no CSV file found in {}", source_dir.display()),
        n => {
            matches.sort();
            bail!(
                "expected exactly one CSV in {}, found {}: {:?}",
                source_dir.display(),
                n,
                matches
            )
        }
    }
}

/// Decode the raw file bytes. Strict UTF-8 first; BTS files occasionally
/// carry Windows-1252 characters in free-text fields, so a decode failure
/// falls back to re-reading the whole buffer as Windows-1252. Mixed-encoding
/// output is never produced.
fn decode_source(bytes: &[u8], path: &Path) -> Result<String> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(text.to_string()),
        Err(e) => {
            warn!(
                path = %path.display(),
                "not valid UTF-8 ({}), retrying as Windows-1252", e
            );
            let (text, _, had_errors) = WINDOWS_1252.decode(bytes);
            // Windows-1252 assigns all 256 byte values, so this only
            // triggers if the fallback encoding ever changes.
            if had_errors {
                bail!(
                    "fallback Windows-1252 decode of {} also failed",
                    path.display()
                );
            }
            Ok(text.into_owned())
        }
    }
}

fn flush_chunk(out_dir: &Path, part: usize, header: &str, lines: &[&str]) -> Result<u64> {
    let path = out_dir.join(format!("{part}.csv"));
    let file =
        File::create(&path).with_context(|| format!("creating chunk {}", path.display()))?;
    let mut w = BufWriter::new(file);
    writeln!(w, "{header}")?;
    for line in lines {
        writeln!(w, "{line}")?;
    }
    w.flush()?;
    debug!(chunk = %path.display(), rows = lines.len(), "wrote chunk");
    Ok(lines.len() as u64)
}

/// Split the single CSV in `source_dir` into files of at most `chunk_size`
/// data lines each, written to `out_dir` as `1.csv`, `2.csv`, ... with the
/// header repeated at the top of every chunk. Returns the number of chunks.
#[instrument(level = "info", skip(source_dir, out_dir), fields(src = %source_dir.display()))]
pub fn split_csv(source_dir: &Path, out_dir: &Path, chunk_size: usize) -> Result<usize> {
    if chunk_size == 0 {
        bail!("chunk_size must be at least 1");
    }
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    let source = find_source_csv(source_dir)?;
    let bytes = fs::read(&source).with_context(|| format!("reading {}", source.display()))?;
    let text = decode_source(&bytes, &source)?;

    let mut lines = text.lines();
    let Some(header) = lines.next() else {
        bail!("{} is empty, no header line", source.display());
    };

    let mut part = 0;
    let mut rows = 0u64;
    let mut buf: Vec<&str> = Vec::with_capacity(chunk_size);
    for line in lines {
        buf.push(line);
        if buf.len() == chunk_size {
            part += 1;
            rows += flush_chunk(out_dir, part, header, &buf)?;
            buf.clear();
        }
    }
    if !buf.is_empty() {
        part += 1;
        rows += flush_chunk(out_dir, part, header, &buf)?;
    }

    info!(source = %source.display(), chunks = part, rows, "split complete");
    Ok(part)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_source(dir: &Path, name: &str, header: &str, data_lines: usize) {
        let mut body = String::from(header);
        body.push('\n');
        for i in 0..data_lines {
            body.push_str(&format!("row{i},{i}\n"));
        }
        fs::write(dir.join(name), body).unwrap();
    }

    fn chunk_files(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok().map(|e| e.path()))
            .collect();
        files.sort_by_key(|p| {
            p.file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap()
        });
        files
    }

    #[test]
    fn chunk_count_is_ceil_of_rows_over_size() -> Result<()> {
        let src = tempdir()?;
        let out = tempdir()?;
        write_source(src.path(), "On_Time_2024_10.csv", "a,b", 25);

        let chunks = split_csv(src.path(), out.path(), 10)?;
        assert_eq!(chunks, 3);

        let files = chunk_files(out.path());
        assert_eq!(
            files
                .iter()
                .map(|p| p.file_name().unwrap().to_str().unwrap())
                .collect::<Vec<_>>(),
            vec!["1.csv", "2.csv", "3.csv"]
        );

        // Every chunk but the last carries exactly chunk_size data lines.
        for (i, f) in files.iter().enumerate() {
            let text = fs::read_to_string(f)?;
            let mut lines = text.lines();
            assert_eq!(lines.next(), Some("a,b"), "header missing in chunk {}", i + 1);
            let data = lines.count();
            if i < 2 {
                assert_eq!(data, 10);
            } else {
                assert_eq!(data, 5);
            }
        }
        Ok(())
    }

    #[test]
    fn concatenation_round_trips() -> Result<()> {
        // L = 0, L = C and L = C + 1 all reassemble losslessly.
        for data_lines in [0usize, 4, 5] {
            let src = tempdir()?;
            let out = tempdir()?;
            write_source(src.path(), "data.csv", "h1,h2", data_lines);

            let chunks = split_csv(src.path(), out.path(), 4)?;
            assert_eq!(chunks, data_lines.div_ceil(4));

            let mut reassembled = Vec::new();
            for f in chunk_files(out.path()) {
                let text = fs::read_to_string(&f)?;
                reassembled.extend(text.lines().skip(1).map(str::to_string));
            }
            let expected: Vec<String> = (0..data_lines).map(|i| format!("row{i},{i}")).collect();
            assert_eq!(reassembled, expected);
        }
        Ok(())
    }

    #[test]
    fn header_only_source_yields_no_chunks() -> Result<()> {
        let src = tempdir()?;
        let out = tempdir()?;
        write_source(src.path(), "data.csv", "a,b", 0);
        assert_eq!(split_csv(src.path(), out.path(), 100)?, 0);
        assert_eq!(fs::read_dir(out.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn missing_source_is_an_error() -> Result<()> {
        let src = tempdir()?;
        let out = tempdir()?;
        let err = split_csv(src.path(), out.path(), 10).unwrap_err();
        assert!(err.to_string().contains("no CSV file"));
        Ok(())
    }

    #[test]
    fn multiple_sources_are_an_error() -> Result<()> {
        let src = tempdir()?;
        let out = tempdir()?;
        write_source(src.path(), "one.csv", "a", 1);
        write_source(src.path(), "two.csv", "a", 1);
        let err = split_csv(src.path(), out.path(), 10).unwrap_err();
        assert!(err.to_string().contains("exactly one CSV"));
        Ok(())
    }

    #[test]
    fn non_csv_entries_are_ignored_when_locating_source() -> Result<()> {
        let src = tempdir()?;
        let out = tempdir()?;
        write_source(src.path(), "data.csv", "a,b", 2);
        fs::write(src.path().join("readme.html"), "<html></html>")?;
        assert_eq!(split_csv(src.path(), out.path(), 1)?, 2);
        Ok(())
    }

    #[test]
    fn windows_1252_fallback_decodes_accented_bytes() -> Result<()> {
        let src = tempdir()?;
        let out = tempdir()?;
        // 0xE9 is "é" in Windows-1252 and invalid as a standalone UTF-8 byte.
        fs::write(src.path().join("data.csv"), b"city,code\nMontr\xe9al,YUL\n")?;

        assert_eq!(split_csv(src.path(), out.path(), 10)?, 1);
        let text = fs::read_to_string(out.path().join("1.csv"))?;
        assert!(text.contains("Montréal,YUL"));
        Ok(())
    }

    #[test]
    fn zero_chunk_size_rejected() -> Result<()> {
        let src = tempdir()?;
        let out = tempdir()?;
        write_source(src.path(), "data.csv", "a", 1);
        assert!(split_csv(src.path(), out.path(), 0).is_err());
        Ok(())
    }
}
