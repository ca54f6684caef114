//! Persisting CSV exports to disk.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to create export directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("Failed to write export file {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Attempts at `_N` suffixes before giving up on a crowded second
const MAX_NAME_ATTEMPTS: u32 = 100;

/// `query_results_<YYYYMMDD_HHMMSS>.csv`
pub fn export_file_name(now: DateTime<Local>) -> String {
    numbered_file_name(now, 0)
}

/// `attempt` 0 is the plain name; later attempts append `_<attempt>` to the stem.
fn numbered_file_name(now: DateTime<Local>, attempt: u32) -> String {
    let stem = format!("query_results_{}", now.format("%Y%m%d_%H%M%S"));
    match attempt {
        0 => format!("{}.csv", stem),
        n => format!("{}_{}.csv", stem, n),
    }
}

/// Write `blob` under `dir`, creating the directory when missing.
///
/// Never replaces an existing file: a name already taken within the same second
/// gets a `_N` suffix.
pub fn write_export(dir: &Path, blob: &[u8], now: DateTime<Local>) -> Result<PathBuf, ExportError> {
    fs::create_dir_all(dir).map_err(|source| ExportError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut attempt = 0;
    let (path, mut file) = loop {
        let path = dir.join(numbered_file_name(now, attempt));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => break (path, file),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && attempt < MAX_NAME_ATTEMPTS => {
                log::debug!("{} exists, trying next suffix", path.display());
                attempt += 1;
            }
            Err(source) => return Err(ExportError::Write { path, source }),
        }
    };

    file.write_all(blob).map_err(|source| ExportError::Write {
        path: path.clone(),
        source,
    })?;

    log::info!("Wrote {} bytes to {}", blob.len(), path.display());
    Ok(path)
}
