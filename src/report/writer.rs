//! Document files.
//!
//! Every file is written to a temporary file in the target directory and
//! renamed into place, so a reader never sees a half-written document.

use crate::analysis::AggregationResult;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Timestamp file the dashboard shows as "last updated".
pub const LAST_UPDATE_FILE: &str = "last_update.txt";

/// A document that reached its final path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenDocument {
    pub path: PathBuf,
    pub bytes: usize,
}

#[cfg(unix)]
fn make_readable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    // Temporary files are created owner-only; the web server must read them.
    fs::set_permissions(path, fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn make_readable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

fn write_atomic(dir: &Path, name: &str, contents: &[u8]) -> Result<PathBuf> {
    let target = dir.join(name);

    let mut file = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    file.write_all(contents)
        .with_context(|| format!("Failed to write {}", target.display()))?;
    make_readable(file.path())?;
    file.persist(&target)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to move document into place: {}", target.display()))?;

    Ok(target)
}

/// Write every document into `dir`, creating it if needed.
pub fn write_documents(dir: &Path, results: &[AggregationResult]) -> Result<Vec<WrittenDocument>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    let mut written = Vec::with_capacity(results.len());
    for result in results {
        let path = write_atomic(dir, result.file_name, result.body.as_bytes())?;
        info!("Wrote {} ({} pass)", path.display(), result.pass);
        written.push(WrittenDocument {
            path,
            bytes: result.body.len(),
        });
    }

    Ok(written)
}

/// Copy every `*.json` document from `from` into `to`.
pub fn publish_documents(from: &Path, to: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(to)
        .with_context(|| format!("Failed to create web data directory: {}", to.display()))?;

    let mut published = Vec::new();
    for entry in WalkDir::new(from)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("Failed to list {}", from.display()))?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
            debug!("Not publishing {}", path.display());
            continue;
        }

        let contents =
            fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let name = entry.file_name().to_string_lossy();
        published.push(write_atomic(to, &name, &contents)?);
    }

    info!("Published {} documents to {}", published.len(), to.display());
    Ok(published)
}

/// Record when the dashboard data was last refreshed.
pub fn write_last_update(dir: &Path, at: DateTime<Utc>) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    write_atomic(dir, LAST_UPDATE_FILE, format!("{}\n", at.to_rfc3339()).as_bytes())
}
