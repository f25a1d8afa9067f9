//! Result file writer
//!
//! Writes one absolute image URL per line, UTF-8, no header, in discovery order.
//! The file is written to a temporary file next to the destination and renamed into
//! place, so readers never observe a half-written result.

use crate::state::CanonicalUrlSet;
use crate::ScrapeError;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use url::Url;

/// Persists the final result set
///
/// # Arguments
///
/// * `results` - The deduplicated image URLs
/// * `path` - Destination file; parent directories are created as needed
///
/// # Returns
///
/// * `Ok(())` - The file was written and moved into place
/// * `Err(ScrapeError::FileSystem)` - A directory, the temporary file or the rename failed
pub fn write_results(results: &CanonicalUrlSet, path: &Path) -> Result<(), ScrapeError> {
    write_lines(results.iter(), path)?;
    tracing::info!("Wrote {} image URLs to {}", results.len(), path.display());
    Ok(())
}

/// Atomically writes URLs to `path`, one per line
pub fn write_lines<'a>(urls: impl IntoIterator<Item = &'a Url>, path: &Path) -> Result<(), ScrapeError> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|e| fs_error(parent, e))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| fs_error(parent, e))?;
    {
        let mut writer = BufWriter::new(&mut tmp);
        for url in urls {
            writeln!(writer, "{}", url).map_err(|e| fs_error(path, e))?;
        }
        writer.flush().map_err(|e| fs_error(path, e))?;
    }

    tmp.persist(path).map_err(|e| fs_error(path, e.error))?;
    Ok(())
}

fn fs_error(path: &Path, source: std::io::Error) -> ScrapeError {
    ScrapeError::FileSystem {
        path: path.display().to_string(),
        source,
    }
}
