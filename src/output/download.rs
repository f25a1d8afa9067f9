//! Optional image download
//!
//! Fetches the bytes of every collected image into a directory, using the same retry
//! policy and concurrency bound as page fetches.

use crate::config::RetryPolicy;
use crate::crawler::fetch_bytes;
use crate::url::canonicalize;
use crate::ScrapeError;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

/// Longest file name suffix taken from the URL
const MAX_NAME_LEN: usize = 80;

/// Outcome of a download pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub dir: PathBuf,
    pub attempted: usize,
    pub saved: usize,
    pub failed: usize,
    /// Why the pass could not run at all, if it could not
    pub error: Option<String>,
}

impl DownloadSummary {
    /// A pass that never started; every image counts as failed
    pub fn unavailable(dir: &Path, attempted: usize, error: impl ToString) -> Self {
        Self {
            dir: dir.to_path_buf(),
            attempted,
            saved: 0,
            failed: attempted,
            error: Some(error.to_string()),
        }
    }
}

/// Downloads every URL into `dir`
///
/// Individual failures are logged and counted; only failing to create `dir` is an
/// error.
pub async fn download_images(
    client: &Client,
    urls: &[Url],
    dir: &Path,
    policy: &RetryPolicy,
    max_concurrency: usize,
) -> Result<DownloadSummary, ScrapeError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| ScrapeError::FileSystem {
            path: dir.display().to_string(),
            source,
        })?;

    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut tasks = JoinSet::new();
    let mut summary = DownloadSummary {
        dir: dir.to_path_buf(),
        attempted: urls.len(),
        ..Default::default()
    };

    for url in urls {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        let client = client.clone();
        let policy = policy.clone();
        let url = url.clone();
        let target = dir.join(file_name_for(&url));

        tasks.spawn(async move {
            let _permit = permit;
            download_one(&client, &url, &target, &policy).await
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(true) => summary.saved += 1,
            Ok(false) => summary.failed += 1,
            Err(e) => {
                tracing::error!("Download task failed: {}", e);
                summary.failed += 1;
            }
        }
    }

    tracing::info!(
        "Downloaded {}/{} images to {}",
        summary.saved,
        summary.attempted,
        dir.display()
    );
    Ok(summary)
}

async fn download_one(client: &Client, url: &Url, target: &Path, policy: &RetryPolicy) -> bool {
    let (result, attempts) = fetch_bytes(client, url, policy).await;
    let bytes = match result {
        Ok(bytes) => bytes,
        Err(kind) => {
            tracing::warn!("Failed to download {} after {} attempts: {}", url, attempts, kind);
            return false;
        }
    };

    match tokio::fs::write(target, &bytes).await {
        Ok(()) => {
            tracing::debug!("Saved {} ({} bytes) to {}", url, bytes.len(), target.display());
            true
        }
        Err(e) => {
            tracing::warn!("Failed to write {}: {}", target.display(), e);
            false
        }
    }
}

/// Builds a collision-free file name for an image URL
///
/// The name is the first 12 hex digits of the SHA-256 of the canonical URL, followed
/// by the sanitized last path segment: `3f2a9c01b7de-shoe-front.jpg`.
pub fn file_name_for(url: &Url) -> String {
    let digest = Sha256::digest(canonicalize(url).as_bytes());
    let prefix = &hex::encode(digest)[..12];

    let last = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");
    let sanitized: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_NAME_LEN)
        .collect();
    let sanitized = sanitized.trim_matches('.');

    if sanitized.is_empty() {
        format!("{}-image", prefix)
    } else {
        format!("{}-{}", prefix, sanitized)
    }
}
