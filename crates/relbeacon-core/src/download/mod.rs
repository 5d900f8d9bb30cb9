//! Artifact download with mirror fallback.
//!
//! Candidates are validated first (see [`ArtifactValidator::robust_link`]),
//! then fetched one by one until a transfer completes. Each attempt streams
//! into `<name>.part` and is renamed into place only when the byte count
//! matches what the server announced.

mod transfer;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::config::BeaconConfig;
use crate::error::{DownloadError, FetchError};
use crate::release::filename_from_url;
use crate::validator::{ArtifactValidator, RobustLink, ValidateOptions};

#[derive(Debug, Clone, Copy)]
pub struct DownloadOptions {
    pub connect_timeout: Duration,
    /// A transfer slower than 1 KiB/s for this long is abandoned.
    pub stall_timeout: Duration,
    pub validate: ValidateOptions,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            stall_timeout: Duration::from_secs(30),
            validate: ValidateOptions::default(),
        }
    }
}

impl DownloadOptions {
    pub fn from_config(cfg: &BeaconConfig) -> Self {
        Self {
            connect_timeout: cfg.request_timeout(),
            validate: ValidateOptions {
                max_cache_age: cfg.validation_cache_max_age(),
            },
            ..Self::default()
        }
    }
}

/// Bytes received so far for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    pub downloaded: u64,
    /// `None` until the server announces a length.
    pub total: Option<u64>,
}

impl DownloadProgress {
    pub fn percent(&self) -> Option<f64> {
        match self.total {
            Some(total) if total > 0 => Some(self.downloaded as f64 * 100.0 / total as f64),
            _ => None,
        }
    }
}

/// Called from the transfer thread with the URL being fetched.
pub type ProgressFn = Arc<dyn Fn(&str, DownloadProgress) + Send + Sync>;

#[derive(Debug, Clone, Serialize)]
pub struct FailedAttempt {
    pub url: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadedArtifact {
    /// Candidate the file came from.
    pub url: String,
    pub path: PathBuf,
    pub bytes: u64,
    /// Candidates tried before `url`, in order.
    pub failed: Vec<FailedAttempt>,
}

/// Downloads `primary` into `out_dir`, falling back to `fallbacks` in order.
///
/// The file is named after the last path segment of whichever URL succeeds.
pub async fn download_with_fallback(
    validator: &ArtifactValidator,
    primary: &str,
    fallbacks: &[String],
    out_dir: &Path,
    options: DownloadOptions,
    progress: ProgressFn,
) -> Result<DownloadedArtifact, DownloadError> {
    tokio::fs::create_dir_all(out_dir)
        .await
        .map_err(|source| DownloadError::Io {
            path: out_dir.to_path_buf(),
            source,
        })?;

    let candidates: Vec<String> = std::iter::once(primary.to_string())
        .chain(fallbacks.iter().cloned())
        .filter(|url| !url.trim().is_empty())
        .collect();
    let link = validator
        .robust_link(primary, &[], fallbacks, options.validate)
        .await;
    let order = attempt_order(&link, &candidates);
    if order.is_empty() {
        return Err(DownloadError::NoCandidate);
    }

    let mut failed: Vec<FailedAttempt> = Vec::new();
    for url in order {
        let dest = out_dir.join(filename_from_url(&url));
        tracing::info!(url = %url, dest = %dest.display(), "downloading artifact");
        match fetch_blocking(&url, &dest, options, progress.clone()).await {
            Ok(bytes) => {
                tracing::info!(url = %url, bytes, "download complete");
                return Ok(DownloadedArtifact {
                    url,
                    path: dest,
                    bytes,
                    failed,
                });
            }
            Err(err) => {
                tracing::warn!(url = %url, error = %err, "download attempt failed");
                failed.push(FailedAttempt {
                    url,
                    error: err.to_string(),
                });
            }
        }
    }

    let attempts = failed.len();
    let last = failed
        .last()
        .map(|f| f.error.clone())
        .unwrap_or_default();
    Err(DownloadError::AllFailed { attempts, last })
}

async fn fetch_blocking(
    url: &str,
    dest: &Path,
    options: DownloadOptions,
    progress: ProgressFn,
) -> Result<u64, DownloadError> {
    let owned_url = url.to_string();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let report = |p: DownloadProgress| progress(&owned_url, p);
        transfer::fetch_to_file(&owned_url, &dest, &options, &report)
    })
    .await
    .map_err(|e| {
        DownloadError::Fetch(FetchError::Transport {
            url: url.to_string(),
            reason: format!("download task failed: {e}"),
        })
    })?
}

/// Validated primary first (when reachable), then the reachable fallbacks,
/// then candidates ranking never looked at. Duplicates are dropped.
fn attempt_order(link: &RobustLink, candidates: &[String]) -> Vec<String> {
    let primary_reachable = link.validation.as_ref().is_some_and(|v| v.is_reachable);
    let primary = link.primary.as_deref().filter(|_| primary_reachable);
    let unranked = candidates
        .iter()
        .filter(|url| !link.results.iter().any(|r| &r.url == *url));

    let mut seen: HashSet<&str> = HashSet::new();
    primary
        .into_iter()
        .chain(link.fallbacks.iter().map(String::as_str))
        .chain(unranked.map(String::as_str))
        .filter(|url| seen.insert(*url))
        .map(str::to_string)
        .collect()
}
