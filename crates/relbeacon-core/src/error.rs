//! Error taxonomy shared by the network, source, render and resolver layers.
//!
//! Component boundaries convert these into result values (see
//! `validator::ValidationResult`); only a fully exhausted source chain reaches
//! the resolver's retry state machine as a [`ResolveError`].

use std::path::PathBuf;
use std::time::Duration;

/// Failure of a single network request.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Connection, DNS, TLS or protocol failure.
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },
    /// The request exceeded its deadline and was aborted.
    #[error("request to {url} timed out after {}ms", after.as_millis())]
    Timeout { url: String, after: Duration },
    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {status} {status_text}")]
    Status {
        url: String,
        status: u16,
        status_text: String,
    },
    /// The caller tripped the abort signal before the transfer finished.
    #[error("request to {url} was aborted")]
    Aborted { url: String },
}

impl FetchError {
    /// True for deadline expiry, as opposed to any other transport failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout { .. })
    }
}

/// Failure of one release source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("malformed release data: {0}")]
    Decode(String),
    #[error("release has no installable package asset")]
    NoInstallableAsset,
    #[error("manifest has no DOWNLOAD_URL entry")]
    MissingDownloadUrl,
    #[error("reading manifest: {0}")]
    Io(#[from] std::io::Error),
    #[error("fallback release unavailable: {0}")]
    Fallback(String),
}

/// The code-image collaborator could not produce output.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("cannot render code: {0}")]
    Render(String),
}

/// Resolution of the whole source chain failed.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("all release sources failed (last error: {last})")]
    SourceExhausted { last: SourceError },
}

/// Failure to fetch an artifact to disk.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("writing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("partial transfer from {url}: got {received} of {expected} bytes")]
    Incomplete {
        url: String,
        received: u64,
        expected: u64,
    },
    #[error("no download candidate is reachable")]
    NoCandidate,
    #[error("all {attempts} download candidates failed (last error: {last})")]
    AllFailed { attempts: usize, last: String },
}
