//! Release sources, tried by the resolver in priority order.
//!
//! Each source turns one kind of release information into a normalized
//! [`ReleaseInfo`]. Sources fail independently; the resolver only sees the
//! error value.

mod fallback;
mod manifest;
mod remote;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::release::{ReleaseInfo, SourceKind};

pub use fallback::StaticFallbackSource;
pub use manifest::{parse_manifest, LocalManifestSource, ManifestLocation};
pub use remote::{select_asset, GitHubAsset, GitHubRelease, RemoteApiSource};

/// Provider of a candidate release.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn fetch_release(&self) -> Result<ReleaseInfo, SourceError>;
}

/// Filename suffixes that mark an installable package asset.
pub const INSTALLABLE_SUFFIXES: [&str; 1] = [".apk"];
