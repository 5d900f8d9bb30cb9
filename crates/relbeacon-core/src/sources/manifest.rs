//! Locally published KEY=VALUE build manifest.
//!
//! ```text
//! VERSION=v1.0.7+8
//! DOWNLOAD_URL=https://dist.example.com/app-release.apk
//! BUILD_DATE=2024-06-01T10:30:00Z
//! SIZE_MB=24
//! BUILD_TYPE=Release
//! COMMIT_HASH=3f2a9c1
//! ```
//!
//! Only `DOWNLOAD_URL` is mandatory.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;

use super::ReleaseSource;
use crate::error::SourceError;
use crate::net::{get_text, HttpClient, RequestOptions};
use crate::release::{or_unknown, parse_timestamp_or, BuildVariant, ReleaseInfo, SourceKind};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Where the manifest lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestLocation {
    Url(String),
    Path(PathBuf),
}

impl ManifestLocation {
    /// Anything with a scheme is fetched over the network; the rest is a path.
    pub fn parse(location: &str) -> Self {
        if location.contains("://") {
            Self::Url(location.to_string())
        } else {
            Self::Path(PathBuf::from(location))
        }
    }
}

impl std::fmt::Display for ManifestLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Parses `KEY=VALUE` lines. Keys and values are trimmed; lines without `=`
/// or with an empty key or value are skipped. A value may itself contain `=`.
pub fn parse_manifest(text: &str) -> HashMap<String, String> {
    text.lines()
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim(), v.trim()))
        .filter(|(k, v)| !k.is_empty() && !v.is_empty())
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub struct LocalManifestSource {
    client: Arc<dyn HttpClient>,
    location: ManifestLocation,
    app_name: String,
    timeout: Duration,
}

impl LocalManifestSource {
    pub fn new(
        client: Arc<dyn HttpClient>,
        location: ManifestLocation,
        app_name: &str,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            location,
            app_name: app_name.to_string(),
            timeout,
        }
    }

    async fn read(&self) -> Result<String, SourceError> {
        match &self.location {
            ManifestLocation::Url(url) => {
                let options = RequestOptions::get().with_header("Cache-Control", "no-cache");
                Ok(get_text(self.client.as_ref(), url, options, self.timeout).await?)
            }
            ManifestLocation::Path(path) => Ok(tokio::fs::read_to_string(path).await?),
        }
    }

    /// Maps manifest entries into a [`ReleaseInfo`], filling defaults.
    pub fn to_release(
        entries: &HashMap<String, String>,
        app_name: &str,
        now: SystemTime,
    ) -> Result<ReleaseInfo, SourceError> {
        let download_url = entries
            .get("DOWNLOAD_URL")
            .ok_or(SourceError::MissingDownloadUrl)?;
        let version = entries.get("VERSION").map(String::as_str);
        let size_bytes = entries
            .get("SIZE_MB")
            .and_then(|v| parse_whole_megabytes(v))
            .map(|mb| mb.saturating_mul(BYTES_PER_MB))
            .unwrap_or(0);
        let build_variant = entries
            .get("BUILD_TYPE")
            .and_then(|v| BuildVariant::parse(v))
            .unwrap_or(BuildVariant::Local);

        Ok(ReleaseInfo {
            version: or_unknown(version),
            download_url: download_url.clone(),
            published_at: parse_timestamp_or(entries.get("BUILD_DATE").map(String::as_str), now),
            size_bytes,
            build_variant,
            source_kind: SourceKind::LocalManifest,
            asset_name: format!("{}-{}.apk", app_name, version.unwrap_or("local")),
            commit: or_unknown(entries.get("COMMIT_HASH").map(String::as_str)),
            notes: String::new(),
        })
    }
}

/// Whole megabytes from values like "24" or "24.7" (fraction dropped).
fn parse_whole_megabytes(value: &str) -> Option<u64> {
    value.split('.').next()?.trim().parse().ok()
}

#[async_trait]
impl ReleaseSource for LocalManifestSource {
    fn kind(&self) -> SourceKind {
        SourceKind::LocalManifest
    }

    async fn fetch_release(&self) -> Result<ReleaseInfo, SourceError> {
        tracing::debug!(location = %self.location, "checking local build manifest");
        let text = self.read().await?;
        let entries = parse_manifest(&text);
        let info = Self::to_release(&entries, &self.app_name, SystemTime::now())?;
        tracing::info!(
            version = %info.version,
            url = %info.download_url,
            "local build manifest loaded"
        );
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::testing::FakeClient;

    const FULL: &str = "VERSION=v1.0.7+8\n\
DOWNLOAD_URL=https://dist.example.com/app.apk?sig=a=b\n\
BUILD_DATE=2024-06-01T10:30:00Z\n\
SIZE_MB=24.7\n\
BUILD_TYPE=debug\n\
COMMIT_HASH=3f2a9c1\n";

    #[test]
    fn parse_manifest_trims_and_skips_junk() {
        let entries = parse_manifest(
            "  VERSION = v2 \n# comment\n=orphan\nEMPTY=\nDOWNLOAD_URL=https://x/a.apk?x=1\n",
        );
        assert_eq!(entries.get("VERSION").map(String::as_str), Some("v2"));
        assert_eq!(
            entries.get("DOWNLOAD_URL").map(String::as_str),
            Some("https://x/a.apk?x=1")
        );
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn full_manifest_maps_every_key() {
        let now = SystemTime::now();
        let info = LocalManifestSource::to_release(&parse_manifest(FULL), "RouWhite", now).unwrap();
        assert_eq!(info.version, "v1.0.7+8");
        assert_eq!(info.download_url, "https://dist.example.com/app.apk?sig=a=b");
        assert_ne!(info.published_at, now);
        assert_eq!(info.size_bytes, 24 * 1024 * 1024);
        assert_eq!(info.build_variant, BuildVariant::Debug);
        assert_eq!(info.commit, "3f2a9c1");
        assert_eq!(info.asset_name, "RouWhite-v1.0.7+8.apk");
        assert_eq!(info.source_kind, SourceKind::LocalManifest);
    }

    #[test]
    fn minimal_manifest_uses_defaults() {
        let now = SystemTime::now();
        let entries = parse_manifest("DOWNLOAD_URL=./app-release.apk");
        let info = LocalManifestSource::to_release(&entries, "app", now).unwrap();
        assert_eq!(info.version, "unknown");
        assert_eq!(info.published_at, now);
        assert_eq!(info.size_bytes, 0);
        assert_eq!(info.build_variant, BuildVariant::Local);
        assert_eq!(info.commit, "unknown");
        assert_eq!(info.asset_name, "app-local.apk");
    }

    #[test]
    fn missing_download_url_fails() {
        let entries = parse_manifest("VERSION=v1\nSIZE_MB=3");
        let err = LocalManifestSource::to_release(&entries, "app", SystemTime::now()).unwrap_err();
        assert!(matches!(err, SourceError::MissingDownloadUrl));
    }

    #[test]
    fn location_parse() {
        assert_eq!(
            ManifestLocation::parse("https://x/latest-build.txt"),
            ManifestLocation::Url("https://x/latest-build.txt".to_string())
        );
        assert_eq!(
            ManifestLocation::parse("./latest-build.txt"),
            ManifestLocation::Path(PathBuf::from("./latest-build.txt"))
        );
    }

    #[tokio::test]
    async fn reads_manifest_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latest-build.txt");
        std::fs::write(&path, FULL).unwrap();
        let source = LocalManifestSource::new(
            Arc::new(FakeClient::new()),
            ManifestLocation::Path(path),
            "app",
            Duration::from_secs(1),
        );
        let info = source.fetch_release().await.unwrap();
        assert_eq!(info.version, "v1.0.7+8");
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = LocalManifestSource::new(
            Arc::new(FakeClient::new()),
            ManifestLocation::Path(dir.path().join("nope.txt")),
            "app",
            Duration::from_secs(1),
        );
        assert!(matches!(source.fetch_release().await, Err(SourceError::Io(_))));
    }

    #[tokio::test]
    async fn reads_manifest_over_http() {
        let client = Arc::new(FakeClient::new());
        client.body("https://dist.example.com/latest-build.txt", 200, FULL);
        let source = LocalManifestSource::new(
            client.clone(),
            ManifestLocation::parse("https://dist.example.com/latest-build.txt"),
            "app",
            Duration::from_secs(1),
        );
        let info = source.fetch_release().await.unwrap();
        assert_eq!(info.commit, "3f2a9c1");
        assert_eq!(client.calls(), 1);
    }
}
