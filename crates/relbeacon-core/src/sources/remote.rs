//! Latest release from a GitHub-style release API.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use serde::Deserialize;

use super::{ReleaseSource, INSTALLABLE_SUFFIXES};
use crate::error::SourceError;
use crate::net::{get_text, HttpClient, RequestOptions};
use crate::release::{
    build_variant_from_name, or_unknown, parse_timestamp_or, release_notes_summary,
    ReleaseInfo, SourceKind,
};
use crate::validator::INSTALLABLE_CONTENT_TYPES;

/// One downloadable file attached to a release.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubAsset {
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// The subset of the release record the source reads.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRelease {
    #[serde(default)]
    pub tag_name: String,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub target_commitish: Option<String>,
    #[serde(default)]
    pub assets: Vec<GitHubAsset>,
}

fn is_installable(asset: &GitHubAsset) -> bool {
    let name = asset.name.to_ascii_lowercase();
    INSTALLABLE_SUFFIXES.iter().any(|s| name.ends_with(s))
        || asset.content_type.as_deref() == Some(INSTALLABLE_CONTENT_TYPES[0])
}

/// Picks the asset to distribute: installable packages only, the first one
/// that names a release build or does not name a debug build, else the first.
pub fn select_asset(assets: &[GitHubAsset]) -> Option<&GitHubAsset> {
    let installable: Vec<&GitHubAsset> = assets.iter().filter(|a| is_installable(a)).collect();
    installable
        .iter()
        .find(|a| a.name.contains("Release") || !a.name.contains("Debug"))
        .or_else(|| installable.first())
        .copied()
}

pub struct RemoteApiSource {
    client: Arc<dyn HttpClient>,
    api_base: String,
    repo: String,
    timeout: Duration,
}

impl RemoteApiSource {
    pub fn new(client: Arc<dyn HttpClient>, api_base: &str, repo: &str, timeout: Duration) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            repo: repo.trim_matches('/').to_string(),
            timeout,
        }
    }

    pub fn latest_release_url(&self) -> String {
        format!("{}/repos/{}/releases/latest", self.api_base, self.repo)
    }

    /// Maps an API record into a [`ReleaseInfo`].
    pub fn to_release(
        release: &GitHubRelease,
        now: SystemTime,
    ) -> Result<ReleaseInfo, SourceError> {
        let asset = select_asset(&release.assets).ok_or(SourceError::NoInstallableAsset)?;
        if asset.browser_download_url.trim().is_empty() {
            return Err(SourceError::Decode(format!(
                "asset {} has no download url",
                asset.name
            )));
        }

        Ok(ReleaseInfo {
            version: or_unknown(Some(&release.tag_name)),
            download_url: asset.browser_download_url.clone(),
            published_at: parse_timestamp_or(release.published_at.as_deref(), now),
            size_bytes: asset.size,
            build_variant: build_variant_from_name(&asset.name),
            source_kind: SourceKind::RemoteApi,
            asset_name: asset.name.clone(),
            commit: or_unknown(release.target_commitish.as_deref()),
            notes: release_notes_summary(release.body.as_deref().unwrap_or_default()),
        })
    }
}

#[async_trait]
impl ReleaseSource for RemoteApiSource {
    fn kind(&self) -> SourceKind {
        SourceKind::RemoteApi
    }

    async fn fetch_release(&self) -> Result<ReleaseInfo, SourceError> {
        let url = self.latest_release_url();
        tracing::debug!(url = %url, "fetching latest release");

        let options = RequestOptions::get().with_header("Accept", "application/vnd.github.v3+json");
        let text = get_text(self.client.as_ref(), &url, options, self.timeout).await?;
        let release: GitHubRelease =
            serde_json::from_str(&text).map_err(|e| SourceError::Decode(e.to_string()))?;

        tracing::debug!(
            tag = %release.tag_name,
            assets = release.assets.len(),
            "release data received"
        );
        let info = Self::to_release(&release, SystemTime::now())?;
        tracing::info!(asset = %info.asset_name, version = %info.version, "selected release asset");
        Ok(info)
    }
}
