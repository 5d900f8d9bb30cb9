use std::time::SystemTime;

use async_trait::async_trait;

use super::ReleaseSource;
use crate::config::FallbackRelease;
use crate::error::SourceError;
use crate::release::{or_unknown, BuildVariant, ReleaseInfo, SourceKind};

/// Last-resort source built from configuration; never touches the network.
pub struct StaticFallbackSource {
    release: FallbackRelease,
}

impl StaticFallbackSource {
    pub fn new(release: FallbackRelease) -> Self {
        Self { release }
    }

    pub fn to_release(&self, now: SystemTime) -> Result<ReleaseInfo, SourceError> {
        let url = self.release.download_url.trim();
        if url.is_empty() {
            return Err(SourceError::Fallback(
                "no fallback download url configured".to_string(),
            ));
        }
        Ok(ReleaseInfo {
            version: or_unknown(Some(&self.release.version)),
            download_url: url.to_string(),
            published_at: now,
            size_bytes: 0,
            build_variant: BuildVariant::Fallback,
            source_kind: SourceKind::StaticFallback,
            asset_name: self.release.asset_name.clone(),
            commit: or_unknown(None),
            notes: String::new(),
        })
    }
}

#[async_trait]
impl ReleaseSource for StaticFallbackSource {
    fn kind(&self) -> SourceKind {
        SourceKind::StaticFallback
    }

    async fn fetch_release(&self) -> Result<ReleaseInfo, SourceError> {
        tracing::debug!(version = %self.release.version, "using static fallback release");
        self.to_release(SystemTime::now())
    }
}
