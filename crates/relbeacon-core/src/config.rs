use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sink::RenderOptions;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after a failed refresh before giving up and showing the fallback.
    pub max_retries: u32,
    /// Base delay; retry `n` waits `n * retry_delay_ms`.
    pub retry_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 5000,
        }
    }
}

/// Hard-coded release used when every other source fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackRelease {
    pub version: String,
    pub download_url: String,
    pub asset_name: String,
}

impl Default for FallbackRelease {
    fn default() -> Self {
        Self {
            version: "v1.0.6+7".to_string(),
            download_url: "./app-release.apk".to_string(),
            asset_name: "app-fallback.apk".to_string(),
        }
    }
}

pub const DEFAULT_GITHUB_REPO: &str = "gerardoojeda47/rutasapp";

/// Global configuration loaded from `~/.config/relbeacon/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BeaconConfig {
    /// `owner/name` of the repository whose latest release is distributed.
    pub github_repo: String,
    /// Base URL of the release API.
    pub api_base: String,
    /// Prefix for synthesized artifact names (`<app_name>-<version>.apk`).
    pub app_name: String,
    /// Periodic refresh interval.
    pub update_interval_ms: u64,
    /// Deadline for each HEAD/GET request.
    pub request_timeout_ms: u64,
    /// Validation results younger than this are served from cache.
    pub validation_cache_max_age_ms: u64,
    /// Hidden for longer than this means a refresh on becoming visible.
    pub staleness_threshold_ms: u64,
    /// Delay between becoming visible and refreshing.
    pub visibility_settle_ms: u64,
    /// Delay between regaining connectivity and refreshing.
    pub online_settle_ms: u64,
    /// KEY=VALUE build manifest: a URL if it has a scheme, else a file path.
    pub manifest_location: String,
    /// Extra candidates for `validate`/robust link selection.
    pub fallback_urls: Vec<String>,
    /// Optional retry policy; if missing, built-in defaults are used.
    pub retry: Option<RetryConfig>,
    /// Optional code rendering options; if missing, built-in defaults are used.
    pub render: Option<RenderOptions>,
    /// Optional static fallback release; if missing, built-in defaults are used.
    pub fallback: Option<FallbackRelease>,
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            github_repo: DEFAULT_GITHUB_REPO.to_string(),
            api_base: "https://api.github.com".to_string(),
            app_name: "app".to_string(),
            update_interval_ms: 30_000,
            request_timeout_ms: 10_000,
            validation_cache_max_age_ms: 5 * 60 * 1000,
            staleness_threshold_ms: 5 * 60 * 1000,
            visibility_settle_ms: 1000,
            online_settle_ms: 2000,
            manifest_location: "./latest-build.txt".to_string(),
            fallback_urls: vec![
                "./app-release.apk".to_string(),
                format!(
                    "https://github.com/{}/releases/latest/download/app-release.apk",
                    DEFAULT_GITHUB_REPO
                ),
            ],
            retry: None,
            render: None,
            fallback: None,
        }
    }
}

impl BeaconConfig {
    pub fn retry_config(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }

    pub fn render_options(&self) -> RenderOptions {
        self.render.clone().unwrap_or_default()
    }

    pub fn fallback_release(&self) -> FallbackRelease {
        self.fallback.clone().unwrap_or_default()
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validation_cache_max_age(&self) -> Duration {
        Duration::from_millis(self.validation_cache_max_age_ms)
    }

    pub fn staleness_threshold(&self) -> Duration {
        Duration::from_millis(self.staleness_threshold_ms)
    }

    pub fn visibility_settle(&self) -> Duration {
        Duration::from_millis(self.visibility_settle_ms)
    }

    pub fn online_settle(&self) -> Duration {
        Duration::from_millis(self.online_settle_ms)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("relbeacon")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// `~/.local/state/relbeacon`: log file and render surface live here.
pub fn state_dir() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("relbeacon")?;
    Ok(xdg_dirs.get_state_home().join("relbeacon"))
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<BeaconConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = BeaconConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    load_from_path(&path)
}

/// Load configuration from an explicit file.
pub fn load_from_path(path: &Path) -> Result<BeaconConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let cfg: BeaconConfig =
        toml::from_str(&data).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(cfg)
}
