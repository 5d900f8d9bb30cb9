//! Terminal view and render surfaces used by the commands.

use anyhow::Result;
use relbeacon_core::config;
use relbeacon_core::error::RenderError;
use relbeacon_core::release::{format_megabytes, ReleaseInfo};
use relbeacon_core::sink::{RenderOptions, Renderer, View, ViewStatus};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Prints status lines and release summaries to stdout.
pub struct ConsoleView;

impl View for ConsoleView {
    fn show_status(&self, status: ViewStatus, message: &str) {
        let tag = match status {
            ViewStatus::Loading => "..",
            ViewStatus::Success => "ok",
            ViewStatus::Error => "!!",
        };
        println!("[{}] {}", tag, message);
    }

    fn show_release(&self, release: &ReleaseInfo) {
        print!("{}", release_summary(release));
    }
}

pub fn release_summary(release: &ReleaseInfo) -> String {
    let size = format_megabytes(release.size_bytes).unwrap_or_else(|| "unknown".to_string());
    let mut out = format!(
        "Version:   {} ({})\nSize:      {}\nPublished: {}\nSource:    {:?}\n\
         Commit:    {}\nAsset:     {}\nDownload:  {}\n",
        release.version,
        release.build_variant,
        size,
        humantime::format_rfc3339_seconds(release.published_at),
        release.source_kind,
        release.commit,
        release.asset_name,
        release.download_url,
    );
    if !release.notes.is_empty() {
        out.push_str("Notes:\n");
        for line in release.notes.lines() {
            out.push_str("  ");
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// Renderer for commands that resolve without publishing a code.
pub struct DiscardRenderer;

impl Renderer for DiscardRenderer {
    fn render(&self, payload_url: &str, _options: &RenderOptions) -> Result<(), RenderError> {
        tracing::trace!(payload = payload_url, "render request discarded");
        Ok(())
    }
}

/// `~/.local/state/relbeacon/code.json`.
pub fn default_surface() -> Result<PathBuf> {
    Ok(config::state_dir()?.join("code.json"))
}

/// Request picked up by the code-image renderer.
#[derive(Debug, Serialize)]
struct RenderRequest<'a> {
    payload: &'a str,
    options: &'a RenderOptions,
    requested_at: String,
}

/// Writes each render request as JSON to a surface file, replacing it
/// atomically so readers never see a partial document.
pub struct PayloadRenderer {
    surface: PathBuf,
}

impl PayloadRenderer {
    pub fn new(surface: PathBuf) -> Self {
        Self { surface }
    }

    pub fn surface(&self) -> &Path {
        &self.surface
    }

    fn write(&self, payload_url: &str, options: &RenderOptions) -> std::io::Result<()> {
        let request = RenderRequest {
            payload: payload_url,
            options,
            requested_at: humantime::format_rfc3339_seconds(SystemTime::now()).to_string(),
        };
        let data = serde_json::to_vec_pretty(&request)?;
        if let Some(parent) = self.surface.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.surface.with_extension("json.tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &self.surface)
    }
}

impl Renderer for PayloadRenderer {
    fn render(&self, payload_url: &str, options: &RenderOptions) -> Result<(), RenderError> {
        if payload_url.trim().is_empty() {
            return Err(RenderError::Render("empty payload".to_string()));
        }
        self.write(payload_url, options)
            .map_err(|e| RenderError::Render(format!("{}: {}", self.surface.display(), e)))?;
        tracing::debug!(
            surface = %self.surface.display(),
            payload = payload_url,
            "render request written"
        );
        Ok(())
    }
}
