//! `relbeacon download` – fetch the artifact, trying mirrors in order.

use anyhow::Result;
use relbeacon_core::config::BeaconConfig;
use relbeacon_core::download::{
    download_with_fallback, DownloadOptions, DownloadProgress, DownloadedArtifact, ProgressFn,
};
use relbeacon_core::net::CurlClient;
use relbeacon_core::release::{filename_from_url, format_size};
use relbeacon_core::resolver::ReleaseResolver;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::sinks::{ConsoleView, DiscardRenderer};

pub async fn run_download(
    cfg: &BeaconConfig,
    url: Option<String>,
    out: Option<PathBuf>,
) -> Result<()> {
    let client = Arc::new(CurlClient::new(cfg.request_timeout()));
    let resolver = ReleaseResolver::from_config(
        cfg,
        client,
        Arc::new(DiscardRenderer),
        Arc::new(ConsoleView),
    );

    let primary = match url {
        Some(url) => url,
        None => {
            let release = resolver.resolve().await?;
            println!("Resolved {} from {:?}", release.version, release.source_kind);
            release.download_url
        }
    };
    let out_dir = out.unwrap_or_else(|| PathBuf::from("."));

    let progress: ProgressFn = Arc::new(|url: &str, p: DownloadProgress| {
        print!("\r{}", progress_line(url, p));
        let _ = std::io::stdout().flush();
    });
    let artifact = download_with_fallback(
        resolver.validator(),
        &primary,
        &cfg.fallback_urls,
        &out_dir,
        DownloadOptions::from_config(cfg),
        progress,
    )
    .await?;
    println!();

    print!("{}", download_summary(&artifact));
    Ok(())
}

fn progress_line(url: &str, p: DownloadProgress) -> String {
    let name = filename_from_url(url);
    match (p.total, p.percent()) {
        (Some(total), Some(pct)) => format!(
            "{}: {} / {} ({:.0}%)",
            name,
            format_size(p.downloaded),
            format_size(total),
            pct
        ),
        _ => format!("{}: {}", name, format_size(p.downloaded)),
    }
}

fn download_summary(artifact: &DownloadedArtifact) -> String {
    let mut out = format!(
        "Saved:     {}\nSize:      {}\nFrom:      {}\n",
        artifact.path.display(),
        format_size(artifact.bytes),
        artifact.url
    );
    for failed in &artifact.failed {
        out.push_str(&format!("Skipped:   {} ({})\n", failed.url, failed.error));
    }
    out
}
