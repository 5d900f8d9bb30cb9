//! `relbeacon resolve` – one pass through the source chain, no rendering.

use anyhow::Result;
use relbeacon_core::config::BeaconConfig;
use relbeacon_core::net::CurlClient;
use relbeacon_core::release::ReleaseInfo;
use relbeacon_core::resolver::ReleaseResolver;
use relbeacon_core::validator::{RobustLink, ValidateOptions};
use serde::Serialize;
use std::sync::Arc;

use crate::cli::sinks::{release_summary, ConsoleView, DiscardRenderer};

#[derive(Serialize)]
struct Resolved<'a> {
    release: &'a ReleaseInfo,
    link: &'a RobustLink,
}

pub async fn run_resolve(cfg: &BeaconConfig, json: bool) -> Result<()> {
    let client = Arc::new(CurlClient::new(cfg.request_timeout()));
    let resolver = ReleaseResolver::from_config(
        cfg,
        client,
        Arc::new(DiscardRenderer),
        Arc::new(ConsoleView),
    );

    let release = resolver.resolve().await?;
    let options = ValidateOptions {
        max_cache_age: cfg.validation_cache_max_age(),
    };
    let link = resolver
        .validator()
        .robust_link(&release.download_url, &[], &cfg.fallback_urls, options)
        .await;

    if json {
        let doc = Resolved {
            release: &release,
            link: &link,
        };
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    print!("{}", release_summary(&release));
    match &link.validation {
        Some(v) if v.is_reachable && v.artifact_plausible => {
            println!("Link:      ok ({})", link.primary.as_deref().unwrap_or("-"))
        }
        Some(v) if v.is_reachable => println!(
            "Link:      reachable but does not look like a package ({})",
            link.primary.as_deref().unwrap_or("-")
        ),
        _ => println!("Link:      no candidate is reachable"),
    }
    for url in &link.fallbacks {
        println!("Mirror:    {}", url);
    }
    Ok(())
}
