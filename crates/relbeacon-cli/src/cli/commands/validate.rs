//! `relbeacon validate` – check candidate URLs and print the ranking.

use anyhow::{bail, Result};
use relbeacon_core::config::BeaconConfig;
use relbeacon_core::net::CurlClient;
use relbeacon_core::release::format_size;
use relbeacon_core::validator::{ArtifactValidator, RankOutcome, ValidateOptions};
use std::sync::Arc;

pub async fn run_validate(cfg: &BeaconConfig, urls: Vec<String>, json: bool) -> Result<()> {
    let urls = if urls.is_empty() {
        cfg.fallback_urls.clone()
    } else {
        urls
    };
    if urls.is_empty() {
        bail!("no URLs given and no fallback_urls configured");
    }

    let client = Arc::new(CurlClient::new(cfg.request_timeout()));
    let validator = ArtifactValidator::new(client, cfg.request_timeout());
    let options = ValidateOptions {
        max_cache_age: cfg.validation_cache_max_age(),
    };
    let outcome = validator.rank(&urls, options).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }
    print_table(&outcome);
    if outcome.results.len() < urls.len() {
        println!(
            "Stopped after {} of {} candidates: found a plausible artifact.",
            outcome.results.len(),
            urls.len()
        );
    }
    Ok(())
}

fn print_table(outcome: &RankOutcome) {
    println!(
        "{:<2} {:<8} {:<10} {:<6} {:<40} {}",
        "", "STATUS", "SIZE", "SCORE", "TYPE", "URL"
    );
    let best_url = outcome.best.as_ref().map(|b| b.url.as_str());
    for c in &outcome.results {
        let marker = if Some(c.url.as_str()) == best_url {
            "*"
        } else {
            ""
        };
        let status = match (&c.result.error, c.result.http_status) {
            (Some(failure), _) if failure.is_timeout => "timeout".to_string(),
            (Some(_), None) => "error".to_string(),
            (_, Some(code)) => code.to_string(),
            (None, None) => "-".to_string(),
        };
        let size = if c.result.content_length_bytes > 0 {
            format_size(c.result.content_length_bytes)
        } else {
            "-".to_string()
        };
        let content_type = if c.result.content_type.is_empty() {
            "-"
        } else {
            c.result.content_type.as_str()
        };
        println!(
            "{:<2} {:<8} {:<10} {:<6} {:<40} {}",
            marker, status, size, c.score, content_type, c.url
        );
    }
    match &outcome.best {
        Some(best) if best.result.is_reachable => println!("Best: {}", best.url),
        _ => println!("No reachable candidate."),
    }
}
