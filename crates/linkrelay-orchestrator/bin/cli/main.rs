mod cli;

use crate::cli::{with_default_scheme, Cli, Command};
use anyhow::{bail, Context};
use clap::Parser;
use linkrelay_cache::{CacheStore, InMemoryCacheStore, JsonFileCacheStore};
use linkrelay_orchestrator::{BatchResult, Orchestrator, OrchestratorConfig, Settings};
use linkrelay_provider::HttpTransport;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    linkrelay_telemetry::init(cli.log_format.into())?;

    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(path) = cli.cache_path {
        settings.cache.path = Some(path);
    }

    info!(
        config = ?cli.config,
        cache_path = ?settings.cache.path,
        log_format = %cli.log_format,
        "starting linkrelay"
    );

    match cli.command {
        Command::Shorten {
            urls,
            batch_timeout_ms,
            wait_for_rate_limit,
            json,
        } => {
            if wait_for_rate_limit {
                settings.orchestrator.wait_for_rate_limit = true;
            }
            let config = settings.orchestrator.with_default_providers();
            let expiry = config.cache_expiry();
            let inputs: Vec<String> = urls.iter().map(|u| with_default_scheme(u)).collect();
            let timeout = batch_timeout_ms.map(Duration::from_millis);

            match settings.cache.path {
                Some(path) => {
                    let cache = JsonFileCacheStore::open(&path, expiry)
                        .await
                        .with_context(|| format!("failed to open cache file {}", path.display()))?;
                    shorten(config, cache, &inputs, timeout, json).await
                }
                None => {
                    shorten(config, InMemoryCacheStore::with_expiry(expiry), &inputs, timeout, json)
                        .await
                }
            }
        }
        Command::Purge => {
            let Some(path) = settings.cache.path else {
                bail!("purge needs a cache file, set --cache-path or cache.path");
            };
            let expiry = settings.orchestrator.cache_expiry();
            if expiry.ttl().is_none() {
                warn!("cache_ttl_seconds is not set, nothing can expire");
            }

            let cache = JsonFileCacheStore::open(&path, expiry).await?;
            let removed = cache.purge_expired().await?;
            println!(
                "removed {removed} expired entries, {} remaining",
                cache.len().await?
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn shorten<S: CacheStore>(
    config: OrchestratorConfig,
    cache: S,
    inputs: &[String],
    timeout: Option<Duration>,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let transport = HttpTransport::new(config.request_timeout(), &config.user_agent)?;
    let orchestrator = Orchestrator::new(config, cache, transport)?;

    let batch = match timeout {
        Some(timeout) => orchestrator.shorten_batch_with_timeout(inputs, timeout).await,
        None => orchestrator.shorten_batch(inputs).await,
    };

    if json {
        let report = serde_json::json!({
            "results": &batch,
            "stats": orchestrator.stats(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_batch(&batch);
        println!();
        println!("{}", orchestrator.stats());
    }

    Ok(if batch.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_batch(batch: &BatchResult) {
    for result in batch {
        let source = match (&result.provider_used, result.cache_hit) {
            (Some(provider), true) => format!(" [{provider}, cached]"),
            (Some(provider), false) => format!(" [{provider}]"),
            (None, _) => String::new(),
        };
        println!(
            "{} -> {}{} ({}ms)",
            result.input_url, result.outcome, source, result.elapsed_ms
        );
    }
}
