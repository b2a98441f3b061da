// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use botanist::cleanup::attributes::CleanupCategory;
use botanist::cleanup::botanist::CleanupCondition;
use botanist::cleanup::{Botanist, CleanContext, KubeTargets, RetryDriver};
use botanist::constants::{
    CLEANUP_POLL_INTERVAL_SECS, DEFAULT_CLEANUP_TIMEOUT_SECS, TOKIO_WORKER_THREADS,
};
use botanist::metrics::gather_metrics;
use botanist::selector::CleanupPolicy;
use clap::Parser;
use kube::Client;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Remove all user resources from a shoot cluster before it is deleted.
#[derive(Debug, Parser)]
#[command(name = "botanist", version, about)]
struct Cli {
    /// Only run this cleanup category (webhooks, extended-apis, kubernetes-resources,
    /// namespaces). All categories run in order when omitted.
    #[arg(long, env = "BOTANIST_CATEGORY")]
    category: Option<CleanupCategory>,

    /// Give up after this many seconds
    #[arg(long, env = "BOTANIST_TIMEOUT_SECS", default_value_t = DEFAULT_CLEANUP_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Seconds between two cleanup attempts of a resource kind
    #[arg(
        long,
        env = "BOTANIST_POLL_INTERVAL_SECS",
        default_value_t = CLEANUP_POLL_INTERVAL_SECS
    )]
    poll_interval_secs: u64,

    /// Shoot annotation as KEY=VALUE; may be repeated and wins over --annotations-file
    #[arg(long = "annotation", value_name = "KEY=VALUE", value_parser = parse_annotation)]
    annotations: Vec<(String, String)>,

    /// YAML file with a map of shoot annotations
    #[arg(long, env = "BOTANIST_ANNOTATIONS_FILE")]
    annotations_file: Option<PathBuf>,

    /// Print Prometheus metrics to stdout when done
    #[arg(long)]
    print_metrics: bool,
}

fn parse_annotation(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

fn load_annotations(
    file: Option<&Path>,
    overrides: &[(String, String)],
) -> Result<BTreeMap<String, String>> {
    let mut annotations = match file {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading annotations file {}", path.display()))?;
            serde_yaml::from_str::<Option<BTreeMap<String, String>>>(&raw)
                .with_context(|| format!("parsing annotations file {}", path.display()))?
                .unwrap_or_default()
        }
        None => BTreeMap::new(),
    };
    annotations.extend(overrides.iter().cloned());
    Ok(annotations)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("botanist")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli))
}

fn init_logging() {
    // Respects RUST_LOG (default: info) and RUST_LOG_FORMAT (json or text)
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main(cli: Cli) -> Result<()> {
    init_logging();

    let annotations = load_annotations(cli.annotations_file.as_deref(), &cli.annotations)?;
    debug!(annotations = ?annotations, "Loaded shoot annotations");

    info!(
        category = ?cli.category.map(|c| c.as_str()),
        timeout_secs = cli.timeout_secs,
        "Starting shoot cleanup"
    );

    let client = Client::try_default().await?;
    let botanist = Botanist::new(KubeTargets::new(client), CleanupPolicy::new()?, annotations)
        .with_driver(RetryDriver::new(Duration::from_secs(cli.poll_interval_secs)));

    let cancellation = CancellationToken::new();
    let ctx = CleanContext::new()
        .with_timeout(Duration::from_secs(cli.timeout_secs))
        .with_cancellation(cancellation.clone());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received interrupt, cancelling cleanup");
            cancellation.cancel();
        }
    });

    let result = match cli.category {
        Some(category) => botanist.clean_category(&ctx, category).await,
        None => botanist.clean_all(&ctx).await,
    };

    let condition = CleanupCondition::from_result(&result);
    println!("{}", serde_json::to_string_pretty(&condition)?);

    if cli.print_metrics {
        println!("{}", gather_metrics()?);
    }

    if let Err(err) = result {
        error!(error = %err, codes = ?err.error_codes(), "Shoot cleanup did not complete");
        return Err(err.into());
    }
    info!("Shoot cleanup complete");
    Ok(())
}
