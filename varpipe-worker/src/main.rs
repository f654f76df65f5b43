//! Worker entrypoint: explicit construction of every component, then the
//! poll loop until shutdown.

mod config;
mod queue;
mod store;
mod worker;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use varpipe_align::{AlignConfig, BlastClient};
use varpipe_annotate::{AnnotateConfig, Annotator};
use varpipe_http::{HttpClient, RateLimiter};

use crate::config::Config;
use crate::queue::RedisRestQueue;
use crate::store::RestJobStore;
use crate::worker::Worker;

const USER_AGENT: &str = concat!("varpipe/", env!("CARGO_PKG_VERSION"));

/// Concurrency caps per upstream. The entrez-style upstream allows three
/// concurrent requests without an access key; the functional upstream
/// allows fifteen. Queue and store calls share a looser default pool.
const NCBI_MAX_CONCURRENT: usize = 3;
const ENSEMBL_MAX_CONCURRENT: usize = 15;
const DEFAULT_MAX_CONCURRENT: usize = 10;

#[derive(Parser, Debug)]
#[command(
    name = "varpipe-worker",
    version,
    about = "Queue worker for genomic variant analysis jobs"
)]
struct Args {
    /// Queue name to consume, overriding the environment.
    #[arg(long)]
    queue: Option<String>,

    /// Drain the queue once and exit instead of polling forever.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = Config::from_env().context("loading configuration")?;
    if let Some(queue_name) = args.queue {
        config.queue_name = queue_name;
    }
    config.validate().context("configuration is incomplete")?;

    let http = Arc::new(HttpClient::new(USER_AGENT).context("building http client")?);

    // One permit pool per upstream, shared across every component that
    // talks to it: alignment and entrez annotation calls contend for the
    // same pool.
    let ncbi_limiter = Arc::new(RateLimiter::new(NCBI_MAX_CONCURRENT));
    let ensembl_limiter = Arc::new(RateLimiter::new(ENSEMBL_MAX_CONCURRENT));
    let default_limiter = Arc::new(RateLimiter::new(DEFAULT_MAX_CONCURRENT));

    let queue = RedisRestQueue::new(
        http.clone(),
        default_limiter.clone(),
        &config.queue_rest_url,
        &config.queue_rest_token,
        &config.queue_name,
    );
    let store = RestJobStore::new(
        http.clone(),
        default_limiter,
        &config.store_rest_url,
        &config.store_api_key,
    );
    let aligner = BlastClient::new(
        http.clone(),
        ncbi_limiter.clone(),
        AlignConfig {
            base_url: config.blast_base_url.clone(),
            email: config.ncbi_email.clone(),
            poll_timeout: config.blast_timeout,
            ..AlignConfig::default()
        },
    );
    let annotator = Annotator::new(
        http,
        ensembl_limiter,
        ncbi_limiter,
        AnnotateConfig {
            functional_base_url: config.ensembl_base_url.clone(),
            entrez_base_url: config.eutils_base_url.clone(),
            email: config.ncbi_email.clone(),
            api_key: config.ncbi_api_key.clone(),
        },
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    info!(queue = %config.queue_name, "starting worker");
    let mut worker = Worker::new(
        queue,
        store,
        aligner,
        annotator,
        config.poll_interval,
        shutdown_rx,
        args.once,
    );
    worker.run().await;

    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
