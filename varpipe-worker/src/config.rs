//! Worker configuration from environment variables.
//!
//! Everything has a default except the collaborator credentials. The queue
//! and store settings are checked up front by [`Config::validate`] so a
//! misconfigured worker fails at startup instead of on first use; the
//! aligner email is deliberately left to the alignment client, which
//! raises it per operation.

use std::env;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_QUEUE_NAME: &str = "variant-analysis-queue";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
const DEFAULT_BLAST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    MissingVar(&'static str),

    #[error("environment variable {var} has invalid value {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Redis REST endpoint of the job queue.
    pub queue_rest_url: String,
    pub queue_rest_token: String,
    pub queue_name: String,

    /// REST endpoint of the persistent store.
    pub store_rest_url: String,
    pub store_api_key: String,

    /// Contact email required by the alignment and entrez upstreams.
    pub ncbi_email: Option<String>,
    /// Optional access key raising the entrez rate ceiling.
    pub ncbi_api_key: Option<String>,

    pub blast_base_url: String,
    pub eutils_base_url: String,
    pub ensembl_base_url: String,

    /// Sleep between empty queue polls.
    pub poll_interval: Duration,
    /// Ceiling on waiting for one alignment search.
    pub blast_timeout: Duration,
}

fn env_opt(name: &'static str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

fn env_or(name: &'static str, default: &str) -> String {
    env_opt(name).unwrap_or_else(|| default.to_string())
}

fn env_secs(name: &'static str, default: u64) -> Result<Duration, ConfigError> {
    match env_opt(name) {
        None => Ok(Duration::from_secs(default)),
        Some(value) => value
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError::InvalidValue { var: name, value }),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Config {
            queue_rest_url: env_or("QUEUE_REST_URL", ""),
            queue_rest_token: env_or("QUEUE_REST_TOKEN", ""),
            queue_name: env_or("QUEUE_NAME", DEFAULT_QUEUE_NAME),
            store_rest_url: env_or("STORE_REST_URL", ""),
            store_api_key: env_or("STORE_API_KEY", ""),
            ncbi_email: env_opt("NCBI_EMAIL"),
            ncbi_api_key: env_opt("NCBI_API_KEY"),
            blast_base_url: env_or("BLAST_BASE_URL", varpipe_align::client::DEFAULT_BASE_URL),
            eutils_base_url: env_or(
                "EUTILS_BASE_URL",
                varpipe_annotate::annotator::DEFAULT_ENTREZ_BASE_URL,
            ),
            ensembl_base_url: env_or(
                "ENSEMBL_BASE_URL",
                varpipe_annotate::annotator::DEFAULT_FUNCTIONAL_BASE_URL,
            ),
            poll_interval: env_secs("WORKER_POLL_INTERVAL", DEFAULT_POLL_INTERVAL_SECS)?,
            blast_timeout: env_secs("BLAST_TIMEOUT", DEFAULT_BLAST_TIMEOUT_SECS)?,
        })
    }

    /// Readiness check for the collaborators the worker cannot run without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_rest_url.is_empty() {
            return Err(ConfigError::MissingVar("QUEUE_REST_URL"));
        }
        if self.queue_rest_token.is_empty() {
            return Err(ConfigError::MissingVar("QUEUE_REST_TOKEN"));
        }
        if self.store_rest_url.is_empty() {
            return Err(ConfigError::MissingVar("STORE_REST_URL"));
        }
        if self.store_api_key.is_empty() {
            return Err(ConfigError::MissingVar("STORE_API_KEY"));
        }
        Ok(())
    }
}
