//! Rate-limited, retrying HTTP request layer.
//!
//! Every upstream call in the pipeline funnels through [`HttpClient`]: a
//! thin wrapper over one shared `reqwest::Client` that acquires a
//! per-upstream [`RateLimiter`] permit for each attempt and retries the
//! retryable failure class with exponential backoff. Callers get back a
//! small closed set of [`UpstreamError`] variants instead of a grab-bag of
//! transport errors.

pub mod client;
pub mod error;
pub mod limiter;

pub use client::{HttpClient, MAX_RETRIES, RETRY_STATUS_CODES};
pub use error::UpstreamError;
pub use limiter::RateLimiter;
