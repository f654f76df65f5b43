use thiserror::Error;

/// Closed set of failure outcomes for one upstream request.
///
/// `Timeout` and `Retryable` are the retryable class; everything else fails
/// the request immediately. Exhausting all retry attempts surfaces the last
/// retryable error, so callers cannot distinguish "retries exhausted" from
/// a first-attempt hard failure beyond the variant itself.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request timed out")]
    Timeout,

    #[error("upstream returned retryable status {status}")]
    Retryable { status: u16 },

    #[error("upstream returned status {status}")]
    Status { status: u16 },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl UpstreamError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, UpstreamError::Timeout | UpstreamError::Retryable { .. })
    }

    /// Classify a transport-level error, separating timeouts (retryable)
    /// from everything else.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout
        } else {
            UpstreamError::Transport(err)
        }
    }
}
