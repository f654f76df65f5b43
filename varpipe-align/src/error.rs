use thiserror::Error;

use varpipe_http::UpstreamError;

/// Failures while obtaining an alignment. All of these are job-level: the
/// worker converts them into a FAILED job rather than retrying here.
#[derive(Debug, Error)]
pub enum AlignError {
    /// The upstream requires a contact email; refuse before any network
    /// call rather than discover it mid-search.
    #[error("a contact email is required to submit alignment searches")]
    MissingEmail,

    #[error("aligner did not return a request id")]
    MissingRequestId,

    #[error("alignment search {rid} failed upstream")]
    SearchFailed { rid: String },

    #[error("alignment search {rid} expired upstream")]
    SearchExpired { rid: String },

    #[error("alignment search {rid} still running after {waited_secs}s")]
    PollTimeout { rid: String, waited_secs: u64 },

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

pub type AlignResult<T> = std::result::Result<T, AlignError>;
