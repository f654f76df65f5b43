//! Client for the aligner's URL API.
//!
//! The upstream runs searches asynchronously: a submission returns a
//! request id, the id is polled until the search leaves the queue, and the
//! finished report is fetched as JSON. From the worker's perspective the
//! whole exchange is one long-running call.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

use varpipe_core::AlignmentResult;
use varpipe_http::client::check_status;
use varpipe_http::{HttpClient, RateLimiter, UpstreamError};

use crate::error::{AlignError, AlignResult};
use crate::report::BlastReport;

pub const DEFAULT_BASE_URL: &str = "https://blast.ncbi.nlm.nih.gov/Blast.cgi";

/// Tool identification sent with every submission, per upstream usage policy.
const TOOL: &str = "varpipe";

#[derive(Debug, Clone)]
pub struct AlignConfig {
    pub base_url: String,
    /// Contact email the upstream requires for submissions.
    pub email: Option<String>,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
}

impl Default for AlignConfig {
    fn default() -> Self {
        AlignConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            email: None,
            poll_interval: Duration::from_secs(10),
            poll_timeout: Duration::from_secs(120),
        }
    }
}

/// The alignment seam the worker depends on.
#[async_trait]
pub trait Aligner: Send + Sync {
    async fn align(&self, sequence: &str) -> AlignResult<AlignmentResult>;
}

pub struct BlastClient {
    http: Arc<HttpClient>,
    limiter: Arc<RateLimiter>,
    config: AlignConfig,
}

#[derive(Debug, PartialEq, Eq)]
enum SearchStatus {
    Waiting,
    Ready { has_hits: bool },
    Failed,
    Expired,
}

/// The submission response embeds the request id in a comment block as a
/// `RID = <id>` line.
fn parse_request_id(body: &str) -> Option<String> {
    body.lines()
        .find_map(|line| line.trim().strip_prefix("RID ="))
        .map(|rid| rid.trim().to_string())
        .filter(|rid| !rid.is_empty())
}

fn parse_search_status(body: &str) -> SearchStatus {
    if body.contains("Status=FAILED") {
        SearchStatus::Failed
    } else if body.contains("Status=UNKNOWN") {
        SearchStatus::Expired
    } else if body.contains("Status=READY") {
        SearchStatus::Ready {
            has_hits: body.contains("ThereAreHits=yes"),
        }
    } else {
        SearchStatus::Waiting
    }
}

impl BlastClient {
    pub fn new(http: Arc<HttpClient>, limiter: Arc<RateLimiter>, config: AlignConfig) -> Self {
        BlastClient {
            http,
            limiter,
            config,
        }
    }

    async fn submit(&self, sequence: &str, email: &str) -> AlignResult<String> {
        let params: Vec<(&str, String)> = vec![
            ("CMD", "Put".to_string()),
            ("PROGRAM", "blastn".to_string()),
            ("DATABASE", "nt".to_string()),
            ("QUERY", sequence.to_string()),
            ("ENTREZ_QUERY", "Homo sapiens[organism]".to_string()),
            ("HITLIST_SIZE", "10".to_string()),
            ("EXPECT", "0.001".to_string()),
            ("WORD_SIZE", "11".to_string()),
            ("MEGABLAST", "on".to_string()),
            ("TOOL", TOOL.to_string()),
            ("EMAIL", email.to_string()),
        ];

        let body = self
            .http
            .execute(&self.limiter, || {
                let request = self.http.inner().post(&self.config.base_url).form(&params);
                async move {
                    let response =
                        request.send().await.map_err(UpstreamError::from_transport)?;
                    let response = check_status(response)?;
                    response.text().await.map_err(UpstreamError::from_transport)
                }
            })
            .await?;

        parse_request_id(&body).ok_or(AlignError::MissingRequestId)
    }

    async fn search_info(&self, rid: &str) -> AlignResult<String> {
        let query = [
            ("CMD", "Get".to_string()),
            ("RID", rid.to_string()),
            ("FORMAT_OBJECT", "SearchInfo".to_string()),
        ];
        let response = self
            .http
            .get_with_retry(&self.config.base_url, &query, None, &self.limiter)
            .await?;
        Ok(response.text().await.map_err(UpstreamError::from_transport)?)
    }

    /// Poll until the search is ready, returning whether it found hits.
    async fn wait_until_ready(&self, rid: &str) -> AlignResult<bool> {
        let deadline = Instant::now() + self.config.poll_timeout;
        loop {
            sleep(self.config.poll_interval).await;

            let body = self.search_info(rid).await?;
            match parse_search_status(&body) {
                SearchStatus::Ready { has_hits } => return Ok(has_hits),
                SearchStatus::Failed => {
                    return Err(AlignError::SearchFailed { rid: rid.to_string() });
                }
                SearchStatus::Expired => {
                    return Err(AlignError::SearchExpired { rid: rid.to_string() });
                }
                SearchStatus::Waiting => {
                    debug!(rid, "alignment search still running");
                }
            }

            if Instant::now() >= deadline {
                return Err(AlignError::PollTimeout {
                    rid: rid.to_string(),
                    waited_secs: self.config.poll_timeout.as_secs(),
                });
            }
        }
    }

    async fn fetch_report(&self, rid: &str) -> AlignResult<BlastReport> {
        let query = [
            ("CMD", "Get".to_string()),
            ("RID", rid.to_string()),
            ("FORMAT_TYPE", "JSON2_S".to_string()),
        ];
        let response = self
            .http
            .get_with_retry(&self.config.base_url, &query, None, &self.limiter)
            .await?;
        Ok(response
            .json::<BlastReport>()
            .await
            .map_err(UpstreamError::from_transport)?)
    }
}

#[async_trait]
impl Aligner for BlastClient {
    async fn align(&self, sequence: &str) -> AlignResult<AlignmentResult> {
        let email = self
            .config
            .email
            .as_deref()
            .filter(|email| !email.is_empty())
            .ok_or(AlignError::MissingEmail)?;

        info!(sequence_length = sequence.len(), "submitting alignment search");
        let rid = self.submit(sequence, email).await?;
        info!(%rid, "alignment search queued upstream");

        let has_hits = self.wait_until_ready(&rid).await?;
        if !has_hits {
            info!(%rid, "alignment search finished without hits");
            return Ok(AlignmentResult::empty(sequence.len()));
        }

        let report = self.fetch_report(&rid).await?;
        let result = report.into_alignment_result(sequence.len());
        info!(
            total_hits = result.hits().len(),
            best_chromosome = ?result.best_hit().map(|h| h.chromosome.as_str()),
            "alignment search completed"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn request_id_is_scraped_from_comment_block() {
        let body = "<!--QBlastInfoBegin\n    RID = ABC123XYZ\n    RTOE = 25\nQBlastInfoEnd\n-->";
        assert_eq!(parse_request_id(body).as_deref(), Some("ABC123XYZ"));
    }

    #[test]
    fn missing_request_id_is_none() {
        assert_eq!(parse_request_id("<html>no id here</html>"), None);
        assert_eq!(parse_request_id("RID =   "), None);
    }

    #[test]
    fn search_status_parsing() {
        assert_eq!(
            parse_search_status("\tStatus=WAITING\n"),
            SearchStatus::Waiting
        );
        assert_eq!(parse_search_status("Status=FAILED"), SearchStatus::Failed);
        assert_eq!(parse_search_status("Status=UNKNOWN"), SearchStatus::Expired);
        assert_eq!(
            parse_search_status("Status=READY\nThereAreHits=yes"),
            SearchStatus::Ready { has_hits: true }
        );
        assert_eq!(
            parse_search_status("Status=READY\n"),
            SearchStatus::Ready { has_hits: false }
        );
    }

    #[tokio::test]
    async fn align_without_email_is_a_configuration_error() {
        // The check must fire before any request is attempted.
        let http = Arc::new(HttpClient::new("varpipe-test/0").unwrap());
        let limiter = Arc::new(RateLimiter::new(1));
        let client = BlastClient::new(http, limiter, AlignConfig::default());

        let result = client.align("ATGC").await;
        assert!(matches!(result, Err(AlignError::MissingEmail)));
    }
}
