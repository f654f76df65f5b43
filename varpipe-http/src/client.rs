use std::future::Future;
use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use tracing::warn;

use crate::error::UpstreamError;
use crate::limiter::RateLimiter;

/// Additional attempts after the first failed one, so at most
/// `MAX_RETRIES + 1` requests go out per call.
pub const MAX_RETRIES: u32 = 3;

/// Status codes worth retrying: rate limiting and transient server errors.
pub const RETRY_STATUS_CODES: [u16; 5] = [429, 500, 502, 503, 504];

const BACKOFF_BASE: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Map a response to the closed error set: 2xx passes through, the
/// retryable status class and everything else become their own variants.
pub fn check_status(response: reqwest::Response) -> Result<reqwest::Response, UpstreamError> {
    let status = response.status().as_u16();
    if response.status().is_success() {
        Ok(response)
    } else if RETRY_STATUS_CODES.contains(&status) {
        Err(UpstreamError::Retryable { status })
    } else {
        Err(UpstreamError::Status { status })
    }
}

/// Shared request executor with per-upstream rate limiting and
/// exponential-backoff retry.
///
/// One instance is constructed at worker startup and passed to every
/// component that talks to the network; the underlying `reqwest::Client`
/// pools connections across all of them.
pub struct HttpClient {
    inner: reqwest::Client,
    max_retries: u32,
    backoff_base: Duration,
}

impl HttpClient {
    pub fn new(user_agent: &str) -> Result<Self, UpstreamError> {
        Self::with_retry_policy(user_agent, MAX_RETRIES, BACKOFF_BASE)
    }

    pub fn with_retry_policy(
        user_agent: &str,
        max_retries: u32,
        backoff_base: Duration,
    ) -> Result<Self, UpstreamError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let inner = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(user_agent)
            .default_headers(headers)
            .build()?;

        Ok(HttpClient {
            inner,
            max_retries,
            backoff_base,
        })
    }

    /// Direct access to the pooled client, for callers that build their own
    /// requests and route them through [`HttpClient::execute`].
    pub fn inner(&self) -> &reqwest::Client {
        &self.inner
    }

    /// Backoff before retry number `attempt + 1`: `base * 2^attempt`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.backoff_base * 2u32.pow(attempt)
    }

    /// Run `op` under a limiter permit, retrying the retryable failure
    /// class with exponential backoff.
    ///
    /// The permit is held for the duration of one attempt and released
    /// before any backoff sleep. Non-retryable errors return immediately;
    /// exhausting all attempts returns the last retryable error.
    pub async fn execute<T, F, Fut>(
        &self,
        limiter: &RateLimiter,
        mut op: F,
    ) -> Result<T, UpstreamError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let mut attempt = 0;
        loop {
            let outcome = {
                let _permit = limiter.acquire().await;
                op().await
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    let wait = self.backoff_delay(attempt);
                    warn!(
                        attempt = attempt + 1,
                        wait_secs = wait.as_secs_f64(),
                        error = %err,
                        "retryable upstream failure, backing off"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// GET `url` with the given query parameters and optional extra
    /// headers, under the retry policy.
    pub async fn get_with_retry(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: Option<HeaderMap>,
        limiter: &RateLimiter,
    ) -> Result<reqwest::Response, UpstreamError> {
        self.execute(limiter, || {
            let mut request = self.inner.get(url).query(query);
            if let Some(extra) = &headers {
                request = request.headers(extra.clone());
            }
            async move {
                let response = request.send().await.map_err(UpstreamError::from_transport)?;
                check_status(response)
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn client() -> HttpClient {
        HttpClient::new("varpipe-test/0").unwrap()
    }

    #[rstest]
    #[case(0, 1)]
    #[case(1, 2)]
    #[case(2, 4)]
    #[case(3, 8)]
    fn backoff_doubles_per_attempt(#[case] attempt: u32, #[case] secs: u64) {
        assert_eq!(client().backoff_delay(attempt), Duration::from_secs(secs));
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_429_sleeps_1_2_4_then_fails_after_four_attempts() {
        let client = client();
        let limiter = RateLimiter::new(1);
        let attempts = Arc::new(AtomicU32::new(0));

        let counter = attempts.clone();
        let start = tokio::time::Instant::now();
        let result: Result<(), UpstreamError> = client
            .execute(&limiter, move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(UpstreamError::Retryable { status: 429 }) }
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(7));
        assert!(matches!(
            result,
            Err(UpstreamError::Retryable { status: 429 })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_status_fails_without_retry() {
        let client = client();
        let limiter = RateLimiter::new(1);
        let attempts = Arc::new(AtomicU32::new(0));

        let counter = attempts.clone();
        let start = tokio::time::Instant::now();
        let result: Result<(), UpstreamError> = client
            .execute(&limiter, move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(UpstreamError::Status { status: 404 }) }
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(matches!(result, Err(UpstreamError::Status { status: 404 })));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_retried_until_success() {
        let client = client();
        let limiter = RateLimiter::new(1);
        let attempts = Arc::new(AtomicU32::new(0));

        let counter = attempts.clone();
        let result = client
            .execute(&limiter, move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(UpstreamError::Timeout)
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(result.unwrap(), "done");
    }

    #[tokio::test]
    async fn success_returns_on_first_attempt() {
        let client = client();
        let limiter = RateLimiter::new(1);

        let result: Result<u32, UpstreamError> =
            client.execute(&limiter, || async { Ok(7) }).await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(limiter.available_permits(), 1);
    }
}
