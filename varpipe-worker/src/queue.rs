//! Job queue collaborator.
//!
//! The queue is a FIFO of job ids behind a Redis-compatible REST endpoint.
//! The worker only ever needs one operation: a non-blocking pop that
//! returns the next id or nothing.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;

use varpipe_http::{HttpClient, RateLimiter, UpstreamError};

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Pop the next job id, or `None` when the queue is empty.
    async fn pop(&self) -> Result<Option<String>, UpstreamError>;
}

/// Upstash-compatible Redis REST queue client.
pub struct RedisRestQueue {
    http: Arc<HttpClient>,
    limiter: Arc<RateLimiter>,
    base_url: String,
    token: String,
    queue_name: String,
}

#[derive(Debug, Deserialize)]
struct PopReply {
    result: Option<serde_json::Value>,
}

/// REST transports differ on whether queued strings come back bare or
/// JSON-quoted; accept both.
fn normalize_reply(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => {
            if s.starts_with('"') && s.ends_with('"') && s.len() >= 2 {
                serde_json::from_str::<String>(&s).ok().or(Some(s))
            } else {
                Some(s)
            }
        }
        other => Some(other.to_string()),
    }
}

impl RedisRestQueue {
    pub fn new(
        http: Arc<HttpClient>,
        limiter: Arc<RateLimiter>,
        base_url: &str,
        token: &str,
        queue_name: &str,
    ) -> Self {
        RedisRestQueue {
            http,
            limiter,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            queue_name: queue_name.to_string(),
        }
    }

    fn auth_headers(&self) -> Option<HeaderMap> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Bearer {}", self.token)).ok()?;
        headers.insert(AUTHORIZATION, value);
        Some(headers)
    }
}

#[async_trait]
impl JobQueue for RedisRestQueue {
    async fn pop(&self) -> Result<Option<String>, UpstreamError> {
        let url = format!("{}/rpop/{}", self.base_url, self.queue_name);
        let response = self
            .http
            .get_with_retry(&url, &[], self.auth_headers(), &self.limiter)
            .await?;

        let reply: PopReply = response
            .json()
            .await
            .map_err(UpstreamError::from_transport)?;
        Ok(reply.result.and_then(normalize_reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!(null), None)]
    #[case(json!("job-42"), Some("job-42"))]
    #[case(json!("\"job-42\""), Some("job-42"))]
    #[case(json!(42), Some("42"))]
    fn reply_normalization(#[case] value: serde_json::Value, #[case] expected: Option<&str>) {
        assert_eq!(normalize_reply(value).as_deref(), expected);
    }

    #[test]
    fn pop_reply_parses_both_shapes() {
        let empty: PopReply = serde_json::from_str(r#"{"result": null}"#).unwrap();
        assert!(empty.result.is_none() || empty.result == Some(serde_json::Value::Null));

        let full: PopReply = serde_json::from_str(r#"{"result": "job-1"}"#).unwrap();
        assert_eq!(full.result, Some(serde_json::Value::String("job-1".into())));
    }
}
