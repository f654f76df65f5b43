//! Persistent store collaborator.
//!
//! The worker consumes a small CRUD contract against a PostgREST-style
//! endpoint: fetch one job, update its status and alignment summary, and
//! append its annotated variants. Status updates are last-writer-wins and
//! the variant insert is append-only.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use tracing::{debug, info};

use varpipe_core::{AnnotatedVariant, Job, JobStatus};
use varpipe_http::client::check_status;
use varpipe_http::{HttpClient, RateLimiter, UpstreamError};

const JOBS_TABLE: &str = "AnalysisJob";
const VARIANTS_TABLE: &str = "Variant";

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, UpstreamError>;

    async fn update_status(
        &self,
        job_id: &str,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<(), UpstreamError>;

    async fn update_alignment_summary(
        &self,
        job_id: &str,
        evalue: f64,
        identity: f64,
        chromosome: &str,
    ) -> Result<(), UpstreamError>;

    async fn save_variants(
        &self,
        job_id: &str,
        variants: &[AnnotatedVariant],
    ) -> Result<(), UpstreamError>;
}

pub struct RestJobStore {
    http: Arc<HttpClient>,
    limiter: Arc<RateLimiter>,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusPatch<'a> {
    status: JobStatus,
    updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    completed_at: Option<String>,
    error_message: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryPatch<'a> {
    blast_evalue: f64,
    blast_identity: f64,
    chromosome: &'a str,
    updated_at: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VariantRow<'a> {
    job_id: &'a str,
    #[serde(flatten)]
    variant: &'a AnnotatedVariant,
    created_at: String,
}

impl RestJobStore {
    pub fn new(
        http: Arc<HttpClient>,
        limiter: Arc<RateLimiter>,
        base_url: &str,
        api_key: &str,
    ) -> Self {
        RestJobStore {
            http,
            limiter,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn headers(&self, write: bool) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&self.api_key) {
            headers.insert(HeaderName::from_static("apikey"), value);
        }
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.api_key)) {
            headers.insert(AUTHORIZATION, value);
        }
        if write {
            headers.insert(
                HeaderName::from_static("prefer"),
                HeaderValue::from_static("return=minimal"),
            );
        }
        headers
    }

    async fn patch_job<T: Serialize>(
        &self,
        job_id: &str,
        payload: &T,
    ) -> Result<(), UpstreamError> {
        let url = format!("{}/{}", self.base_url, JOBS_TABLE);
        self.http
            .execute(&self.limiter, || {
                let request = self
                    .http
                    .inner()
                    .patch(&url)
                    .headers(self.headers(true))
                    .query(&[("id", format!("eq.{job_id}"))])
                    .json(payload);
                async move {
                    let response =
                        request.send().await.map_err(UpstreamError::from_transport)?;
                    check_status(response).map(|_| ())
                }
            })
            .await
    }
}

#[async_trait]
impl JobStore for RestJobStore {
    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, UpstreamError> {
        let url = format!("{}/{}", self.base_url, JOBS_TABLE);
        let query = [("id", format!("eq.{job_id}")), ("limit", "1".to_string())];
        let response = self
            .http
            .get_with_retry(&url, &query, Some(self.headers(false)), &self.limiter)
            .await?;

        let mut rows: Vec<Job> = response
            .json()
            .await
            .map_err(UpstreamError::from_transport)?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        })
    }

    async fn update_status(
        &self,
        job_id: &str,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<(), UpstreamError> {
        let now = Utc::now().to_rfc3339();
        let patch = StatusPatch {
            status,
            updated_at: now.clone(),
            completed_at: (status == JobStatus::Completed).then_some(now),
            error_message,
        };
        self.patch_job(job_id, &patch).await?;
        info!(job_id, status = ?status, "job status updated");
        Ok(())
    }

    async fn update_alignment_summary(
        &self,
        job_id: &str,
        evalue: f64,
        identity: f64,
        chromosome: &str,
    ) -> Result<(), UpstreamError> {
        let patch = SummaryPatch {
            blast_evalue: evalue,
            blast_identity: identity,
            chromosome,
            updated_at: Utc::now().to_rfc3339(),
        };
        self.patch_job(job_id, &patch).await?;
        info!(job_id, chromosome, identity, "alignment summary saved");
        Ok(())
    }

    async fn save_variants(
        &self,
        job_id: &str,
        variants: &[AnnotatedVariant],
    ) -> Result<(), UpstreamError> {
        if variants.is_empty() {
            debug!(job_id, "no variants to save");
            return Ok(());
        }

        let now = Utc::now().to_rfc3339();
        let rows: Vec<VariantRow<'_>> = variants
            .iter()
            .map(|variant| VariantRow {
                job_id,
                variant,
                created_at: now.clone(),
            })
            .collect();

        let url = format!("{}/{}", self.base_url, VARIANTS_TABLE);
        self.http
            .execute(&self.limiter, || {
                let request = self
                    .http
                    .inner()
                    .post(&url)
                    .headers(self.headers(true))
                    .json(&rows);
                async move {
                    let response =
                        request.send().await.map_err(UpstreamError::from_transport)?;
                    check_status(response).map(|_| ())
                }
            })
            .await?;

        info!(job_id, count = variants.len(), "variants saved");
        Ok(())
    }
}
