use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use varpipe_core::{AnnotatedVariant, ClinicalSignificance, Variant};
use varpipe_http::{HttpClient, RateLimiter, UpstreamError};

use crate::records::{EsearchEnvelope, EsummaryEnvelope, VepRecord};

/// Variants annotated per burst before pausing.
const BATCH_SIZE: usize = 10;
/// Pause between bursts, to respect upstream burst quotas.
const BATCH_PAUSE: Duration = Duration::from_millis(500);
/// Concurrent per-variant pipelines within a batch.
const MAX_CONCURRENT: usize = 5;

pub const DEFAULT_FUNCTIONAL_BASE_URL: &str = "https://rest.ensembl.org";
pub const DEFAULT_ENTREZ_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

#[derive(Debug, Clone)]
pub struct AnnotateConfig {
    pub functional_base_url: String,
    pub entrez_base_url: String,
    /// Contact email for the entrez-style upstreams. When unset, the
    /// identifier and clinical lookups are skipped rather than attempted.
    pub email: Option<String>,
    /// Optional access key raising the entrez upstream's rate ceiling.
    pub api_key: Option<String>,
}

impl Default for AnnotateConfig {
    fn default() -> Self {
        AnnotateConfig {
            functional_base_url: DEFAULT_FUNCTIONAL_BASE_URL.to_string(),
            entrez_base_url: DEFAULT_ENTREZ_BASE_URL.to_string(),
            email: None,
            api_key: None,
        }
    }
}

/// The annotation seam the worker depends on.
#[async_trait]
pub trait Annotate: Send + Sync {
    /// Annotate every variant, preserving input length and order. Never
    /// fails: items whose enrichment failed come back minimal.
    async fn annotate_all(&self, variants: &[Variant]) -> Vec<AnnotatedVariant>;
}

/// Orchestrates the three-stage annotation pipeline across upstreams.
#[derive(Clone)]
pub struct Annotator {
    http: Arc<HttpClient>,
    functional_limiter: Arc<RateLimiter>,
    entrez_limiter: Arc<RateLimiter>,
    semaphore: Arc<Semaphore>,
    config: Arc<AnnotateConfig>,
}

/// Everything the functional lookup can contribute to one variant.
#[derive(Debug, Default)]
struct FunctionalAnnotation {
    rs_id: Option<String>,
    consequence: Option<String>,
    gene_symbol: Option<String>,
    hgvs_notation: Option<String>,
    sift_prediction: Option<String>,
    polyphen_prediction: Option<String>,
    cadd_score: Option<f64>,
    population_frequency: Option<f64>,
}

impl FunctionalAnnotation {
    /// Apply the record's selection rules: first co-located `rs` identifier,
    /// canonical transcript (else the first), preferred frequency panel.
    fn from_record(record: VepRecord, alt_allele: &str) -> Self {
        let mut annotation = FunctionalAnnotation {
            consequence: record.most_severe_consequence,
            ..Default::default()
        };

        annotation.rs_id = record
            .colocated_variants
            .iter()
            .find_map(|cv| cv.id.as_ref().filter(|id| id.starts_with("rs")).cloned());

        let transcript = record
            .transcript_consequences
            .iter()
            .find(|tc| tc.is_canonical())
            .or_else(|| record.transcript_consequences.first());
        if let Some(tc) = transcript {
            annotation.gene_symbol = tc.gene_symbol.clone();
            annotation.hgvs_notation = tc.hgvsc.clone().or_else(|| tc.hgvsp.clone());
            annotation.sift_prediction = tc.sift_prediction.clone();
            annotation.polyphen_prediction = tc.polyphen_prediction.clone();
            annotation.cadd_score = tc.cadd_phred.or(tc.cadd_raw);
        }

        annotation.population_frequency = record
            .colocated_variants
            .iter()
            .find_map(|cv| cv.frequencies.as_ref()?.get(alt_allele)?.first_preferred());

        annotation
    }

    fn apply(self, annotated: &mut AnnotatedVariant) {
        annotated.rs_id = self.rs_id;
        annotated.consequence = self.consequence;
        annotated.gene_symbol = self.gene_symbol;
        annotated.hgvs_notation = self.hgvs_notation;
        annotated.sift_prediction = self.sift_prediction;
        annotated.polyphen_prediction = self.polyphen_prediction;
        annotated.cadd_score = self.cadd_score;
        annotated.population_frequency = self.population_frequency;
    }
}

impl Annotator {
    pub fn new(
        http: Arc<HttpClient>,
        functional_limiter: Arc<RateLimiter>,
        entrez_limiter: Arc<RateLimiter>,
        config: AnnotateConfig,
    ) -> Self {
        Annotator {
            http,
            functional_limiter,
            entrez_limiter,
            semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT)),
            config: Arc::new(config),
        }
    }

    async fn annotate_single(&self, variant: Variant) -> AnnotatedVariant {
        let mut annotated = AnnotatedVariant::minimal(&variant);

        // Stage 1: regional functional lookup carries most of the payload.
        match self.functional_lookup(&variant).await {
            Ok(Some(functional)) => functional.apply(&mut annotated),
            Ok(None) => {}
            Err(err) => debug!(
                chromosome = %variant.chromosome,
                position = variant.position,
                error = %err,
                "functional lookup failed"
            ),
        }

        // Stage 2: identifier fallback by coordinate.
        if annotated.rs_id.is_none() {
            match self.lookup_identifier(&variant).await {
                Ok(rs_id) => annotated.rs_id = rs_id,
                Err(err) => debug!(
                    chromosome = %variant.chromosome,
                    position = variant.position,
                    error = %err,
                    "identifier lookup failed"
                ),
            }
        }

        // Stage 3: clinical significance needs an identifier.
        if annotated.clinical_significance.is_none() {
            if let Some(rs_id) = annotated.rs_id.clone() {
                match self.clinical_significance(&rs_id).await {
                    Ok(significance) => annotated.clinical_significance = significance,
                    Err(err) => {
                        debug!(%rs_id, error = %err, "clinical significance lookup failed");
                    }
                }
            }
        }

        annotated
    }

    async fn functional_lookup(
        &self,
        variant: &Variant,
    ) -> Result<Option<FunctionalAnnotation>, UpstreamError> {
        let chrom = variant.chromosome.trim_start_matches("chr");
        let url = format!(
            "{}/vep/human/region/{}:{}:{}/{}",
            self.config.functional_base_url,
            chrom,
            variant.position,
            variant.position,
            variant.alternate_allele,
        );

        let response = self
            .http
            .get_with_retry(&url, &[], None, &self.functional_limiter)
            .await?;
        let records: Vec<VepRecord> = response
            .json()
            .await
            .map_err(UpstreamError::from_transport)?;

        Ok(records
            .into_iter()
            .next()
            .map(|record| FunctionalAnnotation::from_record(record, &variant.alternate_allele)))
    }

    async fn lookup_identifier(&self, variant: &Variant) -> Result<Option<String>, UpstreamError> {
        let Some(email) = &self.config.email else {
            return Ok(None);
        };

        let chrom = variant.chromosome.trim_start_matches("chr");
        let term = format!("{}[CHR] AND {}[CHRPOS]", chrom, variant.position);
        let mut query: Vec<(&str, String)> = vec![
            ("db", "snp".to_string()),
            ("term", term),
            ("retmode", "json".to_string()),
            ("email", email.clone()),
        ];
        if let Some(key) = &self.config.api_key {
            query.push(("api_key", key.clone()));
        }

        let url = format!("{}/esearch.fcgi", self.config.entrez_base_url);
        let response = self
            .http
            .get_with_retry(&url, &query, None, &self.entrez_limiter)
            .await?;
        let envelope: EsearchEnvelope = response
            .json()
            .await
            .map_err(UpstreamError::from_transport)?;

        Ok(envelope
            .esearchresult
            .idlist
            .into_iter()
            .next()
            .map(|id| format!("rs{id}")))
    }

    /// Two-step protocol: search resolves the identifier to an internal
    /// record id, then the summary for that record carries the free-text
    /// significance, normalized before it is stored.
    async fn clinical_significance(
        &self,
        rs_id: &str,
    ) -> Result<Option<ClinicalSignificance>, UpstreamError> {
        let Some(email) = &self.config.email else {
            return Ok(None);
        };

        let mut search_query: Vec<(&str, String)> = vec![
            ("db", "clinvar".to_string()),
            ("term", rs_id.to_string()),
            ("retmode", "json".to_string()),
            ("email", email.clone()),
        ];
        if let Some(key) = &self.config.api_key {
            search_query.push(("api_key", key.clone()));
        }

        let search_url = format!("{}/esearch.fcgi", self.config.entrez_base_url);
        let response = self
            .http
            .get_with_retry(&search_url, &search_query, None, &self.entrez_limiter)
            .await?;
        let envelope: EsearchEnvelope = response
            .json()
            .await
            .map_err(UpstreamError::from_transport)?;
        let Some(record_id) = envelope.esearchresult.idlist.into_iter().next() else {
            return Ok(None);
        };

        let mut summary_query: Vec<(&str, String)> = vec![
            ("db", "clinvar".to_string()),
            ("id", record_id.clone()),
            ("retmode", "json".to_string()),
            ("email", email.clone()),
        ];
        if let Some(key) = &self.config.api_key {
            summary_query.push(("api_key", key.clone()));
        }

        let summary_url = format!("{}/esummary.fcgi", self.config.entrez_base_url);
        let response = self
            .http
            .get_with_retry(&summary_url, &summary_query, None, &self.entrez_limiter)
            .await?;
        let envelope: EsummaryEnvelope = response
            .json()
            .await
            .map_err(UpstreamError::from_transport)?;

        Ok(envelope
            .significance_for(&record_id)
            .map(|raw| ClinicalSignificance::from_text(&raw)))
    }
}

#[async_trait]
impl Annotate for Annotator {
    async fn annotate_all(&self, variants: &[Variant]) -> Vec<AnnotatedVariant> {
        if variants.is_empty() {
            return Vec::new();
        }

        info!(total_variants = variants.len(), "starting annotation");

        let this = self.clone();
        let annotated = annotate_batches(variants, self.semaphore.clone(), move |variant| {
            let this = this.clone();
            async move { this.annotate_single(variant).await }
        })
        .await;

        info!(
            total_annotated = annotated.len(),
            with_rs_id = annotated.iter().filter(|a| a.rs_id.is_some()).count(),
            with_clinical = annotated
                .iter()
                .filter(|a| a.clinical_significance.is_some())
                .count(),
            with_consequence = annotated.iter().filter(|a| a.consequence.is_some()).count(),
            "annotation completed"
        );

        annotated
    }
}

/// Fan the variants out in batches under a shared concurrency cap.
///
/// Each item's result lands in its own output slot, indexed by position, so
/// a failed or panicked task degrades only its own slot to the minimal
/// annotation and can neither reorder nor corrupt its neighbours.
async fn annotate_batches<F, Fut>(
    variants: &[Variant],
    semaphore: Arc<Semaphore>,
    annotate: F,
) -> Vec<AnnotatedVariant>
where
    F: Fn(Variant) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = AnnotatedVariant> + Send + 'static,
{
    let mut annotated = Vec::with_capacity(variants.len());
    let batch_count = variants.len().div_ceil(BATCH_SIZE);

    for (batch_index, batch) in variants.chunks(BATCH_SIZE).enumerate() {
        let mut slots: Vec<Option<AnnotatedVariant>> = Vec::with_capacity(batch.len());
        slots.resize_with(batch.len(), || None);

        let mut handles = Vec::with_capacity(batch.len());
        for variant in batch {
            let semaphore = semaphore.clone();
            let annotate = annotate.clone();
            let variant = variant.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                annotate(variant).await
            }));
        }

        for (slot_index, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(result) => slots[slot_index] = Some(result),
                Err(err) => warn!(
                    variant_index = batch_index * BATCH_SIZE + slot_index,
                    error = %err,
                    "annotation task failed, keeping minimal annotation"
                ),
            }
        }

        for (slot_index, slot) in slots.into_iter().enumerate() {
            annotated.push(slot.unwrap_or_else(|| AnnotatedVariant::minimal(&batch[slot_index])));
        }

        if batch_index + 1 < batch_count {
            sleep(BATCH_PAUSE).await;
        }
    }

    annotated
}
