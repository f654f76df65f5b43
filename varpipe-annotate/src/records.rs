//! Typed views of the annotation upstream responses.
//!
//! Upstream payloads are loosely shaped; these records pin down exactly the
//! optional fields the pipeline reads, validated once at the parsing
//! boundary instead of picked apart ad hoc downstream.

use std::collections::HashMap;

use serde::Deserialize;

/// One result object from the regional functional-annotation endpoint.
#[derive(Debug, Deserialize)]
pub struct VepRecord {
    pub most_severe_consequence: Option<String>,
    #[serde(default)]
    pub colocated_variants: Vec<ColocatedVariant>,
    #[serde(default)]
    pub transcript_consequences: Vec<TranscriptConsequence>,
}

/// A known variant co-located with the queried position.
#[derive(Debug, Deserialize)]
pub struct ColocatedVariant {
    pub id: Option<String>,
    /// Population frequency panels keyed by alternate allele.
    pub frequencies: Option<HashMap<String, FrequencyPanel>>,
}

/// Population frequencies for one allele across the panels we accept, in
/// fallback priority order.
#[derive(Debug, Default, Deserialize)]
pub struct FrequencyPanel {
    pub gnomade: Option<f64>,
    pub gnomad: Option<f64>,
    pub gnomad_exomes: Option<f64>,
    pub gnomad_genomes: Option<f64>,
}

impl FrequencyPanel {
    /// First non-null value in panel-priority order.
    pub fn first_preferred(&self) -> Option<f64> {
        self.gnomade
            .or(self.gnomad)
            .or(self.gnomad_exomes)
            .or(self.gnomad_genomes)
    }
}

/// Per-transcript consequence block.
#[derive(Debug, Deserialize)]
pub struct TranscriptConsequence {
    /// Set to 1 on the designated representative transcript.
    pub canonical: Option<u8>,
    pub gene_symbol: Option<String>,
    pub hgvsc: Option<String>,
    pub hgvsp: Option<String>,
    pub sift_prediction: Option<String>,
    pub polyphen_prediction: Option<String>,
    pub cadd_phred: Option<f64>,
    pub cadd_raw: Option<f64>,
}

impl TranscriptConsequence {
    pub fn is_canonical(&self) -> bool {
        self.canonical.unwrap_or(0) != 0
    }
}

/// Envelope of an entrez search response.
#[derive(Debug, Deserialize)]
pub struct EsearchEnvelope {
    pub esearchresult: EsearchResult,
}

#[derive(Debug, Default, Deserialize)]
pub struct EsearchResult {
    #[serde(default)]
    pub idlist: Vec<String>,
}

/// Envelope of an entrez summary response. The `result` object maps each
/// requested record id to its summary, alongside bookkeeping keys, so it is
/// kept as raw JSON and the entry of interest is parsed on demand.
#[derive(Debug, Deserialize)]
pub struct EsummaryEnvelope {
    #[serde(default)]
    pub result: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ClinvarSummary {
    #[serde(alias = "clinicalsignificance")]
    pub clinical_significance: Option<SignificanceField>,
}

/// The significance field appears either as an object with a description or
/// as a bare string, depending on the record.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SignificanceField {
    Detailed { description: Option<String> },
    Text(String),
}

impl EsummaryEnvelope {
    /// Raw significance text for one record id, if present.
    pub fn significance_for(&self, record_id: &str) -> Option<String> {
        let entry = self.result.get(record_id)?;
        let summary: ClinvarSummary = serde_json::from_value(entry.clone()).ok()?;
        match summary.clinical_significance? {
            SignificanceField::Detailed { description } => description,
            SignificanceField::Text(text) => Some(text),
        }
    }
}
