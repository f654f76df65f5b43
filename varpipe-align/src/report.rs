//! Typed view of the aligner's JSON report.
//!
//! Only the fields the pipeline consumes are modeled; everything else in
//! the report is ignored at the parsing boundary.

use serde::Deserialize;

use varpipe_core::chromosome::extract_chromosome;
use varpipe_core::{AlignmentHit, AlignmentResult};

#[derive(Debug, Deserialize)]
pub struct BlastReport {
    #[serde(rename = "BlastOutput2", default)]
    pub outputs: Vec<BlastOutput>,
}

#[derive(Debug, Deserialize)]
pub struct BlastOutput {
    pub report: Report,
}

#[derive(Debug, Deserialize)]
pub struct Report {
    pub results: Results,
}

#[derive(Debug, Deserialize)]
pub struct Results {
    pub search: Search,
}

#[derive(Debug, Deserialize)]
pub struct Search {
    #[serde(default)]
    pub query_len: usize,
    #[serde(default)]
    pub hits: Vec<HitRecord>,
}

#[derive(Debug, Deserialize)]
pub struct HitRecord {
    #[serde(default)]
    pub description: Vec<HitDescription>,
    #[serde(default)]
    pub hsps: Vec<Hsp>,
}

#[derive(Debug, Deserialize)]
pub struct HitDescription {
    #[serde(default)]
    pub title: String,
}

/// One high-scoring segment pair within a hit.
#[derive(Debug, Deserialize)]
pub struct Hsp {
    pub hit_from: u64,
    pub hit_to: u64,
    pub evalue: f64,
    /// Number of identical bases, not a percentage.
    pub identity: u64,
    pub align_len: u64,
    pub qseq: String,
    pub hseq: String,
}

impl BlastReport {
    /// Flatten the report into an [`AlignmentResult`]: every hit/HSP pair
    /// becomes one [`AlignmentHit`], sorted ascending by e-value.
    pub fn into_alignment_result(self, query_length: usize) -> AlignmentResult {
        let mut hits = Vec::new();

        for output in self.outputs {
            let search = output.report.results.search;
            for hit in search.hits {
                let title = hit
                    .description
                    .first()
                    .map(|d| d.title.as_str())
                    .unwrap_or_default();
                let chromosome = extract_chromosome(title);

                for hsp in hit.hsps {
                    if hsp.align_len == 0 {
                        continue;
                    }
                    hits.push(AlignmentHit {
                        chromosome: chromosome.clone(),
                        start: hsp.hit_from,
                        end: hsp.hit_to,
                        identity: (hsp.identity as f64 / hsp.align_len as f64) * 100.0,
                        evalue: hsp.evalue,
                        query_sequence: hsp.qseq,
                        subject_sequence: hsp.hseq,
                        alignment_length: hsp.align_len,
                    });
                }
            }
        }

        AlignmentResult::new(hits, query_length)
    }
}
