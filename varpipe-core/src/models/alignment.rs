use serde::{Deserialize, Serialize};

/// One aligned segment reported by the upstream aligner.
///
/// Immutable once parsed. `query_sequence` and `subject_sequence` are the
/// gapped alignment strings and always have the same length
/// (`alignment_length`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentHit {
    pub chromosome: String,
    /// Start coordinate on the reference (1-based, inclusive).
    pub start: u64,
    /// End coordinate on the reference (1-based, inclusive).
    pub end: u64,
    /// Identical bases / alignment length, as a percentage.
    pub identity: f64,
    pub evalue: f64,
    pub query_sequence: String,
    pub subject_sequence: String,
    pub alignment_length: u64,
}

/// The full result of one alignment search.
///
/// Hits are kept sorted ascending by e-value, so the best hit is always the
/// first one.
#[derive(Debug, Clone, Default)]
pub struct AlignmentResult {
    hits: Vec<AlignmentHit>,
    query_length: usize,
}

impl AlignmentResult {
    /// Build a result from unsorted hits, ordering them ascending by e-value.
    pub fn new(mut hits: Vec<AlignmentHit>, query_length: usize) -> Self {
        hits.sort_by(|a, b| a.evalue.total_cmp(&b.evalue));
        AlignmentResult { hits, query_length }
    }

    pub fn empty(query_length: usize) -> Self {
        AlignmentResult {
            hits: Vec::new(),
            query_length,
        }
    }

    pub fn hits(&self) -> &[AlignmentHit] {
        &self.hits
    }

    pub fn query_length(&self) -> usize {
        self.query_length
    }

    pub fn has_hits(&self) -> bool {
        !self.hits.is_empty()
    }

    /// The hit with the minimum e-value, or `None` when there are no hits.
    pub fn best_hit(&self) -> Option<&AlignmentHit> {
        self.hits.first()
    }
}
