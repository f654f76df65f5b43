use serde::{Deserialize, Serialize};

/// Lifecycle state of an analysis job.
///
/// `Completed` and `Failed` are terminal; the worker never moves a job out
/// of either state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// An analysis job as stored by the persistent store.
///
/// Field names serialize in camelCase to match the store's column names.
/// Jobs are created by the producer side; the worker only ever mutates
/// status, error message, and the alignment summary columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub sequence: String,
    pub sequence_name: Option<String>,
    pub status: JobStatus,
    pub error_message: Option<String>,
    pub blast_evalue: Option<f64>,
    pub blast_identity: Option<f64>,
    pub chromosome: Option<String>,
}
