//! The job-processing state machine.
//!
//! One worker instance drives one job at a time through
//! alignment → variant calling → annotation → persistence, updating the
//! job's status at each milestone. Multiple instances scale out against
//! the same queue; its atomic pop is the only mutual exclusion needed.

use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info, warn};

use varpipe_align::{Aligner, call_variants};
use varpipe_annotate::Annotate;
use varpipe_core::JobStatus;

use crate::queue::JobQueue;
use crate::store::JobStore;

/// Pause after a loop-level failure (queue unreachable and the like)
/// before polling again.
const ERROR_PAUSE: Duration = Duration::from_secs(5);

const NO_HITS_MESSAGE: &str =
    "No significant alignments found. Check that the sequence is from Homo sapiens.";

pub struct Worker<Q, S, A, N> {
    queue: Q,
    store: S,
    aligner: A,
    annotator: N,
    poll_interval: Duration,
    error_pause: Duration,
    shutdown: watch::Receiver<bool>,
    run_once: bool,
}

impl<Q, S, A, N> Worker<Q, S, A, N>
where
    Q: JobQueue,
    S: JobStore,
    A: Aligner,
    N: Annotate,
{
    pub fn new(
        queue: Q,
        store: S,
        aligner: A,
        annotator: N,
        poll_interval: Duration,
        shutdown: watch::Receiver<bool>,
        run_once: bool,
    ) -> Self {
        Worker {
            queue,
            store,
            aligner,
            annotator,
            poll_interval,
            error_pause: ERROR_PAUSE,
            shutdown,
            run_once,
        }
    }

    /// Main loop: pop, process, repeat. A single job's failure never
    /// terminates the worker; shutdown is checked once per iteration so an
    /// in-flight job always finishes.
    pub async fn run(&mut self) {
        info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            "worker started"
        );

        loop {
            if *self.shutdown.borrow() {
                info!("shutdown requested, stopping");
                break;
            }

            match self.queue.pop().await {
                Ok(Some(job_id)) => {
                    info!(%job_id, "job received");
                    self.process_job(&job_id).await;
                }
                Ok(None) => {
                    if self.run_once {
                        info!("queue drained");
                        break;
                    }
                    self.pause(self.poll_interval).await;
                }
                Err(err) => {
                    error!(error = %err, "queue pop failed");
                    self.pause(self.error_pause).await;
                }
            }
        }

        info!("worker stopped");
    }

    /// Sleep that wakes early when shutdown is requested.
    async fn pause(&mut self, duration: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.shutdown.changed() => {}
        }
    }

    /// Job boundary: any pipeline failure is converted into a persisted
    /// FAILED status carrying the error text, never propagated further.
    async fn process_job(&self, job_id: &str) {
        if let Err(err) = self.run_pipeline(job_id).await {
            error!(job_id, error = %err, "job processing failed");
            let message = format!("{err:#}");
            if let Err(update_err) = self
                .store
                .update_status(job_id, JobStatus::Failed, Some(&message))
                .await
            {
                error!(job_id, error = %update_err, "failed to persist job failure");
            }
        }
    }

    async fn run_pipeline(&self, job_id: &str) -> anyhow::Result<()> {
        let Some(job) = self.store.get_job(job_id).await.context("fetching job")? else {
            warn!(job_id, "job not found, skipping");
            return Ok(());
        };

        self.store
            .update_status(job_id, JobStatus::Processing, None)
            .await
            .context("marking job processing")?;
        info!(job_id, sequence_name = ?job.sequence_name, "processing job");

        let alignment = self.aligner.align(&job.sequence).await?;
        let Some(best) = alignment.best_hit() else {
            self.store
                .update_status(job_id, JobStatus::Failed, Some(NO_HITS_MESSAGE))
                .await
                .context("marking job failed")?;
            return Ok(());
        };

        self.store
            .update_alignment_summary(job_id, best.evalue, best.identity, &best.chromosome)
            .await
            .context("saving alignment summary")?;

        let variants = call_variants(&alignment);
        if !variants.is_empty() {
            let annotated = self.annotator.annotate_all(&variants).await;
            self.store
                .save_variants(job_id, &annotated)
                .await
                .context("saving variants")?;
        }

        self.store
            .update_status(job_id, JobStatus::Completed, None)
            .await
            .context("marking job completed")?;
        info!(job_id, variants_found = variants.len(), "job completed");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use varpipe_align::{AlignError, AlignResult};
    use varpipe_core::{
        AlignmentHit, AlignmentResult, AnnotatedVariant, Job, Variant,
    };
    use varpipe_http::UpstreamError;

    #[derive(Default)]
    struct FakeQueue {
        ids: Mutex<VecDeque<String>>,
    }

    #[async_trait]
    impl JobQueue for FakeQueue {
        async fn pop(&self) -> Result<Option<String>, UpstreamError> {
            Ok(self.ids.lock().unwrap().pop_front())
        }
    }

    #[derive(Default)]
    struct FakeStore {
        jobs: Mutex<HashMap<String, Job>>,
        status_updates: Mutex<Vec<(String, JobStatus, Option<String>)>>,
        summaries: Mutex<Vec<(String, f64, f64, String)>>,
        saved: Mutex<Vec<(String, usize)>>,
    }

    impl FakeStore {
        fn with_job(job: Job) -> Self {
            let store = FakeStore::default();
            store.jobs.lock().unwrap().insert(job.id.clone(), job);
            store
        }

        fn statuses(&self) -> Vec<(JobStatus, Option<String>)> {
            self.status_updates
                .lock()
                .unwrap()
                .iter()
                .map(|(_, status, message)| (*status, message.clone()))
                .collect()
        }
    }

    #[async_trait]
    impl JobStore for FakeStore {
        async fn get_job(&self, job_id: &str) -> Result<Option<Job>, UpstreamError> {
            Ok(self.jobs.lock().unwrap().get(job_id).cloned())
        }

        async fn update_status(
            &self,
            job_id: &str,
            status: JobStatus,
            error_message: Option<&str>,
        ) -> Result<(), UpstreamError> {
            self.status_updates.lock().unwrap().push((
                job_id.to_string(),
                status,
                error_message.map(str::to_string),
            ));
            Ok(())
        }

        async fn update_alignment_summary(
            &self,
            job_id: &str,
            evalue: f64,
            identity: f64,
            chromosome: &str,
        ) -> Result<(), UpstreamError> {
            self.summaries.lock().unwrap().push((
                job_id.to_string(),
                evalue,
                identity,
                chromosome.to_string(),
            ));
            Ok(())
        }

        async fn save_variants(
            &self,
            job_id: &str,
            variants: &[AnnotatedVariant],
        ) -> Result<(), UpstreamError> {
            self.saved
                .lock()
                .unwrap()
                .push((job_id.to_string(), variants.len()));
            Ok(())
        }
    }

    /// Returns a canned alignment, or a configuration error when unset.
    struct FakeAligner {
        result: Option<AlignmentResult>,
    }

    #[async_trait]
    impl Aligner for FakeAligner {
        async fn align(&self, _sequence: &str) -> AlignResult<AlignmentResult> {
            match &self.result {
                Some(result) => Ok(result.clone()),
                None => Err(AlignError::MissingEmail),
            }
        }
    }

    struct FakeAnnotator;

    #[async_trait]
    impl Annotate for FakeAnnotator {
        async fn annotate_all(&self, variants: &[Variant]) -> Vec<AnnotatedVariant> {
            variants.iter().map(AnnotatedVariant::minimal).collect()
        }
    }

    fn job(id: &str) -> Job {
        Job {
            id: id.to_string(),
            sequence: "ATGC".to_string(),
            sequence_name: Some("test sequence".to_string()),
            status: JobStatus::Queued,
            error_message: None,
            blast_evalue: None,
            blast_identity: None,
            chromosome: None,
        }
    }

    fn one_hit(query: &str, subject: &str) -> AlignmentResult {
        let hit = AlignmentHit {
            chromosome: "chr17".to_string(),
            start: 100,
            end: 103,
            identity: 99.5,
            evalue: 1e-12,
            query_sequence: query.to_string(),
            subject_sequence: subject.to_string(),
            alignment_length: query.len() as u64,
        };
        AlignmentResult::new(vec![hit], query.len())
    }

    fn worker(
        store: FakeStore,
        aligner: FakeAligner,
    ) -> Worker<FakeQueue, FakeStore, FakeAligner, FakeAnnotator> {
        let (_tx, rx) = watch::channel(false);
        Worker::new(
            FakeQueue::default(),
            store,
            aligner,
            FakeAnnotator,
            Duration::from_millis(1),
            rx,
            true,
        )
    }

    #[tokio::test]
    async fn missing_job_is_skipped_without_status_updates() {
        let worker = worker(FakeStore::default(), FakeAligner { result: None });

        worker.process_job("ghost").await;

        assert_eq!(worker.store.statuses(), vec![]);
    }

    #[tokio::test]
    async fn no_hits_marks_the_job_failed_with_a_diagnostic() {
        let store = FakeStore::with_job(job("job-1"));
        let worker = worker(
            store,
            FakeAligner {
                result: Some(AlignmentResult::empty(4)),
            },
        );

        worker.process_job("job-1").await;

        let statuses = worker.store.statuses();
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0], (JobStatus::Processing, None));
        assert_eq!(statuses[1].0, JobStatus::Failed);
        assert!(statuses[1].1.as_deref().unwrap().contains("No significant alignments"));
        assert!(worker.store.summaries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn clean_alignment_completes_without_variants() {
        let store = FakeStore::with_job(job("job-2"));
        let worker = worker(
            store,
            FakeAligner {
                result: Some(one_hit("ATGC", "ATGC")),
            },
        );

        worker.process_job("job-2").await;

        assert_eq!(
            worker.store.statuses(),
            vec![
                (JobStatus::Processing, None),
                (JobStatus::Completed, None),
            ]
        );
        let summaries = worker.store.summaries.lock().unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].3, "chr17");
        assert!(worker.store.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn variants_are_annotated_and_saved_before_completion() {
        let store = FakeStore::with_job(job("job-3"));
        let worker = worker(
            store,
            FakeAligner {
                result: Some(one_hit("ATGC", "ATCC")),
            },
        );

        worker.process_job("job-3").await;

        assert_eq!(
            worker.store.saved.lock().unwrap().as_slice(),
            &[("job-3".to_string(), 1)]
        );
        let statuses = worker.store.statuses();
        assert_eq!(statuses.last().unwrap().0, JobStatus::Completed);
    }

    #[tokio::test]
    async fn alignment_failure_marks_the_job_failed_with_the_error_text() {
        let store = FakeStore::with_job(job("job-4"));
        let worker = worker(store, FakeAligner { result: None });

        worker.process_job("job-4").await;

        let statuses = worker.store.statuses();
        assert_eq!(statuses[0].0, JobStatus::Processing);
        assert_eq!(statuses[1].0, JobStatus::Failed);
        assert!(statuses[1].1.as_deref().unwrap().contains("contact email"));
    }

    #[tokio::test]
    async fn run_once_drains_the_queue_and_stops() {
        let store = FakeStore::with_job(job("job-5"));
        let (_tx, rx) = watch::channel(false);
        let mut worker = Worker::new(
            FakeQueue {
                ids: Mutex::new(VecDeque::from(["job-5".to_string()])),
            },
            store,
            FakeAligner {
                result: Some(one_hit("ATGC", "ATGC")),
            },
            FakeAnnotator,
            Duration::from_millis(1),
            rx,
            true,
        );

        worker.run().await;

        let statuses = worker.store.statuses();
        assert_eq!(statuses.last().unwrap().0, JobStatus::Completed);
    }

    #[tokio::test]
    async fn shutdown_flag_stops_the_loop_before_popping() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let mut worker = Worker::new(
            FakeQueue {
                ids: Mutex::new(VecDeque::from(["job-6".to_string()])),
            },
            FakeStore::default(),
            FakeAligner { result: None },
            FakeAnnotator,
            Duration::from_millis(1),
            rx,
            false,
        );

        worker.run().await;

        // The queued job was never touched.
        assert_eq!(worker.queue.ids.lock().unwrap().len(), 1);
        assert_eq!(worker.store.statuses(), vec![]);
    }
}
