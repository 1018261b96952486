//! Serialization queue guaranteeing single-flight conversion.
//!
//! [`ConversionQueue`] accepts jobs in arrival order and processes them one
//! at a time on a spawned worker task, inserting a fixed cooldown between
//! jobs to let OS resources settle. Each enqueued job resolves exactly
//! once; a failing job never blocks or cancels the jobs behind it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, Instant};
use tracing::{error, info, warn};

use super::error::ConvertError;
use super::job::{Job, Outcome};
use super::staging::StagingArea;
use super::supervisor::ConverterSupervisor;

/// Channel capacity for pending conversion jobs.
const QUEUE_CAPACITY: usize = 100;

struct QueueEntry {
    job: Job,
    reply: oneshot::Sender<Outcome>,
}

/// Handle to the background conversion worker.
///
/// Cloneable; the worker task runs until every handle (and its inner
/// sender) is dropped, at which point the channel closes and the worker
/// exits.
#[derive(Clone)]
pub struct ConversionQueue {
    sender: mpsc::Sender<QueueEntry>,
}

impl ConversionQueue {
    /// Create a queue and spawn its worker task.
    pub fn new(staging: StagingArea, supervisor: ConverterSupervisor, cooldown: Duration) -> Self {
        Self::with_capacity(staging, supervisor, cooldown, QUEUE_CAPACITY)
    }

    pub fn with_capacity(
        staging: StagingArea,
        supervisor: ConverterSupervisor,
        cooldown: Duration,
        capacity: usize,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        tokio::spawn(process_entries(
            receiver,
            Arc::new(staging),
            Arc::new(supervisor),
            cooldown,
        ));
        Self { sender }
    }

    /// Enqueue a job and await its terminal outcome.
    ///
    /// Pending jobs are dispatched strictly in arrival order; at most one
    /// executes at any instant. The returned outcome is produced exactly
    /// once per job, synthesized from an internal error if the worker
    /// itself misbehaves.
    pub async fn enqueue(&self, job: Job) -> Outcome {
        let job_id = job.id;
        let (reply_tx, reply_rx) = oneshot::channel();

        if self
            .sender
            .send(QueueEntry {
                job,
                reply: reply_tx,
            })
            .await
            .is_err()
        {
            error!(%job_id, "Conversion worker is gone, rejecting job");
            return Outcome::failed(
                ConvertError::internal("conversion worker stopped"),
                Duration::ZERO,
            );
        }

        match reply_rx.await {
            Ok(outcome) => outcome,
            Err(_) => {
                // The worker dropped the reply without resolving it; should
                // not happen, but the caller still gets exactly one outcome.
                error!(%job_id, "Job was dropped without an outcome");
                Outcome::failed(
                    ConvertError::internal("job dropped without outcome"),
                    Duration::ZERO,
                )
            }
        }
    }
}

/// Background loop draining the queue one entry at a time.
async fn process_entries(
    mut receiver: mpsc::Receiver<QueueEntry>,
    staging: Arc<StagingArea>,
    supervisor: Arc<ConverterSupervisor>,
    cooldown: Duration,
) {
    info!("Conversion queue worker started");

    while let Some(QueueEntry { job, reply }) = receiver.recv().await {
        let job_id = job.id;
        info!(%job_id, "Dispatching conversion job");

        // The job body runs in its own task so a panic inside staging or
        // supervision is contained as a JoinError and still yields an
        // outcome instead of taking the worker down.
        let staging = Arc::clone(&staging);
        let supervisor = Arc::clone(&supervisor);
        let handle = tokio::spawn(async move { run_job(&staging, &supervisor, job).await });

        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(%job_id, error = %e, "Conversion job crashed");
                Outcome::failed(
                    ConvertError::internal(format!("job crashed: {e}")),
                    Duration::ZERO,
                )
            }
        };

        if reply.send(outcome).is_err() {
            warn!(%job_id, "Caller went away before the outcome was ready");
        }

        // Cooldown between sequential dispatches.
        sleep(cooldown).await;
    }

    info!("Conversion queue worker stopped (channel closed)");
}

/// Stage, supervise, release. Release runs on every path.
async fn run_job(staging: &StagingArea, supervisor: &ConverterSupervisor, job: Job) -> Outcome {
    let started = Instant::now();

    let paths = match staging.stage(&job.input, job.input_name.as_deref()).await {
        Ok(paths) => paths,
        Err(error) => return Outcome::failed(error, started.elapsed()),
    };

    let outcome = supervisor.supervise(&paths, job.deadline).await;
    staging.release(&paths);
    outcome
}
