//! Conversion service tying fetch, queue and notification together.
//!
//! Synchronous callers get the [`Outcome`] back as the return value of
//! [`ConversionService::convert`]. Asynchronous callers submit via
//! [`ConversionService::submit_with_callback`], receive the job id
//! immediately and get the outcome posted to their callback address.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::convert::{ConversionQueue, Job, JobId, Outcome};
use crate::fetch::DocumentFetcher;
use crate::notify::CallbackNotifier;

#[derive(Clone)]
pub struct ConversionService {
    queue: ConversionQueue,
    fetcher: Arc<dyn DocumentFetcher>,
    notifier: Arc<CallbackNotifier>,
    default_deadline: Duration,
    max_deadline: Duration,
}

impl ConversionService {
    pub fn new(
        queue: ConversionQueue,
        fetcher: Arc<dyn DocumentFetcher>,
        notifier: Arc<CallbackNotifier>,
        default_deadline: Duration,
        max_deadline: Duration,
    ) -> Self {
        Self {
            queue,
            fetcher,
            notifier,
            default_deadline,
            max_deadline,
        }
    }

    /// Convert synchronously: fetch, enqueue, await the outcome.
    pub async fn convert(&self, input_ref: &str, deadline_ms: Option<u64>) -> (JobId, Outcome) {
        let job_id = JobId::new();
        let outcome = self.run_job(job_id, input_ref, deadline_ms).await;
        (job_id, outcome)
    }

    /// Convert asynchronously: the job id is returned immediately and the
    /// outcome is posted to `callback_url` once it exists.
    ///
    /// Delivery is best-effort; its failure never changes the recorded
    /// outcome, and job completion never waits on it.
    pub fn submit_with_callback(
        &self,
        input_ref: String,
        deadline_ms: Option<u64>,
        callback_url: String,
    ) -> JobId {
        let job_id = JobId::new();
        let service = self.clone();
        tokio::spawn(async move {
            let outcome = service.run_job(job_id, &input_ref, deadline_ms).await;
            service.notifier.notify(&callback_url, job_id, &outcome).await;
        });
        job_id
    }

    async fn run_job(&self, job_id: JobId, input_ref: &str, deadline_ms: Option<u64>) -> Outcome {
        let deadline = self.clamp_deadline(deadline_ms);
        let started = Instant::now();

        // Fetch before enqueueing so the serialized conversion slot is
        // never spent waiting on the network, and unusable input resolves
        // the caller without consuming a queue turn.
        let input = match self.fetcher.fetch(input_ref).await {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!(%job_id, input_ref, error = %error, "Input fetch failed");
                return Outcome::failed(error, started.elapsed());
            }
        };

        info!(%job_id, input_ref, size = input.len(), "Accepted conversion job");
        let job = Job::with_id(job_id, input, file_name_of(input_ref), deadline);
        self.queue.enqueue(job).await
    }

    fn clamp_deadline(&self, deadline_ms: Option<u64>) -> Duration {
        deadline_ms
            .map(Duration::from_millis)
            .unwrap_or(self.default_deadline)
            .min(self.max_deadline)
    }
}

/// Last path segment of the input reference, if it looks like a file name.
/// Used so staging can preserve the extension the converter sniffs.
fn file_name_of(input_ref: &str) -> Option<String> {
    let without_query = input_ref.split(['?', '#']).next().unwrap_or(input_ref);
    let segment = without_query.rsplit('/').next()?;
    let has_extension = Path::new(segment)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some();
    if has_extension {
        Some(segment.to_string())
    } else {
        None
    }
}
