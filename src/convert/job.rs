//! Conversion job and outcome types.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ConvertError;

/// Opaque job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One conversion request and its lifecycle state.
///
/// A job is owned by the queue until dispatched, then by the supervisor
/// until its outcome exists. Exactly one terminal [`Outcome`] is produced
/// per job.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    /// Input document bytes, already fetched.
    pub input: Bytes,
    /// Original file name of the input, if known. Staging keeps its
    /// extension so the converter can sniff the format.
    pub input_name: Option<String>,
    /// Wall-clock budget for the converter process.
    pub deadline: Duration,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(input: Bytes, input_name: Option<String>, deadline: Duration) -> Self {
        Self::with_id(JobId::new(), input, input_name, deadline)
    }

    /// Create a job under an externally allocated id (used when the id must
    /// be handed to the caller before the job resolves).
    pub fn with_id(
        id: JobId,
        input: Bytes,
        input_name: Option<String>,
        deadline: Duration,
    ) -> Self {
        Self {
            id,
            input,
            input_name,
            deadline,
            created_at: Utc::now(),
        }
    }
}

/// Terminal result of a conversion job. Immutable once constructed.
#[derive(Debug)]
pub enum Outcome {
    /// The converter produced an artifact.
    Completed { artifact: Vec<u8>, size_bytes: u64 },
    /// The job failed with a typed error.
    Failed {
        error: ConvertError,
        duration_ms: u64,
    },
}

impl Outcome {
    pub fn completed(artifact: Vec<u8>) -> Self {
        let size_bytes = artifact.len() as u64;
        Self::Completed {
            artifact,
            size_bytes,
        }
    }

    pub fn failed(error: ConvertError, elapsed: Duration) -> Self {
        Self::Failed {
            error,
            duration_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}
