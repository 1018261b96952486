//! Outbound callback delivery for asynchronous callers.
//!
//! Delivery is best-effort and at-most-one-attempt: transport errors and
//! non-2xx responses are logged and swallowed, and never alter the job's
//! recorded outcome. Job completion never waits on delivery succeeding.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

use crate::convert::{JobId, Outcome};

/// Shared-secret header attached when a callback secret is configured.
/// Absence of the secret never prevents delivery.
pub const SECRET_HEADER: &str = "x-docpress-token";

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CallbackPayload {
    job_id: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    artifact_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Posts job outcomes to caller-supplied callback addresses.
pub struct CallbackNotifier {
    client: Client,
    secret: Option<String>,
}

impl CallbackNotifier {
    pub fn new(secret: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
            warn!("Failed to build callback HTTP client: {}", e);
            Client::new()
        });
        Self { client, secret }
    }

    pub fn with_defaults(secret: Option<String>) -> Self {
        Self::new(secret, DELIVERY_TIMEOUT)
    }

    /// Deliver the outcome of `job_id` to `callback_url`.
    ///
    /// One attempt, no retry, no backoff. Failures are logged at warn and
    /// otherwise ignored.
    pub async fn notify(&self, callback_url: &str, job_id: JobId, outcome: &Outcome) {
        let payload = match outcome {
            Outcome::Completed { artifact, .. } => CallbackPayload {
                job_id: job_id.to_string(),
                status: "completed",
                artifact_base64: Some(BASE64.encode(artifact)),
                error: None,
            },
            Outcome::Failed { error, .. } => CallbackPayload {
                job_id: job_id.to_string(),
                status: "failed",
                artifact_base64: None,
                error: Some(error.to_string()),
            },
        };

        let mut request = self.client.post(callback_url).json(&payload);
        if let Some(ref secret) = self.secret {
            request = request.header(SECRET_HEADER, secret);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                info!(%job_id, url = %callback_url, "Callback delivered");
            }
            Ok(response) => {
                warn!(
                    %job_id,
                    url = %callback_url,
                    status = %response.status(),
                    "Callback rejected by destination"
                );
            }
            Err(e) => {
                warn!(%job_id, url = %callback_url, error = %e, "Callback delivery failed");
            }
        }
    }
}
