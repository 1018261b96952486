//! Conversion request handling.
//!
//! Thin route boilerplate over
//! [`ConversionService`](crate::service::ConversionService): callers
//! without a callback block on the outcome; callers with one get a 202 and
//! the outcome delivered out-of-band.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::AppContext;
use crate::convert::{ConvertError, Outcome};

pub fn convert_routes() -> Router<AppContext> {
    Router::new().route("/convert", post(handle_convert))
}

/// Conversion request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertRequestBody {
    /// URL of the document to convert.
    pub input_ref: String,

    /// Optional wall-clock budget override, in milliseconds. Clamped to
    /// the configured maximum.
    #[serde(default)]
    pub deadline_ms: Option<u64>,

    /// When present, the request is accepted immediately and the outcome
    /// is posted to this URL instead of being returned inline.
    #[serde(default)]
    pub callback_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedResponse {
    pub job_id: String,
    pub status: &'static str,
}

async fn handle_convert(
    State(ctx): State<AppContext>,
    Json(body): Json<ConvertRequestBody>,
) -> Response {
    if body.input_ref.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(SyncResponse {
                success: false,
                artifact_base64: None,
                size_bytes: None,
                error: Some("inputRef must not be empty".to_string()),
            }),
        )
            .into_response();
    }

    if let Some(callback_url) = body.callback_url {
        let job_id =
            ctx.service
                .submit_with_callback(body.input_ref, body.deadline_ms, callback_url);
        return (
            StatusCode::ACCEPTED,
            Json(AcceptedResponse {
                job_id: job_id.to_string(),
                status: "queued",
            }),
        )
            .into_response();
    }

    let (_job_id, outcome) = ctx.service.convert(&body.input_ref, body.deadline_ms).await;
    sync_response(outcome)
}

fn sync_response(outcome: Outcome) -> Response {
    match outcome {
        Outcome::Completed {
            artifact,
            size_bytes,
        } => (
            StatusCode::OK,
            Json(SyncResponse {
                success: true,
                artifact_base64: Some(BASE64.encode(&artifact)),
                size_bytes: Some(size_bytes),
                error: None,
            }),
        )
            .into_response(),
        Outcome::Failed { error, .. } => {
            let status = match error {
                ConvertError::Download { .. } => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (
                status,
                Json(SyncResponse {
                    success: false,
                    artifact_base64: None,
                    size_bytes: None,
                    error: Some(error.to_string()),
                }),
            )
                .into_response()
        }
    }
}
