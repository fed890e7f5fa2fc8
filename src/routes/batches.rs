use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::models::api::{FailedLaunch, LaunchBatchRequest, LaunchBatchResponse};

/// POST /api/v1/batches: start OCR jobs for every image in the bucket.
pub async fn launch_batch(
    State(state): State<AppState>,
    request: Option<Json<LaunchBatchRequest>>,
) -> Result<Json<LaunchBatchResponse>, StatusCode> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    request.validate().map_err(|_| StatusCode::UNPROCESSABLE_ENTITY)?;

    let prefix = request.prefix.as_deref().unwrap_or("");
    let report = state
        .launcher
        .launch(&state.settings.bucket, prefix)
        .await
        .map_err(|e| {
            tracing::error!(bucket = %state.settings.bucket, error = %e, "Batch launch failed");
            StatusCode::BAD_GATEWAY
        })?;

    Ok(Json(LaunchBatchResponse {
        started: report.started,
        skipped: report.skipped,
        failed: report
            .failed
            .into_iter()
            .map(|(object_key, e)| FailedLaunch {
                object_key,
                error: e.to_string(),
            })
            .collect(),
    }))
}
