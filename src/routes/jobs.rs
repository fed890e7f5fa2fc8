use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::app_state::AppState;
use crate::models::job::JobRecord;

/// GET /api/v1/jobs/{job_id}: the live record for an OCR job.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobRecord>, StatusCode> {
    match state.store.find(&job_id).await {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!(job_id = %job_id, error = %e, "Job lookup failed");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
