use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::app_state::AppState;
use crate::models::api::NotificationAccepted;
use crate::models::notification::parse_notifications;
use crate::services::queue::QueuedNotification;

/// POST /api/v1/notifications: accept OCR completion notifications.
///
/// Enveloped payloads carrying several records are split so every job is
/// processed independently by the worker.
pub async fn receive_notifications(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<NotificationAccepted>), StatusCode> {
    let notifications = parse_notifications(&body).map_err(|e| {
        tracing::warn!(error = %e, kind = "InvalidNotification", "Rejected notification payload");
        StatusCode::BAD_REQUEST
    })?;

    let mut job_ids = Vec::with_capacity(notifications.len());
    for notification in notifications {
        let item = QueuedNotification::new(notification);
        state.queue.enqueue(&item).await.map_err(|e| {
            tracing::error!(job_id = %item.notification.job_id, error = %e, "Failed to enqueue notification");
            StatusCode::SERVICE_UNAVAILABLE
        })?;
        tracing::debug!(job_id = %item.notification.job_id, status = %item.notification.status, "Notification queued");
        job_ids.push(item.notification.job_id);
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(NotificationAccepted {
            queued: job_ids.len(),
            job_ids,
        }),
    ))
}
