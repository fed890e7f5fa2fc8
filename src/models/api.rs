use garde::Validate;
use serde::{Deserialize, Serialize};

use super::job::JobRecord;

/// Request to launch OCR jobs over the configured bucket.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct LaunchBatchRequest {
    /// Only objects under this key prefix are considered.
    #[garde(length(max = 1024))]
    #[serde(default)]
    pub prefix: Option<String>,
}

/// Response after launching a batch.
#[derive(Debug, Serialize)]
pub struct LaunchBatchResponse {
    pub started: Vec<JobRecord>,
    pub skipped: Vec<String>,
    pub failed: Vec<FailedLaunch>,
}

#[derive(Debug, Serialize)]
pub struct FailedLaunch {
    pub object_key: String,
    pub error: String,
}

/// Response after accepting a completion notification payload.
#[derive(Debug, Serialize)]
pub struct NotificationAccepted {
    pub queued: usize,
    pub job_ids: Vec<String>,
}
