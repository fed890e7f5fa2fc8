use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lifecycle status of an OCR job. Part of the record key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    InProgress,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::InProgress)
    }
}

/// One OCR job as tracked in the status table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub job_id: String,
    pub status: JobStatus,
    pub bucket: String,
    pub object_key: String,
    pub start_timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complete_timestamp: Option<DateTime<Utc>>,
    pub scanned: bool,
}

impl JobRecord {
    /// A freshly launched job.
    pub fn in_progress(
        job_id: impl Into<String>,
        bucket: impl Into<String>,
        object_key: impl Into<String>,
        start_timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::InProgress,
            bucket: bucket.into(),
            object_key: object_key.into(),
            start_timestamp,
            complete_timestamp: None,
            scanned: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(JobStatus::InProgress.to_string(), "IN_PROGRESS");
        assert_eq!(JobStatus::from_str("SUCCEEDED").unwrap(), JobStatus::Succeeded);
        assert_eq!(
            serde_json::to_string(&JobStatus::Failed).unwrap(),
            "\"FAILED\""
        );
        assert!(JobStatus::from_str("PARTIAL_SUCCESS").is_err());
    }

    #[test]
    fn test_in_progress_has_no_completion() {
        let record = JobRecord::in_progress("j1", "b", "a.png", Utc::now());
        assert!(!record.status.is_terminal());
        assert!(record.complete_timestamp.is_none());
        assert!(!record.scanned);

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("completeTimestamp").is_none());
        assert_eq!(json["status"], "IN_PROGRESS");
    }
}
