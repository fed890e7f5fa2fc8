//! Inbound OCR completion notifications.
//!
//! The OCR service publishes one message per finished job. Messages reach us
//! either bare or wrapped in a topic envelope that may batch several records;
//! [`parse_notifications`] accepts both and always fans out to one
//! [`CompletionNotification`] per job.

use garde::Validate;
use serde::{Deserialize, Serialize};

use super::job::JobStatus;

/// A single job completion, already reduced to what the handler needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct CompletionNotification {
    #[garde(length(min = 1, max = 512))]
    pub job_id: String,

    #[garde(length(min = 1, max = 255))]
    pub bucket: String,

    #[garde(length(min = 1, max = 1024))]
    pub object_key: String,

    #[garde(custom(terminal_status))]
    pub status: JobStatus,
}

fn terminal_status(status: &JobStatus, _ctx: &()) -> garde::Result {
    if status.is_terminal() {
        Ok(())
    } else {
        Err(garde::Error::new("completion status must be SUCCEEDED or FAILED"))
    }
}

/// Wire shape published by the OCR service.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcrMessage {
    job_id: String,
    status: String,
    document_location: DocumentLocation,
}

#[derive(Debug, Deserialize)]
struct DocumentLocation {
    #[serde(rename = "S3Bucket")]
    bucket: String,
    #[serde(rename = "S3ObjectName")]
    object_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TopicEnvelope {
    records: Vec<TopicRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TopicRecord {
    sns: TopicMessage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TopicMessage {
    message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Notification payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected completion status '{0}'")]
    UnexpectedStatus(String),

    #[error("Notification failed validation: {0}")]
    Invalid(#[from] garde::Report),

    #[error("Notification envelope contains no records")]
    Empty,
}

/// Decode a bare or enveloped payload into per-job notifications.
pub fn parse_notifications(body: &[u8]) -> Result<Vec<CompletionNotification>, NotificationError> {
    let value: serde_json::Value = serde_json::from_slice(body)?;

    if value.get("Records").is_some() {
        let envelope: TopicEnvelope = serde_json::from_value(value)?;
        if envelope.records.is_empty() {
            return Err(NotificationError::Empty);
        }
        envelope
            .records
            .iter()
            .map(|record| parse_message(record.sns.message.as_bytes()))
            .collect()
    } else {
        let message: OcrMessage = serde_json::from_value(value)?;
        Ok(vec![into_notification(message)?])
    }
}

fn parse_message(raw: &[u8]) -> Result<CompletionNotification, NotificationError> {
    let message: OcrMessage = serde_json::from_slice(raw)?;
    into_notification(message)
}

fn into_notification(message: OcrMessage) -> Result<CompletionNotification, NotificationError> {
    let status = match message.status.as_str() {
        "SUCCEEDED" => JobStatus::Succeeded,
        "FAILED" => JobStatus::Failed,
        other => return Err(NotificationError::UnexpectedStatus(other.to_string())),
    };

    let notification = CompletionNotification {
        job_id: message.job_id,
        bucket: message.document_location.bucket,
        object_key: message.document_location.object_name,
        status,
    };
    notification.validate()?;
    Ok(notification)
}
