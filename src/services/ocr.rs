use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where the OCR service reads input, writes output and reports completion.
#[derive(Debug, Clone)]
pub struct OcrJobRequest<'a> {
    pub bucket: &'a str,
    pub object_key: &'a str,
    pub output_prefix: &'a str,
}

/// Starts asynchronous text detection jobs.
#[async_trait]
pub trait OcrLauncher: Send + Sync {
    /// Start a job and return the service-assigned job id.
    async fn start_job(&self, request: OcrJobRequest<'_>) -> Result<String, OcrError>;
}

/// HTTP client for an asynchronous document text detection service.
pub struct TextDetectionClient {
    http: Client,
    endpoint: String,
    api_token: String,
    notification_topic: String,
    notification_role: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct StartDetectionRequest<'a> {
    document_location: DocumentLocation<'a>,
    output_config: OutputConfig<'a>,
    notification_channel: NotificationChannel<'a>,
}

#[derive(Serialize)]
struct DocumentLocation<'a> {
    #[serde(rename = "S3Object")]
    object: S3Object<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct S3Object<'a> {
    bucket: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
struct OutputConfig<'a> {
    #[serde(rename = "S3Bucket")]
    bucket: &'a str,
    #[serde(rename = "S3Prefix")]
    prefix: &'a str,
}

#[derive(Serialize)]
struct NotificationChannel<'a> {
    #[serde(rename = "SNSTopicArn")]
    topic_arn: &'a str,
    #[serde(rename = "RoleArn")]
    role_arn: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StartDetectionResponse {
    job_id: String,
}

impl TextDetectionClient {
    pub fn new(
        endpoint: &str,
        api_token: &str,
        notification_topic: &str,
        notification_role: &str,
    ) -> Result<Self, OcrError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(OcrError::Http)?;

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_token: api_token.to_string(),
            notification_topic: notification_topic.to_string(),
            notification_role: notification_role.to_string(),
        })
    }
}

#[async_trait]
impl OcrLauncher for TextDetectionClient {
    async fn start_job(&self, request: OcrJobRequest<'_>) -> Result<String, OcrError> {
        let body = StartDetectionRequest {
            document_location: DocumentLocation {
                object: S3Object {
                    bucket: request.bucket,
                    name: request.object_key,
                },
            },
            output_config: OutputConfig {
                bucket: request.bucket,
                prefix: request.output_prefix,
            },
            notification_channel: NotificationChannel {
                topic_arn: &self.notification_topic,
                role_arn: &self.notification_role,
            },
        };

        let response = self
            .http
            .post(format!("{}/start-document-text-detection", self.endpoint))
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await
            .map_err(OcrError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(OcrError::Rejected {
                status: status.as_u16(),
                detail,
            });
        }

        let started: StartDetectionResponse = response.json().await.map_err(OcrError::Http)?;
        Ok(started.job_id)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OCR service rejected the job ({status}): {detail}")]
    Rejected { status: u16, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let body = StartDetectionRequest {
            document_location: DocumentLocation {
                object: S3Object {
                    bucket: "sensitive-data",
                    name: "scans/a.png",
                },
            },
            output_config: OutputConfig {
                bucket: "sensitive-data",
                prefix: "textract-output",
            },
            notification_channel: NotificationChannel {
                topic_arn: "arn:topic",
                role_arn: "arn:role",
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["DocumentLocation"]["S3Object"]["Name"], "scans/a.png");
        assert_eq!(json["OutputConfig"]["S3Prefix"], "textract-output");
        assert_eq!(json["NotificationChannel"]["SNSTopicArn"], "arn:topic");
        assert_eq!(json["NotificationChannel"]["RoleArn"], "arn:role");
    }
}
