use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One classification job covering a set of key prefixes in a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRequest {
    pub name: String,
    pub account_id: String,
    pub bucket: String,
    pub key_prefixes: Vec<String>,
}

/// Submits sensitive-data classification jobs.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Submit a one-time job and return its id.
    async fn submit_job(&self, request: &ClassificationRequest)
        -> Result<String, ClassificationError>;
}

/// HTTP client for the classification service.
pub struct ClassificationClient {
    http: Client,
    endpoint: String,
    api_token: String,
    custom_data_identifier_ids: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateJobBody<'a> {
    job_type: &'static str,
    name: &'a str,
    #[serde(skip_serializing_if = "no_identifiers")]
    custom_data_identifier_ids: &'a [String],
    s3_job_definition: S3JobDefinition<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct S3JobDefinition<'a> {
    bucket_definitions: Vec<BucketDefinition<'a>>,
    scoping: Scoping<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BucketDefinition<'a> {
    account_id: &'a str,
    buckets: Vec<&'a str>,
}

#[derive(Serialize)]
struct Scoping<'a> {
    includes: ScopeIncludes<'a>,
}

#[derive(Serialize)]
struct ScopeIncludes<'a> {
    and: Vec<ScopeTerm<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScopeTerm<'a> {
    simple_scope_term: SimpleScopeTerm<'a>,
}

#[derive(Serialize)]
struct SimpleScopeTerm<'a> {
    comparator: &'static str,
    key: &'static str,
    values: &'a [String],
}

fn no_identifiers(ids: &&[String]) -> bool {
    ids.is_empty()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateJobResponse {
    job_id: String,
}

impl<'a> CreateJobBody<'a> {
    fn new(request: &'a ClassificationRequest, custom_data_identifier_ids: &'a [String]) -> Self {
        Self {
            job_type: "ONE_TIME",
            name: &request.name,
            custom_data_identifier_ids,
            s3_job_definition: S3JobDefinition {
                bucket_definitions: vec![BucketDefinition {
                    account_id: &request.account_id,
                    buckets: vec![&request.bucket],
                }],
                scoping: Scoping {
                    includes: ScopeIncludes {
                        and: vec![ScopeTerm {
                            simple_scope_term: SimpleScopeTerm {
                                comparator: "STARTS_WITH",
                                key: "OBJECT_KEY",
                                values: &request.key_prefixes,
                            },
                        }],
                    },
                },
            },
        }
    }
}

impl ClassificationClient {
    pub fn new(
        endpoint: &str,
        api_token: &str,
        custom_data_identifier_ids: Vec<String>,
    ) -> Result<Self, ClassificationError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(ClassificationError::Http)?;

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_token: api_token.to_string(),
            custom_data_identifier_ids,
        })
    }
}

#[async_trait]
impl Classifier for ClassificationClient {
    async fn submit_job(
        &self,
        request: &ClassificationRequest,
    ) -> Result<String, ClassificationError> {
        let body = CreateJobBody::new(request, &self.custom_data_identifier_ids);

        let response = self
            .http
            .post(format!("{}/jobs", self.endpoint))
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await
            .map_err(ClassificationError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ClassificationError::Rejected {
                status: status.as_u16(),
                detail,
            });
        }

        let created: CreateJobResponse =
            response.json().await.map_err(ClassificationError::Http)?;
        Ok(created.job_id)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClassificationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Classification service rejected the job ({status}): {detail}")]
    Rejected { status: u16, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_body_scopes_by_prefix() {
        let request = ClassificationRequest {
            name: "Scan for 2 objects 2026-01-01T00:00:00Z".to_string(),
            account_id: "123456789012".to_string(),
            bucket: "sensitive-data".to_string(),
            key_prefixes: vec![
                "textract-output/j/a.json".to_string(),
                "textract-output/j/a.json.postprocessed.txt".to_string(),
            ],
        };
        let identifiers = vec!["cdi-1".to_string()];
        let json = serde_json::to_value(CreateJobBody::new(&request, &identifiers)).unwrap();

        assert_eq!(json["jobType"], "ONE_TIME");
        assert_eq!(json["customDataIdentifierIds"][0], "cdi-1");
        let definition = &json["s3JobDefinition"];
        assert_eq!(definition["bucketDefinitions"][0]["accountId"], "123456789012");
        assert_eq!(definition["bucketDefinitions"][0]["buckets"][0], "sensitive-data");

        let term = &definition["scoping"]["includes"]["and"][0]["simpleScopeTerm"];
        assert_eq!(term["comparator"], "STARTS_WITH");
        assert_eq!(term["key"], "OBJECT_KEY");
        assert_eq!(term["values"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_identifiers_omitted_when_empty() {
        let request = ClassificationRequest {
            name: "n".to_string(),
            account_id: "a".to_string(),
            bucket: "b".to_string(),
            key_prefixes: vec!["k".to_string()],
        };
        let json = serde_json::to_value(CreateJobBody::new(&request, &[])).unwrap();
        assert!(json.get("customDataIdentifierIds").is_none());
    }
}
