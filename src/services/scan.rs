//! Submits classification scans for finished, not yet scanned jobs.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::classification::{ClassificationError, ClassificationRequest, Classifier};
use super::keys::KeyLayout;
use crate::db::{JobRecordStore, StoreError};

/// One classification job that was accepted by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSubmission {
    pub classification_job_id: String,
    pub bucket: String,
    pub job_ids: Vec<String>,
    pub key_prefixes: Vec<String>,
}

/// A bucket whose submission was rejected; its jobs stay eligible.
#[derive(Debug)]
pub struct ScanFailure {
    pub bucket: String,
    pub job_ids: Vec<String>,
    pub error: ScanError,
}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub submissions: Vec<ScanSubmission>,
    pub failures: Vec<ScanFailure>,
    /// Jobs whose source key has no output mapping; never scannable.
    pub unscannable: Vec<String>,
    /// Jobs covered by a submission whose scanned flag could not be set.
    pub unmarked: Vec<String>,
}

impl ScanReport {
    pub fn scanned_jobs(&self) -> usize {
        self.submissions.iter().map(|s| s.job_ids.len()).sum::<usize>() - self.unmarked.len()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Could not list scan candidates: {0}")]
    Store(#[from] StoreError),

    #[error("Classification submission for bucket {bucket} failed: {source}")]
    SubmissionFailed {
        bucket: String,
        #[source]
        source: ClassificationError,
    },
}

pub struct ScanDispatcher {
    store: Arc<dyn JobRecordStore>,
    classifier: Arc<dyn Classifier>,
    layout: KeyLayout,
    account_id: String,
}

#[derive(Default)]
struct BucketScope {
    job_ids: Vec<String>,
    key_prefixes: Vec<String>,
}

impl ScanDispatcher {
    pub fn new(
        store: Arc<dyn JobRecordStore>,
        classifier: Arc<dyn Classifier>,
        layout: KeyLayout,
        account_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            classifier,
            layout,
            account_id: account_id.into(),
        }
    }

    /// Scan every succeeded job that has not been scanned yet.
    ///
    /// Candidates are grouped by bucket and each group becomes one
    /// classification job. A group is flagged scanned only after its
    /// submission is accepted, so a rejected group is retried by the next run.
    pub async fn dispatch(&self) -> Result<ScanReport, ScanError> {
        let candidates = self.store.list_unscanned_succeeded().await?;
        let mut report = ScanReport::default();

        if candidates.is_empty() {
            tracing::info!("No unscanned jobs, skipping classification submission");
            return Ok(report);
        }

        let mut scopes: BTreeMap<String, BucketScope> = BTreeMap::new();
        for record in candidates {
            match self.layout.derive(&record.job_id, &record.object_key) {
                Ok(keys) => {
                    let scope = scopes.entry(record.bucket).or_default();
                    scope.job_ids.push(record.job_id);
                    scope.key_prefixes.push(keys.structured);
                    scope.key_prefixes.push(keys.text);
                }
                Err(e) => {
                    tracing::warn!(job_id = %record.job_id, error = %e, "Skipping unscannable job");
                    report.unscannable.push(record.job_id);
                }
            }
        }

        for (bucket, scope) in scopes {
            let request = ClassificationRequest {
                name: format!(
                    "Scan for {} objects {}",
                    scope.key_prefixes.len(),
                    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ")
                ),
                account_id: self.account_id.clone(),
                bucket: bucket.clone(),
                key_prefixes: scope.key_prefixes,
            };

            match self.classifier.submit_job(&request).await {
                Ok(classification_job_id) => {
                    metrics::counter!("scan_submissions_total").increment(1);
                    tracing::info!(
                        classification_job_id = %classification_job_id,
                        bucket = %bucket,
                        jobs = scope.job_ids.len(),
                        objects = request.key_prefixes.len(),
                        "Classification job submitted"
                    );

                    for job_id in &scope.job_ids {
                        if let Err(e) = self.store.mark_scanned(job_id).await {
                            tracing::error!(job_id = %job_id, error = %e, "Failed to mark job scanned");
                            report.unmarked.push(job_id.clone());
                        }
                    }

                    report.submissions.push(ScanSubmission {
                        classification_job_id,
                        bucket,
                        job_ids: scope.job_ids,
                        key_prefixes: request.key_prefixes,
                    });
                }
                Err(source) => {
                    metrics::counter!("scan_submission_failures_total").increment(1);
                    tracing::error!(
                        bucket = %bucket,
                        jobs = scope.job_ids.len(),
                        error = %source,
                        kind = "ScanSubmissionFailed",
                        "Classification submission failed, jobs remain eligible"
                    );
                    report.failures.push(ScanFailure {
                        bucket: bucket.clone(),
                        job_ids: scope.job_ids,
                        error: ScanError::SubmissionFailed { bucket, source },
                    });
                }
            }
        }

        Ok(report)
    }
}
