//! Fans a batch out into one OCR job per supported image in the bucket.

use chrono::Utc;
use std::sync::Arc;

use super::keys::{is_supported, KeyLayout};
use super::ocr::{OcrError, OcrJobRequest, OcrLauncher};
use super::storage::{ObjectStore, StorageError};
use crate::db::{JobRecordStore, StoreError};
use crate::models::job::JobRecord;

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("Listing bucket {bucket} failed: {source}")]
    Listing {
        bucket: String,
        #[source]
        source: StorageError,
    },

    #[error(transparent)]
    Ocr(#[from] OcrError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Default)]
pub struct LaunchReport {
    pub started: Vec<JobRecord>,
    /// Keys that are not OCR-able images or are OCR output themselves.
    pub skipped: Vec<String>,
    pub failed: Vec<(String, LaunchError)>,
}

pub struct BatchLauncher {
    storage: Arc<dyn ObjectStore>,
    ocr: Arc<dyn OcrLauncher>,
    store: Arc<dyn JobRecordStore>,
    layout: KeyLayout,
}

impl BatchLauncher {
    pub fn new(
        storage: Arc<dyn ObjectStore>,
        ocr: Arc<dyn OcrLauncher>,
        store: Arc<dyn JobRecordStore>,
        layout: KeyLayout,
    ) -> Self {
        Self {
            storage,
            ocr,
            store,
            layout,
        }
    }

    /// Start OCR for every supported image under `prefix` in `bucket`.
    ///
    /// A failure on one object is recorded in the report and does not stop
    /// the rest of the batch.
    pub async fn launch(&self, bucket: &str, prefix: &str) -> Result<LaunchReport, LaunchError> {
        let keys = self
            .storage
            .list(bucket, prefix)
            .await
            .map_err(|source| LaunchError::Listing {
                bucket: bucket.to_string(),
                source,
            })?;

        let mut report = LaunchReport::default();
        for key in keys {
            if self.layout.is_output(&key) || !is_supported(&key) {
                report.skipped.push(key);
                continue;
            }

            match self.launch_one(bucket, &key).await {
                Ok(record) => report.started.push(record),
                Err(e) => {
                    tracing::error!(bucket = %bucket, object_key = %key, error = %e, "Failed to launch OCR job");
                    report.failed.push((key, e));
                }
            }
        }

        tracing::info!(
            bucket = %bucket,
            started = report.started.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Batch launched"
        );
        Ok(report)
    }

    async fn launch_one(&self, bucket: &str, object_key: &str) -> Result<JobRecord, LaunchError> {
        let job_id = self
            .ocr
            .start_job(OcrJobRequest {
                bucket,
                object_key,
                output_prefix: self.layout.output_prefix(),
            })
            .await?;

        let record = self
            .store
            .create(&job_id, bucket, object_key, Utc::now())
            .await?;

        metrics::counter!("ocr_jobs_started_total").increment(1);
        tracing::info!(job_id = %job_id, object_key = %object_key, "Started OCR job");
        Ok(record)
    }
}
