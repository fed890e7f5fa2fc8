//! Handles one OCR job completion notification end to end.

use chrono::Utc;
use std::sync::Arc;

use super::gate::{BatchGate, GateOutcome};
use super::keys::{KeyError, OutputKeys};
use super::postprocess::{PostProcessError, PostProcessor};
use super::scan::ScanError;
use crate::db::{JobRecordStore, StoreError};
use crate::models::job::{JobRecord, JobStatus};
use crate::models::notification::CompletionNotification;

/// Failures that leave the job record untouched.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("No in-progress record for job {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    UnsupportedFormat(KeyError),

    #[error("Post-processing failed for job {job_id}: {source}")]
    PostProcessingFailed {
        job_id: String,
        #[source]
        source: PostProcessError,
    },
}

impl From<StoreError> for PipelineError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(job_id) => PipelineError::NotFound(job_id),
            other => PipelineError::Store(other),
        }
    }
}

impl PipelineError {
    /// Stable failure kind for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::NotFound(_) => "NotFound",
            PipelineError::Store(StoreError::DuplicateKey(_)) => "DuplicateKey",
            PipelineError::Store(StoreError::NotFound(_)) => "NotFound",
            PipelineError::Store(StoreError::NotTerminal(_)) => "InvalidTransition",
            PipelineError::Store(StoreError::Unavailable(_)) => "StoreUnavailable",
            PipelineError::Store(StoreError::Corrupt(_)) => "StoreCorrupt",
            PipelineError::UnsupportedFormat(_) => "UnsupportedFormat",
            PipelineError::PostProcessingFailed { .. } => "PostProcessingFailed",
        }
    }

    /// Whether reprocessing the same notification can succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            PipelineError::Store(e) => e.is_transient(),
            PipelineError::PostProcessingFailed { .. } => true,
            PipelineError::NotFound(_) | PipelineError::UnsupportedFormat(_) => false,
        }
    }
}

#[derive(Debug)]
pub struct CompletionOutcome {
    /// The committed terminal record.
    pub record: JobRecord,
    /// Artifacts written for a succeeded job.
    pub artifacts: Option<OutputKeys>,
    /// Batch gate result. An error here never undoes the transition.
    pub batch: Result<GateOutcome, ScanError>,
}

pub struct CompletionHandler {
    store: Arc<dyn JobRecordStore>,
    post_processor: PostProcessor,
    gate: BatchGate,
}

impl CompletionHandler {
    pub fn new(
        store: Arc<dyn JobRecordStore>,
        post_processor: PostProcessor,
        gate: BatchGate,
    ) -> Self {
        Self {
            store,
            post_processor,
            gate,
        }
    }

    pub fn gate(&self) -> &BatchGate {
        &self.gate
    }

    /// Process a single completion notification.
    pub async fn handle(
        &self,
        notification: &CompletionNotification,
    ) -> Result<CompletionOutcome, PipelineError> {
        let result = self.handle_inner(notification).await;
        if let Err(e) = &result {
            metrics::counter!("completion_failures_total", "kind" => e.kind()).increment(1);
            tracing::error!(
                job_id = %notification.job_id,
                kind = e.kind(),
                transient = e.is_transient(),
                error = %e,
                "Completion notification failed"
            );
        }
        result
    }

    async fn handle_inner(
        &self,
        notification: &CompletionNotification,
    ) -> Result<CompletionOutcome, PipelineError> {
        let job_id = notification.job_id.as_str();

        let existing = self
            .store
            .find_in_progress(job_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(job_id.to_string()))?;

        if existing.bucket != notification.bucket || existing.object_key != notification.object_key {
            tracing::warn!(
                job_id = %job_id,
                recorded_key = %existing.object_key,
                notified_key = %notification.object_key,
                "Notification location differs from launch record"
            );
        }

        let artifacts = match notification.status {
            JobStatus::Succeeded => {
                let keys = self
                    .post_processor
                    .process(job_id, &notification.bucket, &notification.object_key)
                    .await
                    .map_err(|e| match e {
                        PostProcessError::UnsupportedFormat(key_error) => {
                            PipelineError::UnsupportedFormat(key_error)
                        }
                        source => PipelineError::PostProcessingFailed {
                            job_id: job_id.to_string(),
                            source,
                        },
                    })?;
                Some(keys)
            }
            _ => None,
        };

        let record = self.finish(&existing, notification.status, notification).await?;

        let batch = self.evaluate_gate(job_id).await;

        Ok(CompletionOutcome {
            record,
            artifacts,
            batch,
        })
    }

    /// Give up on a notification whose retries are exhausted.
    ///
    /// The job is recorded as FAILED without post-processing so the batch gate
    /// can close over it. Returns `NotFound` if the job is no longer in progress.
    pub async fn abandon(
        &self,
        notification: &CompletionNotification,
        reason: &PipelineError,
    ) -> Result<CompletionOutcome, PipelineError> {
        let job_id = notification.job_id.as_str();

        let existing = self
            .store
            .find_in_progress(job_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(job_id.to_string()))?;

        let record = self.finish(&existing, JobStatus::Failed, notification).await?;
        metrics::counter!("ocr_jobs_abandoned_total", "kind" => reason.kind()).increment(1);
        tracing::error!(
            job_id = %job_id,
            notified_status = %notification.status,
            kind = reason.kind(),
            error = %reason,
            "Retries exhausted, job recorded as FAILED"
        );

        let batch = self.evaluate_gate(job_id).await;

        Ok(CompletionOutcome {
            record,
            artifacts: None,
            batch,
        })
    }

    /// Commit the terminal record at the notified location.
    async fn finish(
        &self,
        existing: &JobRecord,
        status: JobStatus,
        notification: &CompletionNotification,
    ) -> Result<JobRecord, PipelineError> {
        let complete_timestamp = Utc::now().max(existing.start_timestamp);
        let record = self
            .store
            .transition_to_terminal(
                &existing.job_id,
                status,
                &notification.bucket,
                &notification.object_key,
                complete_timestamp,
            )
            .await?;

        metrics::counter!("ocr_jobs_completed_total", "status" => record.status.to_string())
            .increment(1);
        tracing::info!(
            job_id = %record.job_id,
            status = %record.status,
            object_key = %record.object_key,
            "Job reached terminal status"
        );
        Ok(record)
    }

    async fn evaluate_gate(&self, job_id: &str) -> Result<GateOutcome, ScanError> {
        let batch = self.gate.evaluate().await;
        if let Err(e) = &batch {
            tracing::warn!(
                job_id = %job_id,
                error = %e,
                "Batch gate failed, scan left to a later event or the sweep"
            );
        }
        batch
    }
}
