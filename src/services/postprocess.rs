//! Normalizes a finished OCR job's output into its canonical artifacts.

use std::sync::Arc;
use std::time::Instant;

use super::keys::{KeyError, KeyLayout, OutputKeys};
use super::storage::{ObjectStore, StorageError};
use crate::models::textract::StructuredOutput;

/// Relocates raw OCR output and derives the plain-text artifact.
pub struct PostProcessor {
    storage: Arc<dyn ObjectStore>,
    layout: KeyLayout,
}

#[derive(Debug, thiserror::Error)]
pub enum PostProcessError {
    #[error(transparent)]
    UnsupportedFormat(#[from] KeyError),

    #[error("OCR output missing: neither {raw} nor {structured} exists")]
    MissingOutput { raw: String, structured: String },

    #[error("Storage operation on {key} failed: {source}")]
    Storage {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("Malformed structured output at {key}: {source}")]
    Parse {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

fn storage_error(key: &str) -> impl FnOnce(StorageError) -> PostProcessError + '_ {
    move |source| PostProcessError::Storage {
        key: key.to_string(),
        source,
    }
}

impl PostProcessor {
    pub fn new(storage: Arc<dyn ObjectStore>, layout: KeyLayout) -> Self {
        Self { storage, layout }
    }

    /// Produce the structured and plain-text artifacts for `job_id`.
    ///
    /// Safe to re-run after a partial failure: if the raw output was already
    /// moved to its canonical key, relocation is skipped.
    pub async fn process(
        &self,
        job_id: &str,
        bucket: &str,
        object_key: &str,
    ) -> Result<OutputKeys, PostProcessError> {
        let started = Instant::now();
        let keys = self.layout.derive(job_id, object_key)?;

        self.relocate(bucket, &keys).await?;

        let raw = self
            .storage
            .get(bucket, &keys.structured)
            .await
            .map_err(storage_error(&keys.structured))?;
        let output = StructuredOutput::from_slice(&raw).map_err(|source| PostProcessError::Parse {
            key: keys.structured.clone(),
            source,
        })?;
        let text = output.plain_text();

        self.storage
            .put(bucket, &keys.text, text.as_bytes(), "text/plain; charset=utf-8")
            .await
            .map_err(storage_error(&keys.text))?;

        metrics::histogram!("postprocessing_seconds").record(started.elapsed().as_secs_f64());
        tracing::debug!(
            job_id = %job_id,
            structured_key = %keys.structured,
            text_key = %keys.text,
            text_bytes = text.len(),
            "Post-processing complete"
        );

        Ok(keys)
    }

    async fn relocate(&self, bucket: &str, keys: &OutputKeys) -> Result<(), PostProcessError> {
        match self.storage.copy(bucket, &keys.raw, &keys.structured).await {
            Ok(()) => {}
            Err(StorageError::NotFound(_)) => {
                let relocated = self
                    .storage
                    .exists(bucket, &keys.structured)
                    .await
                    .map_err(storage_error(&keys.structured))?;
                if !relocated {
                    return Err(PostProcessError::MissingOutput {
                        raw: keys.raw.clone(),
                        structured: keys.structured.clone(),
                    });
                }
                tracing::debug!(key = %keys.structured, "Raw output already relocated");
                return Ok(());
            }
            Err(e) => return Err(storage_error(&keys.raw)(e)),
        }

        self.storage
            .delete(bucket, &keys.raw)
            .await
            .map_err(storage_error(&keys.raw))
    }
}
