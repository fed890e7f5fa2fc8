use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

use crate::models::job::{JobRecord, JobStatus};

/// Initialize PostgreSQL connection pool
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .min_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))
}

pub mod queries;

/// Durable per-job state, keyed by (status, job id).
///
/// Exactly one record is live per job id. Moving a job out of `IN_PROGRESS`
/// replaces its record atomically, so concurrent readers never observe a job
/// with zero or two records.
#[async_trait]
pub trait JobRecordStore: Send + Sync {
    /// Insert a new `IN_PROGRESS` record.
    async fn create(
        &self,
        job_id: &str,
        bucket: &str,
        object_key: &str,
        start_timestamp: DateTime<Utc>,
    ) -> Result<JobRecord, StoreError>;

    /// The `IN_PROGRESS` record for `job_id`, if any.
    async fn find_in_progress(&self, job_id: &str) -> Result<Option<JobRecord>, StoreError>;

    /// The live record for `job_id`, whatever its status.
    async fn find(&self, job_id: &str) -> Result<Option<JobRecord>, StoreError>;

    /// Replace the `IN_PROGRESS` record with a terminal one carrying the
    /// original start timestamp.
    async fn transition_to_terminal(
        &self,
        job_id: &str,
        status: JobStatus,
        bucket: &str,
        object_key: &str,
        complete_timestamp: DateTime<Utc>,
    ) -> Result<JobRecord, StoreError>;

    /// Whether any job is still `IN_PROGRESS`.
    async fn has_outstanding(&self) -> Result<bool, StoreError>;

    /// Every `SUCCEEDED` record not yet covered by a classification scan.
    async fn list_unscanned_succeeded(&self) -> Result<Vec<JobRecord>, StoreError>;

    /// Flag the `SUCCEEDED` record as scanned. Re-marking is a no-op.
    async fn mark_scanned(&self, job_id: &str) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("A record for job {0} already exists")]
    DuplicateKey(String),

    #[error("No matching record for job {0}")]
    NotFound(String),

    #[error("{0} is not a terminal status")]
    NotTerminal(JobStatus),

    #[error("Job store unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),

    #[error("Stored record is corrupt: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Transient backend faults; the whole event can be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}
