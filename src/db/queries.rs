use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use std::str::FromStr;

use super::{JobRecordStore, StoreError};
use crate::models::job::{JobRecord, JobStatus};

const RECORD_COLUMNS: &str =
    "status, job_id, bucket, object_key, start_timestamp, complete_timestamp, scanned";

/// PostgreSQL-backed job status table.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// A row that cannot be read back is corrupt, never a transient outage.
fn decode(error: sqlx::Error) -> StoreError {
    StoreError::Corrupt(error.to_string())
}

fn record_from_row(row: &PgRow) -> Result<JobRecord, StoreError> {
    let status_str: String = row.try_get("status").map_err(decode)?;
    let status = JobStatus::from_str(&status_str)
        .map_err(|_| StoreError::Corrupt(format!("unknown status '{}'", status_str)))?;

    Ok(JobRecord {
        job_id: row.try_get("job_id").map_err(decode)?,
        status,
        bucket: row.try_get("bucket").map_err(decode)?,
        object_key: row.try_get("object_key").map_err(decode)?,
        start_timestamp: row.try_get("start_timestamp").map_err(decode)?,
        complete_timestamp: row.try_get("complete_timestamp").map_err(decode)?,
        scanned: row.try_get("scanned").map_err(decode)?,
    })
}

fn store_error(job_id: &str, error: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &error {
        if db.is_unique_violation() {
            return StoreError::DuplicateKey(job_id.to_string());
        }
    }
    if matches!(error, sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_)) {
        return StoreError::Corrupt(error.to_string());
    }
    StoreError::Unavailable(error)
}

#[async_trait]
impl JobRecordStore for PgJobStore {
    async fn create(
        &self,
        job_id: &str,
        bucket: &str,
        object_key: &str,
        start_timestamp: DateTime<Utc>,
    ) -> Result<JobRecord, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO ocr_jobs (status, job_id, bucket, object_key, start_timestamp, scanned)
            VALUES ('IN_PROGRESS', $1, $2, $3, $4, FALSE)
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(job_id)
        .bind(bucket)
        .bind(object_key)
        .bind(start_timestamp)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| store_error(job_id, e))?;

        record_from_row(&row)
    }

    async fn find_in_progress(&self, job_id: &str) -> Result<Option<JobRecord>, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM ocr_jobs
            WHERE status = 'IN_PROGRESS' AND job_id = $1
            "#
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error(job_id, e))?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn find(&self, job_id: &str) -> Result<Option<JobRecord>, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM ocr_jobs
            WHERE job_id = $1
            "#
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error(job_id, e))?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn transition_to_terminal(
        &self,
        job_id: &str,
        status: JobStatus,
        bucket: &str,
        object_key: &str,
        complete_timestamp: DateTime<Utc>,
    ) -> Result<JobRecord, StoreError> {
        if !status.is_terminal() {
            return Err(StoreError::NotTerminal(status));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(StoreError::Unavailable)?;

        // Status is part of the key: delete the IN_PROGRESS row and insert the
        // terminal one inside the same transaction.
        let deleted = sqlx::query(
            r#"
            DELETE FROM ocr_jobs
            WHERE status = 'IN_PROGRESS' AND job_id = $1
            RETURNING start_timestamp
            "#,
        )
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| store_error(job_id, e))?;

        let Some(deleted) = deleted else {
            tx.rollback().await.map_err(StoreError::Unavailable)?;
            return Err(StoreError::NotFound(job_id.to_string()));
        };
        let start_timestamp: DateTime<Utc> = deleted
            .try_get("start_timestamp")
            .map_err(decode)?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO ocr_jobs
                (status, job_id, bucket, object_key, start_timestamp, complete_timestamp, scanned)
            VALUES ($1, $2, $3, $4, $5, $6, FALSE)
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(status.to_string())
        .bind(job_id)
        .bind(bucket)
        .bind(object_key)
        .bind(start_timestamp)
        .bind(complete_timestamp)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| store_error(job_id, e))?;

        let record = record_from_row(&row)?;
        tx.commit().await.map_err(StoreError::Unavailable)?;

        Ok(record)
    }

    async fn has_outstanding(&self) -> Result<bool, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (SELECT 1 FROM ocr_jobs WHERE status = 'IN_PROGRESS') AS outstanding
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::Unavailable)?;

        row.try_get("outstanding").map_err(decode)
    }

    async fn list_unscanned_succeeded(&self) -> Result<Vec<JobRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM ocr_jobs
            WHERE status = 'SUCCEEDED' AND scanned = FALSE
            ORDER BY complete_timestamp ASC, job_id ASC
            "#
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::Unavailable)?;

        rows.iter().map(record_from_row).collect()
    }

    async fn mark_scanned(&self, job_id: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE ocr_jobs
            SET scanned = TRUE
            WHERE status = 'SUCCEEDED' AND job_id = $1
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(|e| store_error(job_id, e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(job_id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreadable_column_is_corrupt_not_transient() {
        let error = decode(sqlx::Error::ColumnNotFound("status".to_string()));
        assert!(matches!(error, StoreError::Corrupt(_)));
        assert!(!error.is_transient());
    }

    #[test]
    fn test_connection_failure_is_transient() {
        let error = store_error("job-1", sqlx::Error::PoolTimedOut);
        assert!(matches!(error, StoreError::Unavailable(_)));
        assert!(error.is_transient());
    }
}
