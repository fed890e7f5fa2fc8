use chrono::Utc;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::models::notification::CompletionNotification;

const DEFAULT_NAMESPACE: &str = "ocr_scan";

/// Notification payload serialized into Redis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueuedNotification {
    /// Distinguishes redeliveries so `complete` removes exactly one entry.
    pub delivery_id: Uuid,
    pub notification: CompletionNotification,
    pub attempt: u32,
}

impl QueuedNotification {
    pub fn new(notification: CompletionNotification) -> Self {
        Self {
            delivery_id: Uuid::new_v4(),
            notification,
            attempt: 1,
        }
    }

    /// The same notification, scheduled for another delivery.
    pub fn next_attempt(&self) -> Self {
        Self {
            delivery_id: Uuid::new_v4(),
            notification: self.notification.clone(),
            attempt: self.attempt + 1,
        }
    }
}

#[derive(Debug, Clone)]
struct QueueKeys {
    pending: String,
    processing: String,
    retry: String,
    dead_letter: String,
}

impl QueueKeys {
    fn new(namespace: &str) -> Self {
        Self {
            pending: format!("{namespace}:notifications"),
            processing: format!("{namespace}:processing"),
            retry: format!("{namespace}:retry"),
            dead_letter: format!("{namespace}:dead_letter"),
        }
    }
}

/// Redis-backed queue of completion notifications awaiting the worker.
///
/// Deliveries move `pending -> processing` on dequeue and leave `processing`
/// when completed, scheduled for retry (`retry` sorted set, scored by due time
/// in milliseconds) or dead-lettered.
pub struct NotificationQueue {
    client: redis::Client,
    keys: QueueKeys,
}

impl NotificationQueue {
    pub fn new(redis_url: &str) -> Result<Self, QueueError> {
        Self::with_namespace(redis_url, DEFAULT_NAMESPACE)
    }

    /// Queue whose Redis keys all start with `namespace:`.
    pub fn with_namespace(redis_url: &str, namespace: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url).map_err(QueueError::Redis)?;
        Ok(Self {
            client,
            keys: QueueKeys::new(namespace),
        })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, QueueError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)
    }

    /// Enqueue one notification delivery.
    pub async fn enqueue(&self, item: &QueuedNotification) -> Result<(), QueueError> {
        let mut conn = self.connection().await?;
        let payload = serde_json::to_string(item).map_err(QueueError::Serialize)?;
        conn.lpush::<_, _, ()>(&self.keys.pending, &payload)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Pop the oldest delivery, moving it to the processing list until completed.
    pub async fn dequeue(&self) -> Result<Option<QueuedNotification>, QueueError> {
        let mut conn = self.connection().await?;
        let result: Option<String> = conn
            .rpoplpush(&self.keys.pending, &self.keys.processing)
            .await
            .map_err(QueueError::Redis)?;

        match result {
            Some(payload) => {
                let item: QueuedNotification =
                    serde_json::from_str(&payload).map_err(QueueError::Serialize)?;
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    /// Check Redis connectivity (for health checks).
    pub async fn health_check(&self) -> Result<(), QueueError> {
        let mut conn = self.connection().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Number of deliveries waiting for a worker.
    pub async fn queue_depth(&self) -> Result<u64, QueueError> {
        let mut conn = self.connection().await?;
        let depth: u64 = conn.llen(&self.keys.pending).await.map_err(QueueError::Redis)?;
        Ok(depth)
    }

    /// Number of deliveries parked after exhausting their retries.
    pub async fn dead_letter_depth(&self) -> Result<u64, QueueError> {
        let mut conn = self.connection().await?;
        let depth: u64 = conn
            .llen(&self.keys.dead_letter)
            .await
            .map_err(QueueError::Redis)?;
        Ok(depth)
    }

    /// Acknowledge a delivery (remove it from the processing list).
    pub async fn complete(&self, item: &QueuedNotification) -> Result<(), QueueError> {
        let mut conn = self.connection().await?;
        let payload = serde_json::to_string(item).map_err(QueueError::Serialize)?;
        conn.lrem::<_, _, ()>(&self.keys.processing, 1, &payload)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Park `item` in the retry set until `delay` has passed.
    pub async fn schedule_retry(
        &self,
        item: &QueuedNotification,
        delay: Duration,
    ) -> Result<(), QueueError> {
        let mut conn = self.connection().await?;
        let payload = serde_json::to_string(item).map_err(QueueError::Serialize)?;
        let delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
        let due = Utc::now().timestamp_millis().saturating_add(delay_ms);
        conn.zadd::<_, _, _, ()>(&self.keys.retry, &payload, due)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Move every retry whose delay has passed back onto the pending list.
    pub async fn promote_due_retries(&self) -> Result<usize, QueueError> {
        let mut conn = self.connection().await?;
        let now = Utc::now().timestamp_millis();
        let due: Vec<String> = conn
            .zrangebyscore(&self.keys.retry, "-inf", now)
            .await
            .map_err(QueueError::Redis)?;

        for payload in &due {
            redis::pipe()
                .atomic()
                .zrem(&self.keys.retry, payload)
                .ignore()
                .lpush(&self.keys.pending, payload)
                .ignore()
                .query_async::<()>(&mut conn)
                .await
                .map_err(QueueError::Redis)?;
        }
        Ok(due.len())
    }

    /// Move `item` from the processing list to the dead-letter list.
    pub async fn dead_letter(&self, item: &QueuedNotification) -> Result<(), QueueError> {
        let mut conn = self.connection().await?;
        let payload = serde_json::to_string(item).map_err(QueueError::Serialize)?;
        redis::pipe()
            .atomic()
            .lrem(&self.keys.processing, 1, &payload)
            .ignore()
            .lpush(&self.keys.dead_letter, &payload)
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Return every dead-lettered delivery to the pending list.
    pub async fn redrive_dead_letters(&self) -> Result<usize, QueueError> {
        self.drain_into_pending(&self.keys.dead_letter).await
    }

    /// Return deliveries stranded in the processing list to the pending list.
    ///
    /// Only safe while no worker is mid-delivery on this queue, so the worker
    /// calls it once at startup.
    pub async fn recover_processing(&self) -> Result<usize, QueueError> {
        self.drain_into_pending(&self.keys.processing).await
    }

    async fn drain_into_pending(&self, source: &str) -> Result<usize, QueueError> {
        let mut conn = self.connection().await?;
        let mut moved = 0;
        loop {
            let payload: Option<String> = conn
                .rpoplpush(source, &self.keys.pending)
                .await
                .map_err(QueueError::Redis)?;
            if payload.is_none() {
                return Ok(moved);
            }
            moved += 1;
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis operation failed: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Failed to serialize queue payload: {0}")]
    Serialize(#[from] serde_json::Error),
}
