//! Notification queue tests against a running Redis
//!
//! Run with: cargo test --test queue_test -- --ignored
//!
//! Set REDIS_URL to override the default (redis://127.0.0.1:6379). Every test
//! uses its own key namespace.

use std::time::Duration;

use ocr_scan_pipeline::models::job::JobStatus;
use ocr_scan_pipeline::models::notification::CompletionNotification;
use ocr_scan_pipeline::services::queue::{NotificationQueue, QueuedNotification};
use tokio_test::assert_ok;
use uuid::Uuid;

fn queue() -> NotificationQueue {
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    NotificationQueue::with_namespace(&redis_url, &format!("queue-test:{}", Uuid::new_v4()))
        .expect("Failed to open Redis client")
}

fn delivery(job_id: &str) -> QueuedNotification {
    QueuedNotification::new(CompletionNotification {
        job_id: job_id.to_string(),
        bucket: "sensitive-data".to_string(),
        object_key: "photo1.png".to_string(),
        status: JobStatus::Succeeded,
    })
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_unacknowledged_delivery_recovered_on_restart() {
    let queue = queue();
    let item = delivery("job-1");
    assert_ok!(queue.enqueue(&item).await);

    // Dequeued by a worker that died before acknowledging.
    let taken = assert_ok!(queue.dequeue().await).expect("delivery");
    assert_eq!(taken.delivery_id, item.delivery_id);
    assert!(assert_ok!(queue.dequeue().await).is_none());

    assert_eq!(assert_ok!(queue.recover_processing().await), 1);
    assert_eq!(assert_ok!(queue.queue_depth().await), 1);

    let redelivered = assert_ok!(queue.dequeue().await).expect("redelivery");
    assert_eq!(redelivered, item);
    assert_ok!(queue.complete(&redelivered).await);
    assert_eq!(assert_ok!(queue.recover_processing().await), 0);
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_retry_waits_for_its_delay() {
    let queue = queue();
    let item = delivery("job-1");
    assert_ok!(queue.enqueue(&item).await);
    let taken = assert_ok!(queue.dequeue().await).expect("delivery");

    let later = taken.next_attempt();
    assert_ok!(queue.schedule_retry(&later, Duration::from_secs(3600)).await);
    assert_ok!(queue.complete(&taken).await);
    assert_eq!(assert_ok!(queue.promote_due_retries().await), 0);
    assert!(assert_ok!(queue.dequeue().await).is_none());

    let due = delivery("job-2").next_attempt();
    assert_ok!(queue.schedule_retry(&due, Duration::ZERO).await);
    assert_eq!(assert_ok!(queue.promote_due_retries().await), 1);

    let redelivered = assert_ok!(queue.dequeue().await).expect("due retry");
    assert_eq!(redelivered, due);
    assert_eq!(redelivered.attempt, 2);
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_dead_letter_leaves_processing_and_redrives() {
    let queue = queue();
    let item = delivery("job-1");
    assert_ok!(queue.enqueue(&item).await);
    let taken = assert_ok!(queue.dequeue().await).expect("delivery");

    assert_ok!(queue.dead_letter(&taken).await);
    assert_eq!(assert_ok!(queue.dead_letter_depth().await), 1);
    assert_eq!(assert_ok!(queue.recover_processing().await), 0);

    assert_eq!(assert_ok!(queue.redrive_dead_letters().await), 1);
    assert_eq!(assert_ok!(queue.dead_letter_depth().await), 0);
    let redelivered = assert_ok!(queue.dequeue().await).expect("redriven delivery");
    assert_eq!(redelivered, item);
}
