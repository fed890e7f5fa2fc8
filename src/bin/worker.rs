use metrics_exporter_prometheus::PrometheusBuilder;
use ocr_scan_pipeline::{
    app_state::{AppState, PipelineSettings},
    config::AppConfig,
    db,
    services::{
        classification::ClassificationClient,
        completion::{CompletionOutcome, PipelineError},
        gate::GateOutcome,
        ocr::TextDetectionClient,
        queue::{NotificationQueue, QueueError, QueuedNotification},
        retry::{RetryDecision, RetryPolicy},
        scan::ScanReport,
        storage::S3Storage,
    },
    telemetry,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

const POLL_INTERVAL_MS: u64 = 1000; // 1 second

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting completion notification worker");

    let config = AppConfig::from_env().expect("Failed to load configuration");

    let metrics_addr: SocketAddr = config
        .worker_metrics_addr
        .parse()
        .expect("Invalid WORKER_METRICS_ADDR");
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .expect("Failed to install Prometheus metrics exporter");
    telemetry::describe_metrics();
    tracing::info!(%metrics_addr, "Prometheus metrics listener started");

    tracing::info!("Connecting to PostgreSQL");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Initializing services");
    let storage = S3Storage::new(
        &config.s3_region,
        &config.s3_endpoint,
        &config.s3_access_key,
        &config.s3_secret_key,
    )
    .expect("Failed to initialize S3 client");

    let queue = NotificationQueue::new(&config.redis_url).expect("Failed to initialize queue");

    let ocr = TextDetectionClient::new(
        &config.ocr_endpoint,
        &config.ocr_api_token,
        &config.ocr_notification_topic,
        &config.ocr_notification_role,
    )
    .expect("Failed to initialize OCR client");

    let classifier = ClassificationClient::new(
        &config.classification_endpoint,
        &config.classification_api_token,
        config.custom_data_identifiers(),
    )
    .expect("Failed to initialize classification client");

    let state = AppState::new(
        db_pool,
        Arc::new(storage),
        queue,
        Arc::new(ocr),
        Arc::new(classifier),
        PipelineSettings {
            bucket: config.s3_bucket.clone(),
            output_prefix: config.output_prefix.clone(),
            account_id: config.account_id.clone(),
        },
    );

    // Deliveries a previous run dequeued but never acknowledged.
    match state.queue.recover_processing().await {
        Ok(0) => {}
        Ok(recovered) => {
            tracing::warn!(recovered, "Returned unacknowledged deliveries to the queue")
        }
        Err(e) => tracing::error!(error = %e, "Failed to recover unacknowledged deliveries"),
    }

    let policy = RetryPolicy::new(
        config.max_notification_attempts,
        Duration::from_secs(config.retry_base_delay_secs),
        Duration::from_secs(config.retry_max_delay_secs),
    );
    let sweep_interval = Duration::from_secs(config.scan_sweep_interval_secs);
    let mut last_sweep = Instant::now();

    tracing::info!(
        sweep_interval_secs = config.scan_sweep_interval_secs,
        max_attempts = policy.max_attempts,
        "Worker ready, starting notification loop"
    );

    loop {
        match state.queue.promote_due_retries().await {
            Ok(0) => {}
            Ok(promoted) => tracing::debug!(promoted, "Due retries moved back to the queue"),
            Err(e) => tracing::error!(error = %e, "Failed to promote due retries"),
        }

        match process_next_notification(&state, &policy).await {
            Ok(true) => {
                tracing::debug!("Notification processed, checking for next one");
            }
            Ok(false) => {
                if last_sweep.elapsed() >= sweep_interval {
                    sweep(&state).await;
                    last_sweep = Instant::now();
                }
                tracing::trace!("No notifications available, sleeping");
                sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Queue error, will retry");
                sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
            }
        }
    }
}

/// Process the next queued notification.
/// Returns Ok(true) if one was processed, Ok(false) if the queue was empty.
async fn process_next_notification(
    state: &AppState,
    policy: &RetryPolicy,
) -> Result<bool, QueueError> {
    let item = match state.queue.dequeue().await? {
        Some(item) => item,
        None => return Ok(false),
    };
    let notification = &item.notification;

    tracing::info!(
        job_id = %notification.job_id,
        status = %notification.status,
        attempt = item.attempt,
        "Processing completion notification"
    );

    match state.completion.handle(notification).await {
        Ok(outcome) => {
            log_batch(&outcome);
            state.queue.complete(&item).await?;
        }
        Err(e) => match policy.decide(&e, item.attempt) {
            RetryDecision::Retry { delay } => {
                state.queue.schedule_retry(&item.next_attempt(), delay).await?;
                state.queue.complete(&item).await?;
                metrics::counter!("notification_retries_total").increment(1);
                tracing::info!(
                    job_id = %notification.job_id,
                    attempt = item.attempt,
                    kind = e.kind(),
                    delay_secs = delay.as_secs(),
                    "Notification scheduled for retry"
                );
            }
            RetryDecision::Abandon => abandon(state, &item, &e).await?,
            RetryDecision::Drop => {
                state.queue.complete(&item).await?;
                tracing::warn!(
                    job_id = %notification.job_id,
                    attempt = item.attempt,
                    kind = e.kind(),
                    "Notification dropped"
                );
            }
        },
    }

    Ok(true)
}

/// Record the job as FAILED once its retries are spent, so the batch can close.
/// If even that cannot be written the delivery is dead-lettered for the sweep.
async fn abandon(
    state: &AppState,
    item: &QueuedNotification,
    reason: &PipelineError,
) -> Result<(), QueueError> {
    let job_id = &item.notification.job_id;
    match state.completion.abandon(&item.notification, reason).await {
        Ok(outcome) => {
            log_batch(&outcome);
            state.queue.complete(item).await
        }
        Err(e) if e.is_transient() => {
            state.queue.dead_letter(item).await?;
            metrics::counter!("notification_dead_letters_total").increment(1);
            tracing::error!(
                job_id = %job_id,
                kind = e.kind(),
                error = %e,
                "Could not record job as FAILED, notification dead-lettered"
            );
            Ok(())
        }
        Err(e) => {
            state.queue.complete(item).await?;
            tracing::warn!(
                job_id = %job_id,
                kind = e.kind(),
                "Notification dropped after exhausting retries"
            );
            Ok(())
        }
    }
}

/// Idle-time recovery: redrive dead letters, then evaluate the batch gate to
/// pick up scans a failed submission left behind.
async fn sweep(state: &AppState) {
    match state.queue.redrive_dead_letters().await {
        Ok(0) => {}
        Ok(redriven) => tracing::info!(redriven, "Sweep: dead-lettered notifications requeued"),
        Err(e) => tracing::warn!(error = %e, "Sweep: failed to redrive dead letters"),
    }

    match state.completion.gate().evaluate().await {
        Ok(GateOutcome::Outstanding) => {
            tracing::debug!("Sweep: batch still has jobs in progress");
        }
        Ok(GateOutcome::Dispatched(report)) => log_scan_report(&report),
        Err(e) => tracing::warn!(error = %e, "Sweep: batch gate evaluation failed"),
    }
}

fn log_batch(outcome: &CompletionOutcome) {
    match &outcome.batch {
        Ok(GateOutcome::Outstanding) => {
            tracing::info!(job_id = %outcome.record.job_id, "Batch still has jobs in progress");
        }
        Ok(GateOutcome::Dispatched(report)) => log_scan_report(report),
        // Already logged by the handler; the sweep retries it.
        Err(_) => {}
    }
}

fn log_scan_report(report: &ScanReport) {
    if report.submissions.is_empty() && report.failures.is_empty() {
        return;
    }
    tracing::info!(
        submissions = report.submissions.len(),
        scanned_jobs = report.scanned_jobs(),
        failed_buckets = report.failures.len(),
        unscannable = report.unscannable.len(),
        "Classification scan dispatched"
    );
}
