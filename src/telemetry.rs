//! Metric descriptions shared by the server and the worker.

/// Register help text for every metric the pipeline emits.
pub fn describe_metrics() {
    metrics::describe_counter!("ocr_jobs_started_total", "OCR jobs launched");
    metrics::describe_counter!(
        "ocr_jobs_completed_total",
        "OCR jobs moved to a terminal status, by status"
    );
    metrics::describe_counter!(
        "ocr_jobs_abandoned_total",
        "Jobs recorded as FAILED after their notification exhausted its retries, by failure kind"
    );
    metrics::describe_counter!(
        "completion_failures_total",
        "Completion notifications that failed, by failure kind"
    );
    metrics::describe_counter!(
        "notification_retries_total",
        "Completion notifications scheduled for redelivery"
    );
    metrics::describe_counter!(
        "notification_dead_letters_total",
        "Notifications parked because their job could not be recorded as FAILED"
    );
    metrics::describe_histogram!(
        "postprocessing_seconds",
        "Time to relocate OCR output and write its plain-text artifact"
    );
    metrics::describe_counter!("scan_submissions_total", "Classification jobs submitted");
    metrics::describe_counter!(
        "scan_submission_failures_total",
        "Classification submissions that were rejected or unreachable"
    );
    metrics::describe_gauge!(
        "notification_queue_depth",
        "Completion notifications waiting for a worker"
    );
}
