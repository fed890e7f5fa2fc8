use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Optional for worker processes.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string for the notification queue
    pub redis_url: String,

    /// Bucket holding the source images and the OCR output
    pub s3_bucket: String,

    #[serde(default = "default_region")]
    pub s3_region: String,

    /// S3 endpoint URL (e.g., "https://s3.us-east-1.amazonaws.com")
    pub s3_endpoint: String,

    pub s3_access_key: String,

    pub s3_secret_key: String,

    /// Base URL of the OCR service that starts asynchronous text detection jobs
    pub ocr_endpoint: String,

    pub ocr_api_token: String,

    /// Topic the OCR service publishes completion notifications to
    pub ocr_notification_topic: String,

    /// Role the OCR service assumes to publish to the topic
    pub ocr_notification_role: String,

    /// Key prefix the OCR service writes raw output under
    #[serde(default = "default_output_prefix")]
    pub output_prefix: String,

    /// Base URL of the sensitive-data classification service
    pub classification_endpoint: String,

    pub classification_api_token: String,

    /// Account that owns the scanned bucket
    pub account_id: String,

    /// Custom data identifiers attached to every classification job (comma separated)
    #[serde(default)]
    pub custom_data_identifier_ids: String,

    /// Seconds between idle-time batch gate evaluations in the worker
    #[serde(default = "default_sweep_interval")]
    pub scan_sweep_interval_secs: u64,

    /// Deliveries of one notification before its job is recorded as FAILED
    #[serde(default = "default_max_attempts")]
    pub max_notification_attempts: u32,

    /// Delay before the first redelivery; doubles on every further attempt
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_secs: u64,

    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_secs: u64,

    /// Address of the worker's Prometheus scrape listener
    #[serde(default = "default_worker_metrics_addr")]
    pub worker_metrics_addr: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_output_prefix() -> String {
    "textract-output".to_string()
}

fn default_sweep_interval() -> u64 {
    300
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay() -> u64 {
    15
}

fn default_retry_max_delay() -> u64 {
    600
}

fn default_worker_metrics_addr() -> String {
    "0.0.0.0:9091".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Parsed `custom_data_identifier_ids`, blanks dropped.
    pub fn custom_data_identifiers(&self) -> Vec<String> {
        self.custom_data_identifier_ids
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(String::from)
            .collect()
    }
}
