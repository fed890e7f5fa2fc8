//! In-memory collaborators for exercising the pipeline without external services.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ocr_scan_pipeline::db::{JobRecordStore, StoreError};
use ocr_scan_pipeline::models::job::{JobRecord, JobStatus};
use ocr_scan_pipeline::services::classification::{
    ClassificationError, ClassificationRequest, Classifier,
};
use ocr_scan_pipeline::services::completion::CompletionHandler;
use ocr_scan_pipeline::services::gate::BatchGate;
use ocr_scan_pipeline::services::keys::KeyLayout;
use ocr_scan_pipeline::services::launch::BatchLauncher;
use ocr_scan_pipeline::services::ocr::{OcrError, OcrJobRequest, OcrLauncher};
use ocr_scan_pipeline::services::postprocess::PostProcessor;
use ocr_scan_pipeline::services::scan::ScanDispatcher;
use ocr_scan_pipeline::services::storage::{ObjectStore, StorageError};

pub const BUCKET: &str = "sensitive-data";
pub const ACCOUNT_ID: &str = "123456789012";

fn unavailable() -> StoreError {
    StoreError::Unavailable(sqlx::Error::PoolTimedOut)
}

/// Job table keyed by (status, job id), guarded by one lock so a transition
/// is observed all-or-nothing.
#[derive(Default)]
pub struct MemoryJobStore {
    records: Mutex<BTreeMap<(String, String), JobRecord>>,
    pub fail_outstanding_check: AtomicBool,
    pub fail_transition: AtomicBool,
    pub fail_mark_scanned: AtomicBool,
}

impl MemoryJobStore {
    pub fn records(&self) -> Vec<JobRecord> {
        self.records.lock().unwrap().values().cloned().collect()
    }

    pub fn records_for(&self, job_id: &str) -> Vec<JobRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.job_id == job_id)
            .collect()
    }

    pub fn single(&self, job_id: &str) -> JobRecord {
        let mut records = self.records_for(job_id);
        assert_eq!(records.len(), 1, "expected exactly one record for {}", job_id);
        records.remove(0)
    }

    /// Seed a terminal record directly.
    pub fn insert(&self, record: JobRecord) {
        self.records
            .lock()
            .unwrap()
            .insert((record.status.to_string(), record.job_id.clone()), record);
    }
}

#[async_trait]
impl JobRecordStore for MemoryJobStore {
    async fn create(
        &self,
        job_id: &str,
        bucket: &str,
        object_key: &str,
        start_timestamp: DateTime<Utc>,
    ) -> Result<JobRecord, StoreError> {
        let mut records = self.records.lock().unwrap();
        if records.keys().any(|(_, id)| id == job_id) {
            return Err(StoreError::DuplicateKey(job_id.to_string()));
        }
        let record = JobRecord::in_progress(job_id, bucket, object_key, start_timestamp);
        records.insert(
            (JobStatus::InProgress.to_string(), job_id.to_string()),
            record.clone(),
        );
        Ok(record)
    }

    async fn find_in_progress(&self, job_id: &str) -> Result<Option<JobRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(&(JobStatus::InProgress.to_string(), job_id.to_string()))
            .cloned())
    }

    async fn find(&self, job_id: &str) -> Result<Option<JobRecord>, StoreError> {
        Ok(self.records_for(job_id).into_iter().next())
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
        if self.fail_transition.load(Ordering::SeqCst) {
            return Err(unavailable());
        }

        let mut records = self.records.lock().unwrap();
        let existing = records
            .remove(&(JobStatus::InProgress.to_string(), job_id.to_string()))
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;

        let record = JobRecord {
            job_id: job_id.to_string(),
            status,
            bucket: bucket.to_string(),
            object_key: object_key.to_string(),
            start_timestamp: existing.start_timestamp,
            complete_timestamp: Some(complete_timestamp),
            scanned: false,
        };
        records.insert((status.to_string(), job_id.to_string()), record.clone());
        Ok(record)
    }

    async fn has_outstanding(&self) -> Result<bool, StoreError> {
        if self.fail_outstanding_check.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .any(|r| r.status == JobStatus::InProgress))
    }

    async fn list_unscanned_succeeded(&self) -> Result<Vec<JobRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.status == JobStatus::Succeeded && !r.scanned)
            .cloned()
            .collect())
    }

    async fn mark_scanned(&self, job_id: &str) -> Result<(), StoreError> {
        if self.fail_mark_scanned.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(&(JobStatus::Succeeded.to_string(), job_id.to_string()))
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;
        record.scanned = true;
        Ok(())
    }
}

/// Object store backed by a map of (bucket, key) to bytes.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    pub fail_puts: AtomicBool,
}

impl MemoryObjectStore {
    pub fn insert(&self, bucket: &str, key: &str, data: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), data.to_vec());
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn text(&self, bucket: &str, key: &str) -> Option<String> {
        self.object(bucket, key)
            .map(|bytes| String::from_utf8(bytes).expect("utf-8 object"))
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.object(bucket, key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        _content_type: &str,
    ) -> Result<(), StorageError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StorageError::Status {
                key: key.to_string(),
                code: 503,
            });
        }
        self.insert(bucket, key, data);
        Ok(())
    }

    async fn copy(&self, bucket: &str, from: &str, to: &str) -> Result<(), StorageError> {
        let data = self.get(bucket, from).await?;
        self.insert(bucket, to, &data);
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        self.objects
            .lock()
            .unwrap()
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        Ok(self.object(bucket, key).is_some())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys: Vec<String> = self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|(b, k)| b == bucket && k.starts_with(prefix))
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}

/// Records every classification request; can be switched to reject them.
#[derive(Default)]
pub struct RecordingClassifier {
    requests: Mutex<Vec<ClassificationRequest>>,
    pub reject: AtomicBool,
}

impl RecordingClassifier {
    pub fn requests(&self) -> Vec<ClassificationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Classifier for RecordingClassifier {
    async fn submit_job(
        &self,
        request: &ClassificationRequest,
    ) -> Result<String, ClassificationError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(ClassificationError::Rejected {
                status: 503,
                detail: "service unavailable".to_string(),
            });
        }
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        Ok(format!("scan-{}", requests.len()))
    }
}

/// OCR launcher handing out sequential job ids.
#[derive(Default)]
pub struct StubOcr {
    started: AtomicUsize,
    pub reject_keys: Mutex<Vec<String>>,
}

impl StubOcr {
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OcrLauncher for StubOcr {
    async fn start_job(&self, request: OcrJobRequest<'_>) -> Result<String, OcrError> {
        if self
            .reject_keys
            .lock()
            .unwrap()
            .iter()
            .any(|k| k == request.object_key)
        {
            return Err(OcrError::Rejected {
                status: 400,
                detail: format!("unsupported document {}", request.object_key),
            });
        }
        let n = self.started.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("job-{}", n))
    }
}

/// Every component wired against in-memory collaborators.
pub struct TestPipeline {
    pub store: Arc<MemoryJobStore>,
    pub storage: Arc<MemoryObjectStore>,
    pub classifier: Arc<RecordingClassifier>,
    pub ocr: Arc<StubOcr>,
    pub layout: KeyLayout,
    pub handler: CompletionHandler,
    pub launcher: BatchLauncher,
}

impl TestPipeline {
    pub fn new() -> Self {
        let store = Arc::new(MemoryJobStore::default());
        let storage = Arc::new(MemoryObjectStore::default());
        let classifier = Arc::new(RecordingClassifier::default());
        let ocr = Arc::new(StubOcr::default());
        let layout = KeyLayout::default();

        let handler = CompletionHandler::new(
            store.clone(),
            PostProcessor::new(storage.clone(), layout.clone()),
            BatchGate::new(store.clone(), Self::dispatcher_for(&store, &classifier, &layout)),
        );
        let launcher = BatchLauncher::new(storage.clone(), ocr.clone(), store.clone(), layout.clone());

        Self {
            store,
            storage,
            classifier,
            ocr,
            layout,
            handler,
            launcher,
        }
    }

    fn dispatcher_for(
        store: &Arc<MemoryJobStore>,
        classifier: &Arc<RecordingClassifier>,
        layout: &KeyLayout,
    ) -> ScanDispatcher {
        ScanDispatcher::new(store.clone(), classifier.clone(), layout.clone(), ACCOUNT_ID)
    }

    /// A standalone dispatcher over the same store and classifier.
    pub fn dispatcher(&self) -> ScanDispatcher {
        Self::dispatcher_for(&self.store, &self.classifier, &self.layout)
    }

    /// Register an in-progress job whose OCR output is already in storage.
    pub async fn seed_job(&self, job_id: &str, object_key: &str, output: &[u8]) {
        self.store
            .create(job_id, BUCKET, object_key, Utc::now())
            .await
            .expect("seed job");
        self.storage
            .insert(BUCKET, &format!("{}/{}/1", self.layout.output_prefix(), job_id), output);
    }
}
