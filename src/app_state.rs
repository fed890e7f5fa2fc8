use sqlx::PgPool;
use std::sync::Arc;

use crate::db::{queries::PgJobStore, JobRecordStore};
use crate::services::{
    classification::Classifier,
    completion::CompletionHandler,
    gate::BatchGate,
    keys::KeyLayout,
    launch::BatchLauncher,
    ocr::OcrLauncher,
    postprocess::PostProcessor,
    queue::NotificationQueue,
    scan::ScanDispatcher,
    storage::ObjectStore,
};

/// Pipeline settings taken from the process configuration.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub bucket: String,
    pub output_prefix: String,
    pub account_id: String,
}

/// Shared state passed to route handlers and the worker loop.
///
/// Collaborator clients are built once per process; no behavioral state is
/// carried between notifications.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub store: Arc<dyn JobRecordStore>,
    pub queue: Arc<NotificationQueue>,
    pub launcher: Arc<BatchLauncher>,
    pub completion: Arc<CompletionHandler>,
    pub settings: Arc<PipelineSettings>,
}

impl AppState {
    pub fn new(
        db: PgPool,
        storage: Arc<dyn ObjectStore>,
        queue: NotificationQueue,
        ocr: Arc<dyn OcrLauncher>,
        classifier: Arc<dyn Classifier>,
        settings: PipelineSettings,
    ) -> Self {
        let store: Arc<dyn JobRecordStore> = Arc::new(PgJobStore::new(db.clone()));
        let layout = KeyLayout::new(settings.output_prefix.clone());

        let dispatcher = ScanDispatcher::new(
            store.clone(),
            classifier,
            layout.clone(),
            settings.account_id.clone(),
        );
        let gate = BatchGate::new(store.clone(), dispatcher);
        let post_processor = PostProcessor::new(storage.clone(), layout.clone());
        let completion = CompletionHandler::new(store.clone(), post_processor, gate);
        let launcher = BatchLauncher::new(storage, ocr, store.clone(), layout);

        Self {
            db,
            store,
            queue: Arc::new(queue),
            launcher: Arc::new(launcher),
            completion: Arc::new(completion),
            settings: Arc::new(settings),
        }
    }
}
