use crate::config::settings::AppConfig;
use crate::infrastructure::media::transform::TransformTable;
use crate::infrastructure::queue::job_queue::JobQueue;
use crate::infrastructure::storage::chunk_store::ChunkStore;
use crate::modules::jobs::repository::JobRegistry;
use crate::workers::processor::Dispatcher;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub registry: JobRegistry,
    pub store: ChunkStore,
    pub transforms: TransformTable,
    pub dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(config: AppConfig, store: ChunkStore, transforms: TransformTable) -> Self {
        let registry = JobRegistry::new();
        let queue = JobQueue::new(config.queue_capacity);
        let dispatcher = Dispatcher::new(
            queue,
            registry.clone(),
            store.clone(),
            transforms.clone(),
        );

        Self {
            config,
            registry,
            store,
            transforms,
            dispatcher,
        }
    }
}
