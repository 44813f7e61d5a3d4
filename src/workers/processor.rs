use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::common::error::{JobError, JobResult};
use crate::infrastructure::media::transform::{TransformError, TransformTable};
use crate::infrastructure::queue::job_queue::JobQueue;
use crate::infrastructure::storage::chunk_store::ChunkStore;
use crate::modules::jobs::events::ProcessingJob;
use crate::modules::jobs::model::{JobStatus, PipelineKind};
use crate::modules::jobs::repository::JobRegistry;

/// Hands finalized uploads to a fixed pool of workers per pipeline kind and
/// publishes what they produce into the registry.
#[derive(Clone)]
pub struct Dispatcher {
    queue: JobQueue,
    registry: JobRegistry,
    store: ChunkStore,
    transforms: TransformTable,
}

impl Dispatcher {
    pub fn new(
        queue: JobQueue,
        registry: JobRegistry,
        store: ChunkStore,
        transforms: TransformTable,
    ) -> Self {
        Self {
            queue,
            registry,
            store,
            transforms,
        }
    }

    /// Registers the output as queued and enqueues the job. Waits while the
    /// kind's queue is full.
    pub async fn submit(&self, job: ProcessingJob) -> JobResult<()> {
        let (kind, output_id) = (job.kind, job.output_id);
        self.registry
            .track_output(kind, output_id, job.output.clone())
            .await;

        if let Err(e) = self.queue.publish(job).await {
            self.registry
                .set_status(kind, output_id, JobStatus::Failed(e.to_string()))
                .await;
            return Err(JobError::Queue(e.to_string()));
        }

        info!(
            "📦 Queued {} job {} ({} pending)",
            kind,
            output_id,
            self.queue.pending(kind)
        );
        Ok(())
    }

    pub fn spawn_workers(&self, kind: PipelineKind, count: usize) -> Vec<JoinHandle<()>> {
        (0..count.max(1))
            .map(|worker| tokio::spawn(self.clone().run_worker(kind, worker)))
            .collect()
    }

    /// Workers finish what is queued, then exit.
    pub fn close(&self) {
        self.queue.close();
    }

    async fn run_worker(self, kind: PipelineKind, worker: usize) {
        let consumer = self.queue.consumer(kind);
        info!("🎥 {} worker {} listening", kind, worker);

        while let Ok(job) = consumer.recv().await {
            self.process(job).await;
        }

        info!("{} worker {} stopped", kind, worker);
    }

    async fn process(&self, job: ProcessingJob) {
        let (kind, output_id) = (job.kind, job.output_id);
        info!(
            "Processing {} job {} from upload {} ({} input(s))",
            kind,
            output_id,
            job.source_id,
            job.inputs.len()
        );
        self.registry
            .set_status(kind, output_id, JobStatus::Running)
            .await;

        match self.transform(&job).await {
            Ok(()) => {
                self.registry.mark_ready(kind, output_id).await;
                info!("✅ {} job {} completed", kind, output_id);
            }
            Err(e) => {
                error!("❌ {} job {} failed: {}", kind, output_id, e);
                self.registry
                    .set_status(kind, output_id, JobStatus::Failed(e.to_string()))
                    .await;
                if let Err(e) = self.store.delete(&job.output).await {
                    warn!("Failed to remove partial output {}: {}", job.output.display(), e);
                }
            }
        }

        for input in &job.inputs {
            if let Err(e) = self.store.delete(input).await {
                warn!("Failed to remove input {}: {}", input.display(), e);
            }
        }
    }

    /// Runs the transform on its own task so a panic fails the job rather
    /// than the worker.
    async fn transform(&self, job: &ProcessingJob) -> Result<(), TransformError> {
        let transform = self.transforms.get(job.kind)?;
        let inputs = job.inputs.clone();
        let output = job.output.clone();

        match tokio::spawn(async move { transform.run(&inputs, &output).await }).await {
            Ok(result) => result,
            Err(e) => Err(TransformError::Io(std::io::Error::other(format!(
                "transform task aborted: {}",
                e
            )))),
        }
    }
}
