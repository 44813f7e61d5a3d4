use async_channel::{Receiver, Sender};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::modules::jobs::events::ProcessingJob;
use crate::modules::jobs::model::PipelineKind;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue for '{0}' is closed")]
    Closed(PipelineKind),
}

struct Lane {
    tx: Sender<ProcessingJob>,
    rx: Receiver<ProcessingJob>,
}

/// One bounded in-process queue per pipeline kind. Publishing waits while a
/// lane is full, which is the back-pressure the upload path relies on.
#[derive(Clone)]
pub struct JobQueue {
    lanes: Arc<HashMap<PipelineKind, Lane>>,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        let lanes = PipelineKind::ALL
            .into_iter()
            .map(|kind| {
                let (tx, rx) = async_channel::bounded(capacity.max(1));
                (kind, Lane { tx, rx })
            })
            .collect();

        info!("Job queues created (capacity {} per kind)", capacity.max(1));
        Self {
            lanes: Arc::new(lanes),
        }
    }

    fn lane(&self, kind: PipelineKind) -> &Lane {
        &self.lanes[&kind]
    }

    pub async fn publish(&self, job: ProcessingJob) -> Result<(), QueueError> {
        let kind = job.kind;
        let lane = self.lane(kind);

        if lane.tx.is_full() {
            debug!("Queue '{}' is full, waiting for a free slot", kind);
        }

        lane.tx.send(job).await.map_err(|_| QueueError::Closed(kind))
    }

    pub fn consumer(&self, kind: PipelineKind) -> Receiver<ProcessingJob> {
        self.lane(kind).rx.clone()
    }

    pub fn pending(&self, kind: PipelineKind) -> usize {
        self.lane(kind).tx.len()
    }

    /// Stops accepting work. Workers drain what is already queued and exit.
    pub fn close(&self) {
        for lane in self.lanes.values() {
            lane.tx.close();
        }
    }
}
