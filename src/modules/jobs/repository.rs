use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::model::{JobId, JobStatus, OutputArtifact, PipelineKind, UploadSession};

pub type SessionHandle = Arc<Mutex<UploadSession>>;
pub type OutputHandle = Arc<Mutex<OutputArtifact>>;

#[derive(Default)]
struct Namespace {
    issued: HashSet<JobId>,
    sessions: HashMap<JobId, SessionHandle>,
    outputs: HashMap<JobId, OutputHandle>,
}

/// Process-lifetime index of upload sessions and outputs.
///
/// Each pipeline kind is guarded by its own lock, held only long enough to
/// look an entry up. Entries carry their own async mutex, which is what
/// serialises appends and reads on a single job while other jobs proceed.
#[derive(Clone)]
pub struct JobRegistry {
    namespaces: Arc<HashMap<PipelineKind, Mutex<Namespace>>>,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        let namespaces = PipelineKind::ALL
            .into_iter()
            .map(|kind| (kind, Mutex::new(Namespace::default())))
            .collect();

        Self {
            namespaces: Arc::new(namespaces),
        }
    }

    fn namespace(&self, kind: PipelineKind) -> &Mutex<Namespace> {
        // Every kind is inserted in `new`.
        &self.namespaces[&kind]
    }

    /// Allocates an id never handed out before for this kind.
    pub async fn new_sequence(&self, kind: PipelineKind) -> JobId {
        let mut ns = self.namespace(kind).lock().await;
        loop {
            let id = JobId::random();
            if ns.issued.insert(id) {
                return id;
            }
        }
    }

    pub async fn exists(&self, kind: PipelineKind, id: JobId) -> bool {
        let ns = self.namespace(kind).lock().await;
        ns.sessions.contains_key(&id) || ns.outputs.contains_key(&id)
    }

    pub async fn insert_session(&self, session: UploadSession) -> SessionHandle {
        let kind = session.kind;
        let id = session.id;
        let handle = Arc::new(Mutex::new(session));

        let mut ns = self.namespace(kind).lock().await;
        ns.issued.insert(id);
        ns.sessions.insert(id, handle.clone());
        handle
    }

    pub async fn session(&self, kind: PipelineKind, id: JobId) -> Option<SessionHandle> {
        self.namespace(kind).lock().await.sessions.get(&id).cloned()
    }

    pub async fn remove_session(&self, kind: PipelineKind, id: JobId) -> Option<SessionHandle> {
        self.namespace(kind).lock().await.sessions.remove(&id)
    }

    pub async fn sessions(&self, kind: PipelineKind) -> Vec<(JobId, SessionHandle)> {
        let ns = self.namespace(kind).lock().await;
        ns.sessions.iter().map(|(id, h)| (*id, h.clone())).collect()
    }

    /// Starts tracking an output in the `queued` state.
    pub async fn track_output(&self, kind: PipelineKind, id: JobId, path: PathBuf) -> OutputHandle {
        let handle = Arc::new(Mutex::new(OutputArtifact::queued(kind, id, path)));

        let mut ns = self.namespace(kind).lock().await;
        ns.issued.insert(id);
        ns.outputs.insert(id, handle.clone());
        handle
    }

    pub async fn output(&self, kind: PipelineKind, id: JobId) -> Option<OutputHandle> {
        self.namespace(kind).lock().await.outputs.get(&id).cloned()
    }

    pub async fn outputs(&self, kind: PipelineKind) -> Vec<(JobId, OutputHandle)> {
        let ns = self.namespace(kind).lock().await;
        ns.outputs.iter().map(|(id, h)| (*id, h.clone())).collect()
    }

    pub async fn set_status(&self, kind: PipelineKind, id: JobId, status: JobStatus) -> bool {
        match self.output(kind, id).await {
            Some(handle) => {
                handle.lock().await.set_status(status);
                true
            }
            None => false,
        }
    }

    pub async fn mark_ready(&self, kind: PipelineKind, id: JobId) -> bool {
        self.set_status(kind, id, JobStatus::Done).await
    }

    pub async fn is_ready(&self, kind: PipelineKind, id: JobId) -> bool {
        match self.output(kind, id).await {
            Some(handle) => handle.lock().await.is_ready(),
            None => false,
        }
    }

    pub async fn status(&self, kind: PipelineKind, id: JobId) -> Option<JobStatus> {
        match self.output(kind, id).await {
            Some(handle) => Some(handle.lock().await.status.clone()),
            None => None,
        }
    }

    /// Drops the output entry. Called once its final chunk has been served.
    pub async fn consume_ready(&self, kind: PipelineKind, id: JobId) -> bool {
        self.namespace(kind)
            .lock()
            .await
            .outputs
            .remove(&id)
            .is_some()
    }
}
