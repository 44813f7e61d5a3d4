use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::infrastructure::storage::chunk_store::ChunkStore;
use crate::modules::jobs::model::{JobStatus, PipelineKind, SessionState};
use crate::modules::jobs::repository::JobRegistry;
use crate::state::AppState;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub sessions: usize,
    pub outputs: usize,
}

/// Periodically drops abandoned upload sessions and outputs nobody fetched.
pub async fn start_reaper(state: AppState) {
    let Some(ttl) = state.config.session_ttl() else {
        info!("Reaper disabled");
        return;
    };

    let mut ticker = time::interval(Duration::from_secs(state.config.reaper_interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!("🧹 Reaper running every {:?} (ttl {:?})", ticker.period(), ttl);

    loop {
        ticker.tick().await;
        let report = sweep(&state.registry, &state.store, Instant::now(), ttl).await;
        if report.sessions > 0 || report.outputs > 0 {
            info!(
                "🧹 Reaped {} session(s) and {} output(s)",
                report.sessions, report.outputs
            );
        } else {
            debug!("Reaper found nothing to remove");
        }
    }
}

/// Removes every entry idle for at least `ttl` as of `now`. Queued and
/// running outputs are left alone; their worker still owns them.
pub async fn sweep(registry: &JobRegistry, store: &ChunkStore, now: Instant, ttl: Duration) -> SweepReport {
    let mut report = SweepReport::default();

    for kind in PipelineKind::ALL {
        for (id, handle) in registry.sessions(kind).await {
            let mut session = handle.lock().await;
            if now.saturating_duration_since(session.last_activity) < ttl {
                continue;
            }
            // Finalized sessions no longer own their files. An open one is
            // closed first so callers still holding its handle are refused.
            if session.is_open() {
                session.state = SessionState::Finalized;
                for segment in &session.segments {
                    if let Err(e) = store.delete(segment).await {
                        warn!("Failed to remove abandoned upload {}: {}", segment.display(), e);
                    }
                }
            }
            drop(session);
            registry.remove_session(kind, id).await;
            report.sessions += 1;
        }

        for (id, handle) in registry.outputs(kind).await {
            let artifact = handle.lock().await;
            let settled = matches!(artifact.status, JobStatus::Done | JobStatus::Failed(_));
            if !settled || now.saturating_duration_since(artifact.updated_at) < ttl {
                continue;
            }
            if let Err(e) = store.delete(&artifact.path).await {
                warn!("Failed to remove unclaimed output {}: {}", artifact.path.display(), e);
            }
            drop(artifact);
            registry.consume_ready(kind, id).await;
            report.outputs += 1;
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::JobError;
    use crate::config::settings::AppConfig;
    use crate::infrastructure::media::transform::TransformTable;
    use crate::modules::jobs::model::UploadSession;
    use crate::modules::jobs::service::JobService;
    use tempfile::TempDir;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_sweep_removes_only_expired_entries() {
        let dir = TempDir::new().unwrap();
        let store = ChunkStore::new(dir.path()).await.unwrap();
        let registry = JobRegistry::new();

        let kind = PipelineKind::Concat;
        let open = registry.new_sequence(kind).await;
        let partial = store.input_path(kind, open, 0, "webm");
        store.append(&partial, b"half a clip").await.unwrap();
        registry
            .insert_session(UploadSession::new(kind, open, partial.clone()))
            .await;

        let done = registry.new_sequence(kind).await;
        let artifact = store.output_path(kind, done, "webm");
        store.append(&artifact, b"result").await.unwrap();
        registry.track_output(kind, done, artifact.clone()).await;
        registry.mark_ready(kind, done).await;

        let running = registry.new_sequence(kind).await;
        registry
            .track_output(kind, running, store.output_path(kind, running, "webm"))
            .await;
        registry.set_status(kind, running, JobStatus::Running).await;

        let fresh = sweep(&registry, &store, Instant::now(), TTL).await;
        assert_eq!(fresh, SweepReport::default());

        let later = Instant::now() + TTL * 2;
        let report = sweep(&registry, &store, later, TTL).await;
        assert_eq!(report, SweepReport { sessions: 1, outputs: 1 });

        assert!(registry.session(kind, open).await.is_none());
        assert!(!store.exists(&partial).await);
        assert!(!registry.is_ready(kind, done).await);
        assert!(!store.exists(&artifact).await);
        assert_eq!(registry.status(kind, running).await, Some(JobStatus::Running));
    }

    #[tokio::test]
    async fn test_expired_session_refuses_late_appends() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig {
            storage_dir: dir.path().to_path_buf(),
            ..AppConfig::default()
        };
        let store = ChunkStore::new(&config.storage_dir).await.unwrap();
        let state = AppState::new(config, store, TransformTable::new());

        let kind = PipelineKind::Subtitle;
        let id = JobService::start(&state, kind, b"first").await.unwrap();
        let handle = state.registry.session(kind, id).await.unwrap();
        let partial = handle.lock().await.current_segment().cloned().unwrap();

        let later = Instant::now() + TTL * 2;
        let report = sweep(&state.registry, &state.store, later, TTL).await;
        assert_eq!(report.sessions, 1);

        // A request that looked the session up before the sweep.
        assert!(!handle.lock().await.is_open());

        let late = JobService::add(&state, kind, id, b"second").await;
        assert!(matches!(late, Err(JobError::NotFound(_))));
        let late = JobService::end(&state, kind, id, b"").await;
        assert!(matches!(late, Err(JobError::NotFound(_))));
        assert!(!state.store.exists(&partial).await);
    }
}
