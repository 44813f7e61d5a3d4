use bytes::Bytes;
use std::io;
use tokio::fs;
use tracing::{debug, info};

use super::dto::ChunkInfoResponse;
use super::events::ProcessingJob;
use super::model::{JobId, JobStatus, OutputArtifact, PipelineKind, SessionState, UploadSession};
use super::repository::SessionHandle;
use crate::common::error::{JobError, JobResult};
use crate::state::AppState;

pub struct JobService;

impl JobService {
    // --- UPLOAD SESSION ---

    /// Opens a session with `bytes` as the start of its first clip.
    pub async fn start(state: &AppState, kind: PipelineKind, bytes: &[u8]) -> JobResult<JobId> {
        let id = state.registry.new_sequence(kind).await;
        let path = state
            .store
            .input_path(kind, id, 0, &state.config.video_format_ext);

        state.store.append(&path, bytes).await?;
        state
            .registry
            .insert_session(UploadSession::new(kind, id, path))
            .await;

        info!("Started {} upload {} ({} bytes)", kind, id, bytes.len());
        Ok(id)
    }

    /// Appends to the session's current clip.
    pub async fn add(state: &AppState, kind: PipelineKind, id: JobId, bytes: &[u8]) -> JobResult<JobId> {
        let handle = Self::session(state, kind, id).await?;
        let mut session = handle.lock().await;
        if !session.is_open() {
            return Err(JobError::NotFound(id.to_string()));
        }

        let path = session
            .current_segment()
            .cloned()
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;
        state.store.append(&path, bytes).await?;
        session.touch();

        debug!("Appended {} bytes to {} upload {}", bytes.len(), kind, id);
        Ok(id)
    }

    /// Starts the next clip of a concat session.
    pub async fn new_segment(
        state: &AppState,
        kind: PipelineKind,
        id: JobId,
        bytes: &[u8],
    ) -> JobResult<JobId> {
        if !kind.supports_segments() {
            return Err(JobError::SegmentsUnsupported(kind));
        }

        let handle = Self::session(state, kind, id).await?;
        let mut session = handle.lock().await;
        if !session.is_open() {
            return Err(JobError::NotFound(id.to_string()));
        }

        let path = state.store.input_path(
            kind,
            id,
            session.segments.len(),
            &state.config.video_format_ext,
        );
        state.store.append(&path, bytes).await?;
        session.segments.push(path);
        session.touch();

        info!(
            "Started segment {} of {} upload {}",
            session.segments.len(),
            kind,
            id
        );
        Ok(id)
    }

    /// Appends the last bytes, freezes the session and queues it for
    /// processing. Returns the id the output will be retrievable under.
    pub async fn end(state: &AppState, kind: PipelineKind, id: JobId, bytes: &[u8]) -> JobResult<JobId> {
        let handle = Self::session(state, kind, id).await?;

        let inputs = {
            let mut session = handle.lock().await;
            if !session.is_open() {
                return Err(JobError::NotFound(id.to_string()));
            }
            if let Some(path) = session.current_segment() {
                state.store.append(path, bytes).await?;
            }
            session.state = SessionState::Finalized;
            session.touch();
            session.segments.clone()
        };

        let output_id = state.registry.new_sequence(kind).await;
        let output = state
            .store
            .output_path(kind, output_id, state.config.output_ext(kind));

        state
            .dispatcher
            .submit(ProcessingJob {
                kind,
                source_id: id,
                output_id,
                inputs,
                output,
            })
            .await?;

        info!("Finalized {} upload {} -> output {}", kind, id, output_id);
        Ok(output_id)
    }

    async fn session(state: &AppState, kind: PipelineKind, id: JobId) -> JobResult<SessionHandle> {
        state
            .registry
            .session(kind, id)
            .await
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    // --- RETRIEVAL ---

    pub async fn info(state: &AppState, kind: PipelineKind, id: JobId) -> JobResult<ChunkInfoResponse> {
        let handle = state
            .registry
            .output(kind, id)
            .await
            .ok_or_else(|| JobError::NotReady(id.to_string()))?;
        let artifact = handle.lock().await;
        ensure_ready(&artifact)?;

        let total_bytes = Self::artifact_size(state, &artifact).await?;
        Ok(ChunkInfoResponse::for_size(
            total_bytes,
            state.config.chunk_size_bytes,
        ))
    }

    /// Serves the 1-based chunk `number`. Serving the last chunk deletes the
    /// artifact and forgets the output id.
    pub async fn chunk(state: &AppState, kind: PipelineKind, id: JobId, number: i64) -> JobResult<Bytes> {
        if number < 1 {
            return Err(JobError::InvalidNumber);
        }
        let number = number as u64;

        let handle = state
            .registry
            .output(kind, id)
            .await
            .ok_or_else(|| JobError::NotReady(id.to_string()))?;
        let mut artifact = handle.lock().await;
        ensure_ready(&artifact)?;

        let chunk_size = state.config.chunk_size_bytes;
        let total_bytes = Self::artifact_size(state, &artifact).await?;
        let info = ChunkInfoResponse::for_size(total_bytes, chunk_size);
        if number > info.chunk_count {
            return Err(JobError::OutOfRange);
        }

        let offset = (number - 1) * chunk_size as u64;
        let bytes = state
            .store
            .read_range(&artifact.path, offset, chunk_size)
            .await?;

        if number == info.chunk_count {
            state.store.delete(&artifact.path).await?;
            artifact.mark_consumed();
            drop(artifact);
            state.registry.consume_ready(kind, id).await;
            info!("Delivered final chunk of {} output {}, artifact removed", kind, id);
        }

        Ok(bytes)
    }

    pub async fn status(state: &AppState, kind: PipelineKind, id: JobId) -> JobResult<JobStatus> {
        state
            .registry
            .status(kind, id)
            .await
            .ok_or_else(|| JobError::NotReady(id.to_string()))
    }

    async fn artifact_size(state: &AppState, artifact: &OutputArtifact) -> JobResult<u64> {
        match state.store.size(&artifact.path).await {
            Ok(size) => Ok(size),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(JobError::NotReady(artifact.id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    // --- SINGLE SHOT ---

    /// Extracts a still image from a whole video sent in one request.
    pub async fn thumbnail_now(state: &AppState, video: &[u8]) -> JobResult<Bytes> {
        let workdir = tempfile::tempdir()?;
        let input = workdir
            .path()
            .join(format!("input.{}", state.config.video_format_ext));
        let output = workdir
            .path()
            .join(format!("thumbnail.{}", state.config.image_format_ext));

        fs::write(&input, video).await?;
        state
            .transforms
            .get(PipelineKind::Thumbnail)?
            .run(std::slice::from_ref(&input), &output)
            .await?;

        Ok(Bytes::from(fs::read(&output).await?))
    }
}

fn ensure_ready(artifact: &OutputArtifact) -> JobResult<()> {
    match &artifact.status {
        JobStatus::Done if !artifact.consumed => Ok(()),
        JobStatus::Failed(reason) => Err(JobError::Failed {
            id: artifact.id.to_string(),
            reason: reason.clone(),
        }),
        _ => Err(JobError::NotReady(artifact.id.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::AppConfig;
    use crate::infrastructure::media::transform::{Transform, TransformError, TransformTable};
    use crate::infrastructure::storage::chunk_store::ChunkStore;
    use async_trait::async_trait;
    use futures_util::future::join_all;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Records every input list it sees and writes the inputs joined together.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Vec<Vec<u8>>>>,
    }

    #[async_trait]
    impl Transform for Recorder {
        async fn run(&self, inputs: &[PathBuf], output: &Path) -> Result<(), TransformError> {
            let mut clips = Vec::new();
            for input in inputs {
                clips.push(fs::read(input).await?);
            }
            fs::write(output, clips.concat()).await?;
            self.seen.lock().unwrap().push(clips);
            Ok(())
        }
    }

    struct Fixture {
        _dir: TempDir,
        state: AppState,
        recorder: Arc<Recorder>,
    }

    async fn fixture(chunk_size: usize) -> Fixture {
        let dir = TempDir::new().unwrap();
        let config = AppConfig {
            storage_dir: dir.path().to_path_buf(),
            chunk_size_bytes: chunk_size,
            ..AppConfig::default()
        };
        let store = ChunkStore::new(&config.storage_dir).await.unwrap();
        let recorder = Arc::new(Recorder::default());
        let transforms = PipelineKind::ALL
            .into_iter()
            .fold(TransformTable::new(), |t, kind| {
                t.with(kind, recorder.clone() as Arc<dyn Transform>)
            });

        let state = AppState::new(config, store, transforms);
        for kind in PipelineKind::ALL {
            state.dispatcher.spawn_workers(kind, 1);
        }
        Fixture {
            _dir: dir,
            state,
            recorder,
        }
    }

    async fn wait_ready(state: &AppState, kind: PipelineKind, id: JobId) {
        for _ in 0..500 {
            if state.registry.is_ready(kind, id).await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("output {} never became ready", id);
    }

    #[tokio::test]
    async fn test_upload_reassembles_bytes_in_call_order() {
        let f = fixture(4).await;
        let kind = PipelineKind::Subtitle;

        let id = JobService::start(&f.state, kind, b"ab").await.unwrap();
        JobService::add(&f.state, kind, id, b"cd").await.unwrap();
        JobService::add(&f.state, kind, id, b"").await.unwrap();
        JobService::add(&f.state, kind, id, b"efg").await.unwrap();
        let out = JobService::end(&f.state, kind, id, b"h").await.unwrap();
        assert_ne!(out, id);

        wait_ready(&f.state, kind, out).await;
        let seen = f.recorder.seen.lock().unwrap().clone();
        assert_eq!(seen, vec![vec![b"abcdefgh".to_vec()]]);
    }

    #[tokio::test]
    async fn test_concat_segments_keep_boundaries_and_order() {
        let f = fixture(4).await;
        let kind = PipelineKind::Concat;

        let id = JobService::start(&f.state, kind, b"").await.unwrap();
        JobService::add(&f.state, kind, id, &[1u8; 5]).await.unwrap();
        JobService::new_segment(&f.state, kind, id, b"").await.unwrap();
        JobService::add(&f.state, kind, id, &[2u8; 7]).await.unwrap();
        let out = JobService::end(&f.state, kind, id, b"").await.unwrap();

        wait_ready(&f.state, kind, out).await;
        let seen = f.recorder.seen.lock().unwrap().clone();
        let lengths: Vec<usize> = seen[0].iter().map(Vec::len).collect();
        assert_eq!(lengths, vec![5, 7]);
        assert_eq!(seen[0][0], vec![1u8; 5]);
        assert_eq!(seen[0][1], vec![2u8; 7]);
    }

    #[tokio::test]
    async fn test_segments_rejected_for_single_clip_kinds() {
        let f = fixture(4).await;
        let id = JobService::start(&f.state, PipelineKind::Subtitle, b"x")
            .await
            .unwrap();
        assert!(matches!(
            JobService::new_segment(&f.state, PipelineKind::Subtitle, id, b"").await,
            Err(JobError::SegmentsUnsupported(PipelineKind::Subtitle))
        ));
    }

    #[tokio::test]
    async fn test_unknown_and_finalized_ids_are_not_found() {
        let f = fixture(4).await;
        let kind = PipelineKind::Concat;
        let unknown = JobId::random();

        assert!(matches!(
            JobService::add(&f.state, kind, unknown, b"x").await,
            Err(JobError::NotFound(_))
        ));
        assert!(matches!(
            JobService::new_segment(&f.state, kind, unknown, b"x").await,
            Err(JobError::NotFound(_))
        ));
        assert!(matches!(
            JobService::end(&f.state, kind, unknown, b"x").await,
            Err(JobError::NotFound(_))
        ));

        let id = JobService::start(&f.state, kind, b"x").await.unwrap();
        JobService::end(&f.state, kind, id, b"").await.unwrap();
        assert!(matches!(
            JobService::add(&f.state, kind, id, b"late").await,
            Err(JobError::NotFound(_))
        ));
        assert!(matches!(
            JobService::end(&f.state, kind, id, b"").await,
            Err(JobError::NotFound(_))
        ));
        // Ids are namespaced by kind.
        assert!(matches!(
            JobService::add(&f.state, PipelineKind::Subtitle, id, b"x").await,
            Err(JobError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_adds_never_lose_bytes() {
        let f = fixture(4).await;
        let kind = PipelineKind::Subtitle;
        let id = JobService::start(&f.state, kind, b"").await.unwrap();

        let chunks: Vec<Vec<u8>> = (1..=40u8).map(|i| vec![i; i as usize * 3]).collect();
        let expected: usize = chunks.iter().map(Vec::len).sum();

        join_all(chunks.iter().map(|c| {
            let state = f.state.clone();
            let c = c.clone();
            tokio::spawn(async move { JobService::add(&state, kind, id, &c).await })
        }))
        .await
        .into_iter()
        .for_each(|r| {
            r.unwrap().unwrap();
        });

        let out = JobService::end(&f.state, kind, id, b"").await.unwrap();
        wait_ready(&f.state, kind, out).await;

        let seen = f.recorder.seen.lock().unwrap().clone();
        let data = &seen[0][0];
        assert_eq!(data.len(), expected);
        // Each add lands contiguously.
        let mut runs = Vec::new();
        for byte in data {
            if runs.last() != Some(byte) {
                runs.push(*byte);
            }
        }
        assert_eq!(runs.len(), chunks.len());
    }

    #[tokio::test]
    async fn test_chunks_reproduce_output_then_artifact_is_gone() {
        let f = fixture(4).await;
        let kind = PipelineKind::Concat;

        let id = JobService::start(&f.state, kind, b"0123456789").await.unwrap();
        let out = JobService::end(&f.state, kind, id, b"").await.unwrap();
        wait_ready(&f.state, kind, out).await;

        let info = JobService::info(&f.state, kind, out).await.unwrap();
        assert_eq!(info, ChunkInfoResponse { chunk_count: 3, total_bytes: 10 });

        assert!(matches!(
            JobService::chunk(&f.state, kind, out, 0).await,
            Err(JobError::InvalidNumber)
        ));
        assert!(matches!(
            JobService::chunk(&f.state, kind, out, 4).await,
            Err(JobError::OutOfRange)
        ));

        let mut assembled = Vec::new();
        for n in 1..=3 {
            let chunk = JobService::chunk(&f.state, kind, out, n).await.unwrap();
            if n < 3 {
                assert_eq!(chunk.len(), 4);
            }
            assembled.extend_from_slice(&chunk);
        }
        assert_eq!(assembled, b"0123456789");

        let path = f.state.store.output_path(kind, out, "webm");
        assert!(!f.state.store.exists(&path).await);
        assert!(matches!(
            JobService::info(&f.state, kind, out).await,
            Err(JobError::NotReady(_))
        ));
        assert!(matches!(
            JobService::chunk(&f.state, kind, out, 3).await,
            Err(JobError::NotReady(_))
        ));
    }

    #[tokio::test]
    async fn test_never_started_and_still_running_look_the_same() {
        let f = fixture(4).await;
        let kind = PipelineKind::Thumbnail;
        let never = JobService::info(&f.state, kind, JobId::random()).await;

        let queued = f.state.registry.new_sequence(kind).await;
        f.state
            .registry
            .track_output(kind, queued, PathBuf::from("pending"))
            .await;
        let running = JobService::info(&f.state, kind, queued).await;

        let (Err(JobError::NotReady(_)), Err(JobError::NotReady(_))) = (never, running) else {
            panic!("both should be NotReady");
        };
    }

    #[tokio::test]
    async fn test_failed_job_surfaces_through_info() {
        let f = fixture(4).await;
        let kind = PipelineKind::Subtitle;
        let id = f.state.registry.new_sequence(kind).await;
        f.state
            .registry
            .track_output(kind, id, PathBuf::from("never-written"))
            .await;
        f.state
            .registry
            .set_status(kind, id, JobStatus::Failed("no audio stream".into()))
            .await;

        match JobService::info(&f.state, kind, id).await {
            Err(JobError::Failed { reason, .. }) => assert_eq!(reason, "no audio stream"),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
        assert_eq!(
            JobService::status(&f.state, kind, id).await.unwrap(),
            JobStatus::Failed("no audio stream".into())
        );
    }

    #[tokio::test]
    async fn test_thumbnail_now_runs_thumbnail_transform() {
        let f = fixture(4).await;
        let image = JobService::thumbnail_now(&f.state, b"full video").await.unwrap();
        assert_eq!(&image[..], b"full video");
    }
}
