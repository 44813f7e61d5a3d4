use bytes::Bytes;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info};

use crate::modules::jobs::model::{JobId, PipelineKind};

/// Append-only file sink rooted at one directory. Files are named after the
/// pipeline tag and the job id, so kinds never collide on disk.
#[derive(Clone, Debug)]
pub struct ChunkStore {
    root: PathBuf,
}

impl ChunkStore {
    pub async fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;

        info!("✅ Chunk store ready at {}", root.display());

        Ok(Self { root })
    }

    /// Path of the `segment`-th input clip of an upload session.
    pub fn input_path(&self, kind: PipelineKind, id: JobId, segment: usize, ext: &str) -> PathBuf {
        self.root
            .join(format!("{}_{}_in{}.{}", kind.tag(), id, segment, ext))
    }

    /// Path the finished artifact of an output id is written to.
    pub fn output_path(&self, kind: PipelineKind, id: JobId, ext: &str) -> PathBuf {
        self.root.join(format!("{}_{}.{}", kind.tag(), id, ext))
    }

    /// Opens or creates `path` and appends `bytes`. Callers serialise appends
    /// per job.
    pub async fn append(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;

        file.write_all(bytes).await?;
        file.flush().await?;

        debug!("Appended {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    /// Reads at most `max_bytes` from `offset`. Short reads at end of file are
    /// not an error.
    pub async fn read_range(&self, path: &Path, offset: u64, max_bytes: usize) -> io::Result<Bytes> {
        let mut file = fs::File::open(path).await?;
        file.seek(SeekFrom::Start(offset)).await?;

        let mut buffer = Vec::with_capacity(max_bytes);
        file.take(max_bytes as u64).read_to_end(&mut buffer).await?;

        Ok(Bytes::from(buffer))
    }

    pub async fn size(&self, path: &Path) -> io::Result<u64> {
        Ok(fs::metadata(path).await?.len())
    }

    pub async fn exists(&self, path: &Path) -> bool {
        fs::try_exists(path).await.unwrap_or(false)
    }

    /// Removes `path`. Returns `Ok(false)` when it was already gone.
    pub async fn delete(&self, path: &Path) -> io::Result<bool> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}
