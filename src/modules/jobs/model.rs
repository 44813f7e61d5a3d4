use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tokio::time::Instant;
use utoipa::ToSchema;
use uuid::Uuid;

/// The closed set of processing pipelines. Each kind owns its own id
/// namespace and its own on-disk tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum PipelineKind {
    #[serde(rename = "subtitles")]
    Subtitle,
    #[serde(rename = "concat")]
    Concat,
    #[serde(rename = "thumbnails")]
    Thumbnail,
}

impl PipelineKind {
    pub const ALL: [PipelineKind; 3] = [
        PipelineKind::Subtitle,
        PipelineKind::Concat,
        PipelineKind::Thumbnail,
    ];

    /// Short prefix used for file names in the chunk store.
    pub fn tag(&self) -> &'static str {
        match self {
            PipelineKind::Subtitle => "sub",
            PipelineKind::Concat => "cat",
            PipelineKind::Thumbnail => "thm",
        }
    }

    /// Path segment under `/api/v1`.
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineKind::Subtitle => "subtitles",
            PipelineKind::Concat => "concat",
            PipelineKind::Thumbnail => "thumbnails",
        }
    }

    /// Only concat sessions are made of several independent clips.
    pub fn supports_segments(&self) -> bool {
        matches!(self, PipelineKind::Concat)
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque job identifier, a random v4 uuid rendered as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = String, format = Uuid)]
pub struct JobId(Uuid);

impl JobId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    /// Handed to the dispatcher; kept only as a tombstone so the id is never
    /// reused for upload.
    Finalized,
}

/// An upload in progress. Non-concat kinds always hold exactly one segment.
#[derive(Debug)]
pub struct UploadSession {
    pub kind: PipelineKind,
    pub id: JobId,
    pub segments: Vec<PathBuf>,
    pub state: SessionState,
    pub last_activity: Instant,
}

impl UploadSession {
    pub fn new(kind: PipelineKind, id: JobId, first_segment: PathBuf) -> Self {
        Self {
            kind,
            id,
            segments: vec![first_segment],
            state: SessionState::Open,
            last_activity: Instant::now(),
        }
    }

    /// File that `add` appends to.
    pub fn current_segment(&self) -> Option<&PathBuf> {
        self.segments.last()
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Failed(String),
}

/// The tracked output of one processing job.
#[derive(Debug)]
pub struct OutputArtifact {
    pub kind: PipelineKind,
    pub id: JobId,
    pub path: PathBuf,
    pub status: JobStatus,
    /// Set once the final chunk has been served and the file removed.
    pub consumed: bool,
    pub updated_at: Instant,
}

impl OutputArtifact {
    pub fn queued(kind: PipelineKind, id: JobId, path: PathBuf) -> Self {
        Self {
            kind,
            id,
            path,
            status: JobStatus::Queued,
            consumed: false,
            updated_at: Instant::now(),
        }
    }

    pub fn set_status(&mut self, status: JobStatus) {
        self.status = status;
        self.updated_at = Instant::now();
    }

    pub fn is_ready(&self) -> bool {
        self.status == JobStatus::Done && !self.consumed
    }

    pub fn mark_consumed(&mut self) {
        self.consumed = true;
        self.updated_at = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_deserialize_from_path_segments() {
        for kind in PipelineKind::ALL {
            let parsed: PipelineKind =
                serde_json::from_value(serde_json::Value::String(kind.as_str().to_string()))
                    .unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn tags_are_distinct() {
        let mut tags: Vec<_> = PipelineKind::ALL.iter().map(|k| k.tag()).collect();
        tags.dedup();
        assert_eq!(tags.len(), 3);
    }

    #[test]
    fn job_id_round_trips_through_text() {
        let id = JobId::random();
        assert_eq!(id.to_string().parse::<JobId>().unwrap(), id);
        assert!("not-a-uuid".parse::<JobId>().is_err());
    }

    #[test]
    fn failed_status_serializes_reason() {
        let value = serde_json::to_value(JobStatus::Failed("boom".into())).unwrap();
        assert_eq!(value["state"], "failed");
        assert_eq!(value["reason"], "boom");
    }
}
