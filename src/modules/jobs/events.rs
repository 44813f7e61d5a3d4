use std::path::PathBuf;

use super::model::{JobId, PipelineKind};

/// Work handed from a finalized upload session to the dispatcher. The
/// worker that receives it owns `inputs` and removes them when done.
#[derive(Debug, Clone)]
pub struct ProcessingJob {
    pub kind: PipelineKind,
    pub source_id: JobId,
    pub output_id: JobId,
    /// Clips in submission order.
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
}
