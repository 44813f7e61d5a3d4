use serde::Serialize;
use utoipa::ToSchema;

use super::model::{JobId, JobStatus};

#[derive(Debug, Serialize, ToSchema)]
pub struct JobIdResponse {
    pub id: JobId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct ChunkInfoResponse {
    pub chunk_count: u64,
    pub total_bytes: u64,
}

impl ChunkInfoResponse {
    pub fn for_size(total_bytes: u64, chunk_size: usize) -> Self {
        Self {
            chunk_count: total_bytes.div_ceil(chunk_size.max(1) as u64),
            total_bytes,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JobStatusResponse {
    pub id: JobId,
    pub status: JobStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_count_rounds_up() {
        assert_eq!(ChunkInfoResponse::for_size(0, 4).chunk_count, 0);
        assert_eq!(ChunkInfoResponse::for_size(4, 4).chunk_count, 1);
        assert_eq!(ChunkInfoResponse::for_size(5, 4).chunk_count, 2);
        assert_eq!(ChunkInfoResponse::for_size(1_887_437, 1_887_436).chunk_count, 2);
    }
}
