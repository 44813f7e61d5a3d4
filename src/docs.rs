use utoipa::OpenApi;
use crate::modules::jobs::dto::*;
use crate::modules::jobs::model::{JobStatus, PipelineKind};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::jobs::handler::start_upload,
        crate::modules::jobs::handler::add_chunk,
        crate::modules::jobs::handler::new_segment,
        crate::modules::jobs::handler::end_upload,
        crate::modules::jobs::handler::get_info,
        crate::modules::jobs::handler::get_status,
        crate::modules::jobs::stream_handler::get_chunk,
        crate::modules::jobs::stream_handler::create_thumbnail,
    ),
    components(
        schemas(
            PipelineKind, JobStatus,
            JobIdResponse, ChunkInfoResponse, JobStatusResponse,
        )
    ),
    tags(
        (name = "Jobs", description = "Chunked upload, processing and retrieval")
    )
)]
pub struct ApiDoc;
