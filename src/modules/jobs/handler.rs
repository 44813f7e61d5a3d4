use crate::common::error::JobError;
use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::modules::jobs::dto::*;
use crate::modules::jobs::model::{JobId, PipelineKind};
use crate::modules::jobs::service::JobService;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

/// Ids that aren't UUIDs can't name an upload, so they are unknown.
pub(super) fn upload_id(raw: &str) -> Result<JobId, JobError> {
    raw.parse().map_err(|_| JobError::NotFound(raw.to_string()))
}

/// Malformed output ids read the same as ones still processing.
pub(super) fn output_id(raw: &str) -> Result<JobId, JobError> {
    raw.parse().map_err(|_| JobError::NotReady(raw.to_string()))
}

fn id_response(id: JobId, message: &str) -> axum::response::Response {
    ApiSuccess(ApiResponse::success(JobIdResponse { id }, message), StatusCode::OK).into_response()
}

// --- UPLOAD SESSION HANDLERS ---

/// Start an upload session
/// The request body is the first chunk of the input and may be empty.
#[utoipa::path(
    post,
    path = "/api/v1/{kind}",
    params(
        ("kind" = PipelineKind, Path, description = "Pipeline kind")
    ),
    request_body(content = String, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Upload started", body = ApiResponse<JobIdResponse>),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Jobs"
)]
pub async fn start_upload(
    State(state): State<AppState>,
    Path(kind): Path<PipelineKind>,
    body: Bytes,
) -> impl IntoResponse {
    match JobService::start(&state, kind, &body).await {
        Ok(id) => id_response(id, "Upload started"),
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/v1/{kind}/{id}",
    params(
        ("kind" = PipelineKind, Path, description = "Pipeline kind"),
        ("id" = String, Path, description = "Upload id returned by start")
    ),
    request_body(content = String, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Chunk appended", body = ApiResponse<JobIdResponse>),
        (status = 404, description = "Upload not found"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Jobs"
)]
pub async fn add_chunk(
    State(state): State<AppState>,
    Path((kind, raw_id)): Path<(PipelineKind, String)>,
    body: Bytes,
) -> impl IntoResponse {
    let id = match upload_id(&raw_id) {
        Ok(id) => id,
        Err(e) => return ApiError::from(e).into_response(),
    };
    match JobService::add(&state, kind, id, &body).await {
        Ok(id) => id_response(id, "Chunk appended"),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Start the next clip of a concat upload
#[utoipa::path(
    post,
    path = "/api/v1/{kind}/{id}/segments",
    params(
        ("kind" = PipelineKind, Path, description = "Pipeline kind, only concat accepts segments"),
        ("id" = String, Path, description = "Upload id returned by start")
    ),
    request_body(content = String, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Segment started", body = ApiResponse<JobIdResponse>),
        (status = 400, description = "Pipeline does not accept segments"),
        (status = 404, description = "Upload not found"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Jobs"
)]
pub async fn new_segment(
    State(state): State<AppState>,
    Path((kind, raw_id)): Path<(PipelineKind, String)>,
    body: Bytes,
) -> impl IntoResponse {
    let id = match upload_id(&raw_id) {
        Ok(id) => id,
        Err(e) => return ApiError::from(e).into_response(),
    };
    match JobService::new_segment(&state, kind, id, &body).await {
        Ok(id) => id_response(id, "Segment started"),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Finish an upload and queue it for processing
/// Responds with the id the result can later be fetched under.
#[utoipa::path(
    post,
    path = "/api/v1/{kind}/{id}",
    params(
        ("kind" = PipelineKind, Path, description = "Pipeline kind"),
        ("id" = String, Path, description = "Upload id returned by start")
    ),
    request_body(content = String, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Processing queued", body = ApiResponse<JobIdResponse>),
        (status = 404, description = "Upload not found"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Jobs"
)]
pub async fn end_upload(
    State(state): State<AppState>,
    Path((kind, raw_id)): Path<(PipelineKind, String)>,
    body: Bytes,
) -> impl IntoResponse {
    let id = match upload_id(&raw_id) {
        Ok(id) => id,
        Err(e) => return ApiError::from(e).into_response(),
    };
    match JobService::end(&state, kind, id, &body).await {
        Ok(output_id) => id_response(output_id, "Processing queued"),
        Err(e) => ApiError::from(e).into_response(),
    }
}

// --- OUTPUT HANDLERS ---

#[utoipa::path(
    get,
    path = "/api/v1/{kind}/{id}",
    params(
        ("kind" = PipelineKind, Path, description = "Pipeline kind"),
        ("id" = String, Path, description = "Output id returned by end")
    ),
    responses(
        (status = 200, description = "Chunk count and size", body = ApiResponse<ChunkInfoResponse>),
        (status = 404, description = "Not finished yet or doesn't exist"),
        (status = 422, description = "Processing failed")
    ),
    tag = "Jobs"
)]
pub async fn get_info(
    State(state): State<AppState>,
    Path((kind, raw_id)): Path<(PipelineKind, String)>,
) -> impl IntoResponse {
    let id = match output_id(&raw_id) {
        Ok(id) => id,
        Err(e) => return ApiError::from(e).into_response(),
    };
    match JobService::info(&state, kind, id).await {
        Ok(info) => ApiSuccess(ApiResponse::success(info, "Output ready"), StatusCode::OK).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/{kind}/{id}/status",
    params(
        ("kind" = PipelineKind, Path, description = "Pipeline kind"),
        ("id" = String, Path, description = "Output id returned by end")
    ),
    responses(
        (status = 200, description = "Processing status", body = ApiResponse<JobStatusResponse>),
        (status = 404, description = "Unknown output")
    ),
    tag = "Jobs"
)]
pub async fn get_status(
    State(state): State<AppState>,
    Path((kind, raw_id)): Path<(PipelineKind, String)>,
) -> impl IntoResponse {
    let id = match output_id(&raw_id) {
        Ok(id) => id,
        Err(e) => return ApiError::from(e).into_response(),
    };
    match JobService::status(&state, kind, id).await {
        Ok(status) => ApiSuccess(
            ApiResponse::success(JobStatusResponse { id, status }, "Status retrieved"),
            StatusCode::OK,
        )
        .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}
