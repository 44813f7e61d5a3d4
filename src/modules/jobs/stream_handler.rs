use axum::{
    body::Bytes,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::common::error::JobError;
use crate::common::response::{ApiError, RawBody};
use crate::modules::jobs::handler::output_id;
use crate::modules::jobs::model::PipelineKind;
use crate::modules::jobs::service::JobService;
use crate::state::AppState;

/// Fetch one chunk of a finished output
/// Fetching the last chunk removes the output from the server.
#[utoipa::path(
    get,
    path = "/api/v1/{kind}/{id}/{number}",
    params(
        ("kind" = PipelineKind, Path, description = "Pipeline kind"),
        ("id" = String, Path, description = "Output id returned by end"),
        ("number" = i64, Path, description = "1-based chunk number")
    ),
    responses(
        (status = 200, description = "Chunk bytes", body = String, content_type = "application/octet-stream"),
        (status = 400, description = "Chunk number below 1"),
        (status = 404, description = "Not finished yet or doesn't exist"),
        (status = 416, description = "Chunk number exceeds chunk count"),
        (status = 422, description = "Processing failed")
    ),
    tag = "Jobs"
)]
pub async fn get_chunk(
    State(state): State<AppState>,
    Path((kind, raw_id, raw_number)): Path<(PipelineKind, String, String)>,
) -> impl IntoResponse {
    let number = match raw_number.parse::<i64>() {
        Ok(number) => number,
        Err(_) => return ApiError::from(JobError::InvalidNumber).into_response(),
    };
    let id = match output_id(&raw_id) {
        Ok(id) => id,
        Err(e) => return ApiError::from(e).into_response(),
    };
    match JobService::chunk(&state, kind, id, number).await {
        Ok(bytes) => RawBody(bytes, mime::APPLICATION_OCTET_STREAM).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Extract a thumbnail from a whole video in one request
#[utoipa::path(
    post,
    path = "/api/v1/thumbnail",
    request_body(content = String, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Still image", body = String, content_type = "image/jpeg"),
        (status = 500, description = "Thumbnail extraction failed")
    ),
    tag = "Jobs"
)]
pub async fn create_thumbnail(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    match JobService::thumbnail_now(&state, &body).await {
        Ok(image) => {
            let mime = mime_guess::from_ext(&state.config.image_format_ext).first_or_octet_stream();
            RawBody(image, mime).into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}
