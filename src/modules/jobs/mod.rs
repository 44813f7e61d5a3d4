use axum::Router;
use axum::routing::{get, post};
use crate::state::AppState;

pub mod dto;
pub mod events;
pub mod handler;
pub mod model;
pub mod repository;
pub mod service;
pub mod stream_handler;

pub fn router() -> axum::Router<AppState> {
    Router::new()
        .route("/thumbnail", post(stream_handler::create_thumbnail))
        .route("/{kind}", post(handler::start_upload))
        .route(
            "/{kind}/{id}",
            axum::routing::put(handler::add_chunk)
                .post(handler::end_upload)
                .get(handler::get_info),
        )
        .route("/{kind}/{id}/segments", post(handler::new_segment))
        .route("/{kind}/{id}/status", get(handler::get_status))
        .route("/{kind}/{id}/{number}", get(stream_handler::get_chunk))
}
