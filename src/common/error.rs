use axum::http::StatusCode;
use thiserror::Error;

use crate::common::response::ApiError;
use crate::infrastructure::media::transform::TransformError;
use crate::modules::jobs::model::PipelineKind;

pub type JobResult<T> = Result<T, JobError>;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job id '{0}' doesn't exist")]
    NotFound(String),

    #[error("Invalid given number is not possible")]
    InvalidNumber,

    #[error("Job id '{0}' processing hasn't finished yet or doesn't exist")]
    NotReady(String),

    #[error("Given chunk number exceeds chunk count")]
    OutOfRange,

    #[error("Job id '{id}' failed: {reason}")]
    Failed { id: String, reason: String },

    #[error("Pipeline '{0}' does not accept segments")]
    SegmentsUnsupported(PipelineKind),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),
}

impl JobError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            JobError::NotFound(_) | JobError::NotReady(_) => StatusCode::NOT_FOUND,
            JobError::InvalidNumber | JobError::SegmentsUnsupported(_) => StatusCode::BAD_REQUEST,
            JobError::OutOfRange => StatusCode::RANGE_NOT_SATISFIABLE,
            JobError::Failed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            JobError::Storage(_) | JobError::Queue(_) | JobError::Transform(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<JobError> for ApiError {
    fn from(e: JobError) -> Self {
        let status = e.status_code();
        let message = match &e {
            // Details stay in the logs.
            JobError::Storage(_) | JobError::Queue(_) | JobError::Transform(_) => {
                tracing::error!("Internal error: {}", e);
                "Internal Server Error".to_string()
            }
            _ => e.to_string(),
        };
        ApiError(message, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_errors_map_to_client_statuses() {
        assert_eq!(JobError::NotFound("a".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(JobError::NotReady("a".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(JobError::InvalidNumber.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(JobError::OutOfRange.status_code(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(
            JobError::Failed { id: "a".into(), reason: "x".into() }.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = JobError::Storage(std::io::Error::other("disk /var/secret full"));
        let ApiError(message, status) = err.into();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!message.contains("secret"));
    }
}
