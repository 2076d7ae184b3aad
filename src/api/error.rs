use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;
use thiserror::Error;

use super::models::ErrorResponse;
use crate::service::ServiceError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("payload invalid: {0}")]
    InvalidPayload(String),
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    NotReady(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    ProcessTimeout(String),
    #[error("{0}")]
    ProcessFailed(String),
    #[error("{0}")]
    ParseFailure(String),
    #[error("{0}")]
    ArtifactNotFound(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::NotReady(_) => StatusCode::TOO_EARLY,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ProcessTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::ProcessFailed(_) | ApiError::ParseFailure(_) => StatusCode::BAD_GATEWAY,
            ApiError::ArtifactNotFound(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidPayload(_) => "INVALID_INPUT",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::NotReady(_) => "NOT_READY",
            ApiError::Conflict(_) => "JOB_FAILED",
            ApiError::ProcessTimeout(_) => "PROCESS_TIMEOUT",
            ApiError::ProcessFailed(_) => "PROCESS_FAILED",
            ApiError::ParseFailure(_) => "PARSE_FAILURE",
            ApiError::ArtifactNotFound(_) => "ARTIFACT_NOT_FOUND",
            ApiError::Unavailable(_) => "UNAVAILABLE",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code(),
            message: self.to_string(),
        };

        (status, Json(json!(body))).into_response()
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        ApiError::InvalidPayload(value.to_string())
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::InvalidInput(msg) => ApiError::InvalidPayload(msg),
            ServiceError::NotFound(job_id) => ApiError::NotFound(format!("job {job_id}")),
            ServiceError::NotReady { .. } => ApiError::NotReady(message),
            ServiceError::Conflict { .. } => ApiError::Conflict(message),
            ServiceError::ProcessTimeout(_) => ApiError::ProcessTimeout(message),
            ServiceError::ProcessFailed(_) => ApiError::ProcessFailed(message),
            ServiceError::ParseFailure(_) => ApiError::ParseFailure(message),
            ServiceError::ArtifactNotFound(_) => ApiError::ArtifactNotFound(message),
            ServiceError::Unavailable(_) => ApiError::Unavailable(message),
            ServiceError::Unknown(msg) => ApiError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::JobStatus;
    use std::time::Duration;

    #[test]
    fn test_service_error_status_codes() {
        let cases = [
            (ServiceError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (ServiceError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                ServiceError::NotReady {
                    job_id: "x".into(),
                    status: JobStatus::Running,
                },
                StatusCode::TOO_EARLY,
            ),
            (
                ServiceError::Conflict {
                    job_id: "x".into(),
                    message: "boom".into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                ServiceError::ProcessTimeout(Duration::from_secs(30)),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (ServiceError::ProcessFailed("x".into()), StatusCode::BAD_GATEWAY),
            (ServiceError::ParseFailure("x".into()), StatusCode::BAD_GATEWAY),
            (
                ServiceError::ArtifactNotFound("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ServiceError::Unavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (ServiceError::Unknown("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status_code(), expected);
        }
    }
}
