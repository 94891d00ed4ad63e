use axum::{Json, http::StatusCode, response::IntoResponse};
use thiserror::Error;

use super::models::ErrorResponse;
use crate::artifacts::ArtifactError;
use crate::jobs::RegistryError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("payload invalid: {0}")]
    InvalidPayload(String),
    #[error("payload exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidPayload(_) => "INVALID_PAYLOAD",
            ApiError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        if let ApiError::Internal(detail) = &self {
            tracing::error!(%detail, "Request failed");
        }

        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code(),
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        ApiError::InvalidPayload(value.to_string())
    }
}

impl From<ArtifactError> for ApiError {
    fn from(value: ArtifactError) -> Self {
        match value {
            ArtifactError::InvalidName(name) => {
                ApiError::InvalidPayload(format!("invalid file name: {name}"))
            }
            ArtifactError::NotFound(name) => ApiError::NotFound(format!("file {name}")),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(value: RegistryError) -> Self {
        match value {
            RegistryError::NotFound(id) => ApiError::NotFound(format!("job {id}")),
            RegistryError::AlreadyTerminal(id) => {
                ApiError::Conflict(format!("job {id} already finished"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn registry_errors_map_to_status_codes() {
        let id = Uuid::nil();
        assert_eq!(
            ApiError::from(RegistryError::NotFound(id)).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(RegistryError::AlreadyTerminal(id)).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn artifact_errors_map_to_status_codes() {
        assert_eq!(
            ApiError::from(ArtifactError::InvalidName("../x".into())).code(),
            "INVALID_PAYLOAD"
        );
        assert_eq!(
            ApiError::from(ArtifactError::NotFound("a.mp4".into())).status_code(),
            StatusCode::NOT_FOUND
        );
    }
}
