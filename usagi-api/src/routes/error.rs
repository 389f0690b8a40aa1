use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

use crate::{
    domain::{jobs::JobError, search::SearchError, services::MappingServiceError},
    repositories::RepositoryError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidQuery,
    IndexUnavailable,
    AlreadyRunning,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<ErrorCode>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    code: Option<ErrorCode>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = Some(code);
        self
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
            code: self.code,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(_) => Self::not_found(err.to_string()),
            RepositoryError::DatabaseError(ref e) => {
                tracing::error!("Database error: {:?}", e);
                Self::internal(err.to_string())
            }
            RepositoryError::Serialization(ref e) => {
                tracing::error!("Stored payload could not be decoded: {:?}", e);
                Self::internal(err.to_string())
            }
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::InvalidQuery(_) => {
                Self::bad_request(err.to_string()).with_code(ErrorCode::InvalidQuery)
            }
            SearchError::IndexUnavailable(_) => {
                tracing::warn!("Search index unavailable: {}", err);
                Self::unavailable(err.to_string()).with_code(ErrorCode::IndexUnavailable)
            }
            SearchError::IndexResponse(_) => {
                tracing::error!("Bad search index response: {}", err);
                Self::internal(err.to_string())
            }
        }
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::AlreadyRunning { .. } => {
                Self::conflict(err.to_string()).with_code(ErrorCode::AlreadyRunning)
            }
        }
    }
}

impl From<MappingServiceError> for ApiError {
    fn from(err: MappingServiceError) -> Self {
        match err {
            MappingServiceError::Search(e) => e.into(),
            MappingServiceError::Job(e) => e.into(),
            MappingServiceError::Repository(e) => e.into(),
            MappingServiceError::InvalidInput(_) => Self::bad_request(err.to_string()),
        }
    }
}
