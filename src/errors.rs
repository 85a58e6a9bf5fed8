use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("store connect error: {0}")]
    StoreConnect(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("store write error: {0}")]
    StoreWrite(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("{0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("BSON: {0}")]
    Bson(String),
}

impl ApiError {
    /// Stable machine-readable code carried in error bodies.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::StoreConnect(_) | Self::StoreUnavailable(_) => "store_unavailable",
            Self::StoreWrite(_) => "store_write_failed",
            Self::InvalidQuery(_) => "invalid_query",
            Self::NotFound(_) => "not_found",
            Self::Config(_) => "config",
            Self::Io(_) | Self::Json(_) | Self::Bson(_) => "internal",
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for failures of the store itself, as opposed to a bad request.
    #[must_use]
    pub const fn is_store_failure(&self) -> bool {
        matches!(self, Self::StoreConnect(_) | Self::StoreUnavailable(_) | Self::StoreWrite(_))
    }
}

impl From<bson::de::Error> for ApiError {
    fn from(e: bson::de::Error) -> Self {
        Self::Bson(e.to_string())
    }
}

impl From<bson::extjson::de::Error> for ApiError {
    fn from(e: bson::extjson::de::Error) -> Self {
        Self::Bson(e.to_string())
    }
}

/// JSON error body: `{"error": <message>, "code": <code>}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

impl ErrorBody {
    #[must_use]
    pub fn new(error: impl Into<String>, code: &'static str) -> Self {
        Self { error: error.into(), code }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody::new(self.to_string(), self.code());
        (self.status(), Json(body)).into_response()
    }
}
