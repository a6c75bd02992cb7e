use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
    pub meta: Option<Value>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    pub details: Option<Value>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn success_with_meta(data: T, meta: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta: Some(meta),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
                details: None,
            }),
            meta: None,
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Failures returned by the HTTP handlers.
#[derive(Debug)]
pub enum WebError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    UnprocessableEntity(String),
    BadGateway(String),
    InternalServerError(String),
}

impl WebError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebError::BadRequest(_) => StatusCode::BAD_REQUEST,
            WebError::NotFound(_) => StatusCode::NOT_FOUND,
            WebError::Conflict(_) => StatusCode::CONFLICT,
            WebError::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            WebError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            WebError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            WebError::BadRequest(_) => "BAD_REQUEST",
            WebError::NotFound(_) => "NOT_FOUND",
            WebError::Conflict(_) => "CONFLICT",
            WebError::UnprocessableEntity(_) => "UNPROCESSABLE_ENTITY",
            WebError::BadGateway(_) => "BAD_GATEWAY",
            WebError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn message(&self) -> String {
        match self {
            WebError::BadRequest(msg)
            | WebError::NotFound(msg)
            | WebError::Conflict(msg)
            | WebError::UnprocessableEntity(msg)
            | WebError::BadGateway(msg)
            | WebError::InternalServerError(msg) => msg.clone(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(format!("{} not found", resource.into()))
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalServerError(msg.into())
    }
}

impl From<AppError> for WebError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::DuplicateSubscriber { .. } => WebError::Conflict(err.to_string()),
            AppError::InvalidFormat { .. } | AppError::Validation(_) => {
                WebError::UnprocessableEntity(err.to_string())
            }
            AppError::Fetch { .. } | AppError::Extraction { .. } | AppError::Http(_) => {
                WebError::BadGateway(err.to_string())
            }
            other => {
                tracing::error!("Request failed: {}", other);
                WebError::internal("Internal server error")
            }
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ApiResponse::<()>::error(self.error_code(), self.message());
        (status, Json(body)).into_response()
    }
}
