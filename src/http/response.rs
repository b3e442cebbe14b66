//! API error responses.
//!
//! Allocation failures map to stable status codes and a JSON body of
//! `{ "error": <code>, "message": <text> }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::allocator::AllocationError;

/// JSON body of an error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// An error a handler returns to the client.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "not_found",
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<AllocationError> for ApiError {
    fn from(err: AllocationError) -> Self {
        let status = match err {
            AllocationError::NoBackendsAvailable
            | AllocationError::AllBackendsUnreachable { .. }
            | AllocationError::UserLimitReached { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AllocationError::AllocationFailed { .. } => StatusCode::BAD_GATEWAY,
        };
        Self {
            status,
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.code.to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}
