//! Application error responses.
//!
//! Every error the proxy surfaces to a client is one of a fixed set of
//! JSON bodies with a matching status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// An error returned to the client as JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppError {
    pub code: StatusCode,
    pub message: &'static str,
}

impl AppError {
    pub fn too_many_requests() -> Self {
        Self {
            code: StatusCode::TOO_MANY_REQUESTS,
            message: "Too many requests",
        }
    }

    pub fn unauthorized() -> Self {
        Self {
            code: StatusCode::UNAUTHORIZED,
            message: "Unable to identify user",
        }
    }

    pub fn no_backend_available() -> Self {
        Self {
            code: StatusCode::SERVICE_UNAVAILABLE,
            message: "No backend available",
        }
    }

    pub fn bad_gateway() -> Self {
        Self {
            code: StatusCode::BAD_GATEWAY,
            message: "Bad Gateway",
        }
    }

    pub fn internal() -> Self {
        Self {
            code: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Internal Server Error",
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "code": self.code.as_u16(),
            "message": self.message,
        }));
        (self.code, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_catalogue() {
        assert_eq!(AppError::too_many_requests().code, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(AppError::unauthorized().code, StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::no_backend_available().code, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(AppError::bad_gateway().code, StatusCode::BAD_GATEWAY);
        assert_eq!(AppError::internal().code, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
