//! Maps crate errors onto HTTP responses.
//!
//! Every failure leaves the API as `{"error": "<message>"}`. Client-side problems
//! carry the error's own message; storage problems are logged in full and answered
//! with a generic one.

use crate::errors::{Error, ErrorKind};
use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match err.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InsufficientStock
            | ErrorKind::ConstraintViolation
            | ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::PersistenceFailure => {
                error!("Request failed: {err}");
                return match err {
                    Error::Timeout { .. } => Self {
                        status: StatusCode::GATEWAY_TIMEOUT,
                        message: "Operation timed out".to_string(),
                    },
                    _ => Self {
                        status: StatusCode::INTERNAL_SERVER_ERROR,
                        message: "Internal server error".to_string(),
                    },
                };
            }
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (Error::not_found("Product", "p1"), StatusCode::NOT_FOUND),
            (
                Error::InsufficientStock {
                    product_id: "p1".to_string(),
                    available: 1,
                    requested: 2,
                },
                StatusCode::BAD_REQUEST,
            ),
            (Error::constraint("in use"), StatusCode::BAD_REQUEST),
            (Error::validation("bad"), StatusCode::BAD_REQUEST),
            (
                Error::Database(sea_orm::DbErr::Custom("disk on fire".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                Error::Timeout {
                    after: Duration::from_millis(10),
                },
                StatusCode::GATEWAY_TIMEOUT,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn test_storage_details_stay_private() {
        let api = ApiError::from(Error::Database(sea_orm::DbErr::Custom(
            "disk on fire".to_string(),
        )));
        assert_eq!(api.message(), "Internal server error");

        let api = ApiError::from(Error::constraint("Cannot delete supplier"));
        assert_eq!(api.message(), "Constraint violation: Cannot delete supplier");
    }
}
