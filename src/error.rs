use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::{rate_limit::DEFAULT_WINDOW, store::StoreError, validation::ValidationErrors};

pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

#[derive(Debug)]
pub enum AppError {
    Validation(ValidationErrors),
    InvalidJson,
    UnsupportedMediaType,
    PayloadTooLarge,
    RateLimited { limit: u32 },
    Storage(StoreError),
}

impl From<ValidationErrors> for AppError {
    fn from(inner: ValidationErrors) -> Self {
        AppError::Validation(inner)
    }
}

impl From<StoreError> for AppError {
    fn from(inner: StoreError) -> Self {
        AppError::Storage(inner)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Validation(details) => (
                StatusCode::BAD_REQUEST,
                json!({"error": "Invalid input", "details": details}),
            ),
            AppError::InvalidJson => (StatusCode::BAD_REQUEST, json!({"error": "Invalid JSON"})),
            AppError::UnsupportedMediaType => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                json!({"error": "Invalid content type"}),
            ),
            AppError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                json!({"error": "Request too large"}),
            ),
            AppError::RateLimited { limit } => {
                let mut response = (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({"error": "Too many requests. Please try again later."})),
                )
                    .into_response();
                let headers = response.headers_mut();
                headers.insert(header::RETRY_AFTER, HeaderValue::from(DEFAULT_WINDOW.as_secs()));
                headers.insert(RATE_LIMIT_LIMIT_HEADER, HeaderValue::from(limit));
                headers.insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from(0u32));
                return response;
            }
            AppError::Storage(e) => {
                // Never echo store details back to the caller.
                tracing::error!("Storage error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": "Failed to join waitlist. Please try again."}),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
