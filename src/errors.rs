use crate::newsletter::NewsletterError;
use crate::store::StoreError;
use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub error: &'static str,
    pub message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: "Invalid request",
            message: message.into(),
        }
    }

    pub fn internal(error: &'static str, err: impl std::error::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error,
            message: err.to_string(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        error!("document store error (retryable: {}): {err}", err.is_retryable());
        Self::internal("Document store failure", err)
    }
}

impl From<NewsletterError> for AppError {
    fn from(err: NewsletterError) -> Self {
        let (status, error) = match err {
            NewsletterError::Store(err) => return err.into(),
            NewsletterError::InvalidEmail => (StatusCode::BAD_REQUEST, "Invalid request"),
            NewsletterError::AlreadySubscribed => (StatusCode::CONFLICT, "Already subscribed"),
            NewsletterError::NotSubscribed => (StatusCode::NOT_FOUND, "Not subscribed"),
        };
        Self {
            status,
            error,
            message: err.to_string(),
        }
    }
}

/// Unreadable bodies, missing fields and wrong content types are all client errors.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.error, "message": self.message }));
        (self.status, body).into_response()
    }
}
