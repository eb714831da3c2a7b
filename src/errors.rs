use axum::{
    Json,
    http::{StatusCode, header::InvalidHeaderValue},
    response::{IntoResponse, Response},
};

use crate::{repository::RepoError, token::TokenError};

/// AppError
///
/// The HTTP-facing error taxonomy. Every handler and gate returns this type, so the
/// status code and `{ "message": ... }` body are decided in exactly one place.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Missing/invalid session token, or a role that does not match the gate.
    #[error("unauthorized access")]
    Unauthorized,

    /// The request was understood but carries a value the API refuses to store.
    #[error("{0}")]
    BadRequest(String),

    /// Any fault while talking to the document store.
    #[error("repository failure: {0}")]
    Repository(#[from] RepoError),

    /// The session token could not be signed.
    #[error("token failure: {0}")]
    Token(#[from] TokenError),

    /// A response header could not be built, e.g. the session cookie.
    #[error("invalid header value: {0}")]
    Header(#[from] InvalidHeaderValue),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Repository(_) | AppError::Token(_) | AppError::Header(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Unauthorized | AppError::BadRequest(_) => self.to_string(),
            AppError::Repository(_) | AppError::Token(_) | AppError::Header(_) => {
                // The cause stays in the logs, the client only sees the generic message.
                tracing::error!(error = %self, "request failed");
                "Internal Server Error".to_string()
            }
        };

        (status, Json(serde_json::json!({ "message": message }))).into_response()
    }
}
