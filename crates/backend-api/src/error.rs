use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use huddle_auth::AuthError;
use huddle_chats::ChatError;
use serde::Serialize;
use tracing::{error, warn};
use utoipa::ToSchema;

use crate::media::MediaError;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        let status = match error {
            AuthError::InvalidCredentials
            | AuthError::SessionNotFound
            | AuthError::SessionExpired
            | AuthError::InvalidSession => StatusCode::UNAUTHORIZED,
            AuthError::UserExists | AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::CompanyNotFound => StatusCode::NOT_FOUND,
            AuthError::Database(_) | AuthError::PasswordHash(_) => {
                error!(error = ?error, "auth error");
                return Self::internal_server_error("authentication failed");
            }
        };
        warn!(%error, status = status.as_u16(), "auth request rejected");
        Self::new(status, error.to_string())
    }
}

impl From<ChatError> for ApiError {
    fn from(error: ChatError) -> Self {
        let status = match error {
            ChatError::ChatNotFound { .. } => StatusCode::NOT_FOUND,
            ChatError::NotParticipant { .. } | ChatError::NotOwner { .. } => StatusCode::FORBIDDEN,
            ChatError::Validation { .. } => StatusCode::BAD_REQUEST,
            ChatError::Database(_) => {
                error!(error = ?error, "chat storage error");
                return Self::internal_server_error("chat storage failed");
            }
        };
        Self::new(status, error.to_string())
    }
}

impl From<MediaError> for ApiError {
    fn from(error: MediaError) -> Self {
        match error {
            MediaError::InvalidName(_) => Self::bad_request(error.to_string()),
            MediaError::Io(_) => {
                error!(error = ?error, "media storage error");
                Self::internal_server_error("failed to store media")
            }
        }
    }
}
