//! Error types for the chat system.

use thiserror::Error;

/// Result type alias for chat operations
pub type ChatResult<T> = Result<T, ChatError>;

/// Main error type for the chat system
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Chat not found: {id}")]
    ChatNotFound { id: String },

    #[error("User {user_id} is not a participant of this chat")]
    NotParticipant { user_id: i64 },

    #[error("Only the chat owner can {action} it")]
    NotOwner { action: String },

    #[error("Validation error: {message}")]
    Validation { message: String },
}

impl ChatError {
    /// Create a not found error for chats
    pub fn chat_not_found(id: impl ToString) -> Self {
        Self::ChatNotFound { id: id.to_string() }
    }

    pub fn not_participant(user_id: i64) -> Self {
        Self::NotParticipant { user_id }
    }

    pub fn not_owner(action: impl Into<String>) -> Self {
        Self::NotOwner {
            action: action.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
