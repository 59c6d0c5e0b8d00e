use serde::Serialize;
use utoipa::ToSchema;

use super::user::UserSummary;
use crate::types::{ChatError, ChatResult};

/// A message posted to a chat. Media messages carry the public URL of the
/// stored file in `media_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: i64,
    pub chat_id: i64,
    pub sender_id: i64,
    pub message: String,
    pub media_path: Option<String>,
    pub media_name: Option<String>,
    /// Top-level MIME type such as `image` or `audio`
    pub media_type: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub sender: UserSummary,
}

/// An uploaded file that has already been written to the media store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMedia {
    pub stored_name: String,
    pub original_name: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewMessage {
    Text(String),
    Media(NewMedia),
}

impl NewMessage {
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text(body.into())
    }

    /// The text stored in `message`. Media messages use the original file name.
    pub fn body(&self) -> &str {
        match self {
            Self::Text(body) => body.trim(),
            Self::Media(media) if media.original_name.trim().is_empty() => media.stored_name.as_str(),
            Self::Media(media) => media.original_name.trim(),
        }
    }

    pub fn validate(&self) -> ChatResult<()> {
        match self {
            Self::Text(body) if body.trim().is_empty() => {
                Err(ChatError::validation("Message cannot be empty"))
            }
            Self::Media(media) if media.stored_name.is_empty() => {
                Err(ChatError::validation("Media file is missing"))
            }
            _ => Ok(()),
        }
    }
}

/// `image/png` becomes `image`; values without a slash are kept whole.
pub fn media_kind(mime_type: &str) -> String {
    let kind = mime_type.split('/').next().unwrap_or_default().trim();
    if kind.is_empty() {
        "application".to_owned()
    } else {
        kind.to_ascii_lowercase()
    }
}
