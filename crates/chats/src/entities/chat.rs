use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::chat_user::ChatUser;
use super::user::UserSummary;
use crate::types::{ChatError, ChatResult};

pub const MAX_TITLE_LENGTH: usize = 255;

/// A group conversation inside a company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    /// Database primary key
    pub id: i64,
    /// Public identifier used by clients to open a chat
    pub uuid: String,
    pub title: String,
    pub owner_id: i64,
    pub company_id: i64,
    /// `"{sender name}: {text}"` of the newest message
    pub last_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub owner: UserSummary,
    pub users: Vec<ChatUser>,
}

impl Chat {
    pub fn participant_ids(&self) -> Vec<i64> {
        self.users.iter().map(|member| member.user_id).collect()
    }

    pub fn participant(&self, user_id: i64) -> Option<&ChatUser> {
        self.users.iter().find(|member| member.user_id == user_id)
    }

    pub fn is_participant(&self, user_id: i64) -> bool {
        self.participant(user_id).is_some()
    }

    pub fn is_owner(&self, user_id: i64) -> bool {
        self.owner_id == user_id
    }
}

/// Request to create a new chat
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateChat {
    pub title: String,
    /// Ids of the invited colleagues; the owner is always added
    pub users: Vec<i64>,
}

/// Request to update a chat. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateChat {
    pub title: Option<String>,
    pub users: Option<Vec<i64>>,
}

/// What remains known about a chat once it has been removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedChat {
    pub id: i64,
    pub company_id: i64,
    /// Stored file names of media sent to the chat
    pub media_files: Vec<String>,
}

/// Trims a chat title and checks it is present and not too long.
pub fn validate_title(title: &str) -> ChatResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ChatError::validation("Chat title cannot be empty"));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ChatError::validation(format!(
            "Chat title too long (max {MAX_TITLE_LENGTH} characters)"
        )));
    }
    Ok(title.to_owned())
}

/// Owner first, then the requested users in order, without duplicates.
pub fn participant_set(owner_id: i64, users: &[i64]) -> Vec<i64> {
    let mut ids = vec![owner_id];
    for id in users {
        if !ids.contains(id) {
            ids.push(*id);
        }
    }
    ids
}
