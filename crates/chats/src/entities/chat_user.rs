use serde::Serialize;
use utoipa::ToSchema;

use super::user::UserSummary;

/// A participant of a chat together with their unread counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatUser {
    pub id: i64,
    pub chat_id: i64,
    pub user_id: i64,
    /// Messages received since the participant last read the chat
    pub unreads: i64,
    pub created_at: String,
    pub updated_at: String,
    pub user: UserSummary,
}
