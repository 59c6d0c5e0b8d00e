//! Realtime notifications for chat state changes.
//!
//! Event names are keyed by company, user and chat id so clients can
//! subscribe to exactly the streams they render.

use huddle_chats::{Chat, ChatMessage, DeletedChat};
use serde_json::json;

use crate::socket::SocketHub;

pub fn chat_user_event(company_id: i64, user_id: i64) -> String {
    format!("company-{company_id}-chat-user-{user_id}")
}

pub fn chat_event(company_id: i64, chat_id: i64) -> String {
    format!("company-{company_id}-chat-{chat_id}")
}

pub fn company_chats_event(company_id: i64) -> String {
    format!("company-{company_id}-chat")
}

fn participant_rooms(chat: &Chat) -> Vec<String> {
    chat.users
        .iter()
        .map(|member| SocketHub::user_room(member.user_id))
        .collect()
}

/// `action` is `create` or `update`. Each participant gets the record on
/// their own per-user event.
pub async fn chat_saved(hub: &SocketHub, action: &str, chat: &Chat) {
    for member in &chat.users {
        hub.emit_to(
            [SocketHub::user_room(member.user_id)],
            &chat_user_event(chat.company_id, member.user_id),
            json!({ "action": action, "record": chat }),
        )
        .await;
    }
}

pub async fn chat_deleted(hub: &SocketHub, deleted: &DeletedChat) {
    hub.emit_to_company(
        deleted.company_id,
        &company_chats_event(deleted.company_id),
        json!({ "action": "delete", "id": deleted.id }),
    )
    .await;
}

pub async fn message_created(hub: &SocketHub, message: &ChatMessage, chat: &Chat) {
    let payload = json!({ "action": "new-message", "newMessage": message, "chat": chat });
    emit_to_participants(hub, chat, payload).await;
}

pub async fn chat_read(hub: &SocketHub, chat: &Chat) {
    let payload = json!({ "action": "update", "chat": chat });
    emit_to_participants(hub, chat, payload).await;
}

/// Typing indicators go to everyone in the chat except the typist.
pub async fn typing(hub: &SocketHub, chat: &Chat, user_id: i64, name: &str, is_typing: bool) {
    let rooms = chat
        .users
        .iter()
        .filter(|member| member.user_id != user_id)
        .map(|member| SocketHub::user_room(member.user_id));
    hub.emit_to(
        rooms,
        &chat_event(chat.company_id, chat.id),
        json!({
            "action": "typing",
            "chatId": chat.id,
            "userId": user_id,
            "name": name,
            "isTyping": is_typing,
        }),
    )
    .await;
}

async fn emit_to_participants(hub: &SocketHub, chat: &Chat, payload: serde_json::Value) {
    let rooms = participant_rooms(chat);
    hub.emit_to(
        rooms.clone(),
        &chat_event(chat.company_id, chat.id),
        payload.clone(),
    )
    .await;
    hub.emit_to(rooms, &company_chats_event(chat.company_id), payload)
        .await;
}
