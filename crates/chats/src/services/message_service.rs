//! Message service for posting and paging chat messages.

use huddle_config::ChatConfig;
use sqlx::SqlitePool;
use tracing::info;

use super::timestamp;
use crate::entities::message::media_kind;
use crate::entities::{Actor, Chat, ChatMessage, NewMessage};
use crate::repositories::{ChatRepository, ChatUserRepository, MediaColumns, MessageRepository};
use crate::types::{ChatError, ChatResult, Page, PageRequest};

/// A freshly stored message together with the chat state it produced.
#[derive(Debug, Clone)]
pub struct PostedMessage {
    pub message: ChatMessage,
    pub chat: Chat,
}

/// Service for managing message operations
#[derive(Clone)]
pub struct MessageService {
    pool: SqlitePool,
    chats: ChatRepository,
    messages: MessageRepository,
    page_size: i64,
    media_url: String,
}

impl MessageService {
    /// `media_url` is the public prefix stored media is served under.
    pub fn new(pool: SqlitePool, config: &ChatConfig, media_url: impl Into<String>) -> Self {
        Self {
            chats: ChatRepository::new(pool.clone()),
            messages: MessageRepository::new(pool.clone()),
            pool,
            page_size: i64::from(config.page_size),
            media_url: media_url.into(),
        }
    }

    /// Post a message as one of the chat's participants.
    ///
    /// Stores the message, sets the chat's last message to
    /// `"{sender}: {text}"`, clears the sender's unread counter and bumps
    /// everyone else's, all in one transaction.
    pub async fn create(
        &self,
        chat_id: i64,
        sender: Actor,
        new_message: NewMessage,
    ) -> ChatResult<PostedMessage> {
        new_message.validate()?;

        let chat = self.participant_chat(chat_id, sender).await?;

        let kind;
        let media = match &new_message {
            NewMessage::Text(_) => None,
            NewMessage::Media(media) => {
                kind = media_kind(&media.mime_type);
                Some(MediaColumns {
                    stored_name: &media.stored_name,
                    original_name: new_message.body(),
                    kind: &kind,
                })
            }
        };

        // Write first so the transaction takes SQLite's write lock up front
        // and concurrent posters wait on the busy timeout.
        let now = timestamp();
        let mut tx = self.pool.begin().await?;
        let message_id = MessageRepository::insert(
            &mut tx,
            chat.id,
            sender.id,
            new_message.body(),
            media,
            &now,
        )
        .await?;
        let message = MessageRepository::find_by_id_in(&mut tx, message_id)
            .await?
            .ok_or_else(|| ChatError::validation("Message could not be stored"))?;

        let last_message = format!("{}: {}", message.sender.name, message.message);
        ChatRepository::set_last_message(&mut tx, chat.id, &last_message, &now).await?;
        ChatUserRepository::reset_unreads(&mut tx, chat.id, sender.id, &now).await?;
        ChatUserRepository::increment_unreads_except(&mut tx, chat.id, sender.id, &now).await?;

        let chat = ChatRepository::find_by_id_in(&mut tx, chat.id)
            .await?
            .ok_or_else(|| ChatError::chat_not_found(chat.id))?;
        tx.commit().await?;

        info!(
            chat_id = chat.id,
            message_id,
            sender_id = sender.id,
            media = message.media_type.as_deref().unwrap_or("none"),
            "stored chat message"
        );

        Ok(PostedMessage {
            message: self.with_public_url(message),
            chat,
        })
    }

    /// One page of a chat's history.
    ///
    /// Page 1 holds the newest messages. Within a page messages run oldest
    /// to newest, so clients can prepend earlier pages as they load.
    pub async fn list(
        &self,
        chat_id: i64,
        actor: Actor,
        page_number: Option<i64>,
    ) -> ChatResult<Page<ChatMessage>> {
        let chat = self.participant_chat(chat_id, actor).await?;

        let page = PageRequest::new(page_number, self.page_size);
        let (mut records, count) = self.messages.page_newest_first(chat.id, page).await?;
        records.reverse();

        let records = records
            .into_iter()
            .map(|message| self.with_public_url(message))
            .collect();
        Ok(Page::new(records, count, page))
    }

    async fn participant_chat(&self, chat_id: i64, actor: Actor) -> ChatResult<Chat> {
        let chat = match self.chats.find_by_id(chat_id).await? {
            Some(chat) if chat.company_id == actor.company_id => chat,
            _ => return Err(ChatError::chat_not_found(chat_id)),
        };
        if !chat.is_participant(actor.id) {
            return Err(ChatError::not_participant(actor.id));
        }
        Ok(chat)
    }

    /// Public URL of a stored media file
    pub fn media_url(&self, stored_name: &str) -> String {
        format!("{}/{}", self.media_url.trim_end_matches('/'), stored_name)
    }

    fn with_public_url(&self, mut message: ChatMessage) -> ChatMessage {
        message.media_path = message.media_path.map(|name| self.media_url(&name));
        message
    }
}
