//! Chat service for managing chat operations.

use huddle_config::ChatConfig;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use super::timestamp;
use crate::entities::chat::{participant_set, validate_title};
use crate::entities::{Actor, Chat, CreateChat, DeletedChat, UpdateChat};
use crate::repositories::{ChatRepository, ChatUserRepository};
use crate::types::{ChatError, ChatResult, Page, PageRequest};

/// Service for managing chat operations
#[derive(Clone)]
pub struct ChatService {
    pool: SqlitePool,
    chats: ChatRepository,
    page_size: i64,
}

impl ChatService {
    pub fn new(pool: SqlitePool, config: &ChatConfig) -> Self {
        Self {
            chats: ChatRepository::new(pool.clone()),
            pool,
            page_size: i64::from(config.page_size),
        }
    }

    /// Chats the actor participates in, newest activity first
    pub async fn list(&self, actor: Actor, page_number: Option<i64>) -> ChatResult<Page<Chat>> {
        let page = PageRequest::new(page_number, self.page_size);
        let (records, count) = self.chats.list_for_participant(actor.id, page).await?;
        Ok(Page::new(records, count, page))
    }

    /// Create a chat owned by the actor. The owner always joins as a participant.
    pub async fn create(&self, actor: Actor, request: CreateChat) -> ChatResult<Chat> {
        let title = validate_title(&request.title)?;
        let participants = self.checked_participants(actor, &request.users).await?;

        let uuid = Uuid::new_v4().to_string();
        let now = timestamp();

        let mut tx = self.pool.begin().await?;
        let chat_id =
            ChatRepository::insert(&mut tx, &uuid, &title, actor.id, actor.company_id, &now)
                .await?;
        for user_id in &participants {
            ChatUserRepository::add(&mut tx, chat_id, *user_id, &now).await?;
        }
        let chat = ChatRepository::find_by_id_in(&mut tx, chat_id)
            .await?
            .ok_or_else(|| ChatError::chat_not_found(chat_id))?;
        tx.commit().await?;

        info!(
            chat_id,
            uuid = %chat.uuid,
            owner_id = actor.id,
            company_id = actor.company_id,
            participants = participants.len(),
            "created chat"
        );
        Ok(chat)
    }

    /// Rename a chat and/or replace its participants. Owner only.
    ///
    /// Participants kept across the update keep their unread counters.
    pub async fn update(&self, chat_id: i64, actor: Actor, request: UpdateChat) -> ChatResult<Chat> {
        let chat = self.find_in_company(chat_id, actor).await?;
        if !chat.is_owner(actor.id) {
            return Err(ChatError::not_owner("update"));
        }

        let title = match request.title.as_deref() {
            Some(title) => validate_title(title)?,
            None => chat.title.clone(),
        };
        let participants = match request.users.as_deref() {
            Some(users) => Some(self.checked_participants(actor, users).await?),
            None => None,
        };

        let now = timestamp();
        let mut tx = self.pool.begin().await?;
        ChatRepository::update_title(&mut tx, chat.id, &title, &now).await?;

        if let Some(participants) = &participants {
            for current in chat.participant_ids() {
                if !participants.contains(&current) {
                    ChatUserRepository::remove(&mut tx, chat.id, current).await?;
                }
            }
            for user_id in participants {
                ChatUserRepository::add(&mut tx, chat.id, *user_id, &now).await?;
            }
        }

        let updated = ChatRepository::find_by_id_in(&mut tx, chat.id)
            .await?
            .ok_or_else(|| ChatError::chat_not_found(chat.id))?;
        tx.commit().await?;

        info!(
            chat_id = chat.id,
            actor_id = actor.id,
            participants = updated.users.len(),
            "updated chat"
        );
        Ok(updated)
    }

    /// Open a chat by uuid. The actor must be one of its participants.
    pub async fn show(&self, uuid: &str, actor: Actor) -> ChatResult<Chat> {
        let chat = self
            .chats
            .find_by_uuid(uuid, actor.company_id)
            .await?
            .ok_or_else(|| ChatError::chat_not_found(uuid))?;

        if !chat.is_participant(actor.id) {
            return Err(ChatError::not_participant(actor.id));
        }
        Ok(chat)
    }

    /// Fetch a chat by id for one of its participants
    pub async fn get_for_participant(&self, chat_id: i64, actor: Actor) -> ChatResult<Chat> {
        let chat = self.find_in_company(chat_id, actor).await?;
        if !chat.is_participant(actor.id) {
            return Err(ChatError::not_participant(actor.id));
        }
        Ok(chat)
    }

    /// Delete a chat with its participants and messages. Owner only.
    ///
    /// Stored media names are returned so the caller can remove the files.
    pub async fn delete(&self, chat_id: i64, actor: Actor) -> ChatResult<DeletedChat> {
        let chat = self.find_in_company(chat_id, actor).await?;
        if !chat.is_owner(actor.id) {
            return Err(ChatError::not_owner("delete"));
        }

        let media_files = self.chats.media_files(chat.id).await?;
        if !self.chats.delete(chat.id).await? {
            return Err(ChatError::chat_not_found(chat.id));
        }

        info!(
            chat_id = chat.id,
            actor_id = actor.id,
            media_files = media_files.len(),
            "deleted chat"
        );
        Ok(DeletedChat {
            id: chat.id,
            company_id: chat.company_id,
            media_files,
        })
    }

    /// Reset the actor's unread counter for a chat
    pub async fn mark_as_read(&self, chat_id: i64, actor: Actor) -> ChatResult<Chat> {
        let chat = self.find_in_company(chat_id, actor).await?;

        let mut conn = self.pool.acquire().await?;
        if !ChatUserRepository::reset_unreads(&mut conn, chat.id, actor.id, &timestamp()).await? {
            return Err(ChatError::not_participant(actor.id));
        }

        ChatRepository::find_by_id_in(&mut conn, chat.id)
            .await?
            .ok_or_else(|| ChatError::chat_not_found(chat.id))
    }

    async fn find_in_company(&self, chat_id: i64, actor: Actor) -> ChatResult<Chat> {
        match self.chats.find_by_id(chat_id).await? {
            Some(chat) if chat.company_id == actor.company_id => Ok(chat),
            _ => Err(ChatError::chat_not_found(chat_id)),
        }
    }

    async fn checked_participants(&self, actor: Actor, users: &[i64]) -> ChatResult<Vec<i64>> {
        if users.is_empty() {
            return Err(ChatError::validation("At least one participant is required"));
        }

        let participants = participant_set(actor.id, users);
        let outsiders = self
            .chats
            .users_outside_company(actor.company_id, &participants)
            .await?;
        if !outsiders.is_empty() {
            return Err(ChatError::validation(format!(
                "Users {outsiders:?} do not belong to this company"
            )));
        }
        Ok(participants)
    }
}
