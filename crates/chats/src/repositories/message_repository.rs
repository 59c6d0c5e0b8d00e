//! Repository for message data access operations.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::entities::{ChatMessage, UserSummary};
use crate::types::{ChatResult, PageRequest};

const SELECT_MESSAGE: &str = "SELECT m.id, m.chat_id, m.sender_id, m.message, m.media_path,
        m.media_name, m.media_type, m.created_at, m.updated_at,
        s.name AS sender_name, s.email AS sender_email
     FROM chat_messages m
     JOIN users s ON s.id = m.sender_id";

/// Columns describing an attached file
pub struct MediaColumns<'a> {
    pub stored_name: &'a str,
    pub original_name: &'a str,
    pub kind: &'a str,
}

#[derive(Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        conn: &mut SqliteConnection,
        chat_id: i64,
        sender_id: i64,
        body: &str,
        media: Option<MediaColumns<'_>>,
        now: &str,
    ) -> ChatResult<i64> {
        let id = sqlx::query(
            "INSERT INTO chat_messages
                (chat_id, sender_id, message, media_path, media_name, media_type, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(chat_id)
        .bind(sender_id)
        .bind(body)
        .bind(media.as_ref().map(|m| m.stored_name))
        .bind(media.as_ref().map(|m| m.original_name))
        .bind(media.as_ref().map(|m| m.kind))
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

        Ok(id)
    }

    pub async fn find_by_id_in(
        conn: &mut SqliteConnection,
        id: i64,
    ) -> ChatResult<Option<ChatMessage>> {
        let row = sqlx::query(&format!("{SELECT_MESSAGE} WHERE m.id = ?"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(row.as_ref().map(message_from_row).transpose()?)
    }

    /// Newest messages first; the caller decides the display order.
    pub async fn page_newest_first(
        &self,
        chat_id: i64,
        page: PageRequest,
    ) -> ChatResult<(Vec<ChatMessage>, i64)> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_messages WHERE chat_id = ?")
            .bind(chat_id)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query(&format!(
            "{SELECT_MESSAGE} WHERE m.chat_id = ?
             ORDER BY m.created_at DESC, m.id DESC
             LIMIT ? OFFSET ?"
        ))
        .bind(chat_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let messages = rows
            .iter()
            .map(message_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((messages, count))
    }
}

fn message_from_row(row: &SqliteRow) -> Result<ChatMessage, sqlx::Error> {
    Ok(ChatMessage {
        id: row.try_get("id")?,
        chat_id: row.try_get("chat_id")?,
        sender_id: row.try_get("sender_id")?,
        message: row.try_get("message")?,
        media_path: row.try_get("media_path")?,
        media_name: row.try_get("media_name")?,
        media_type: row.try_get("media_type")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        sender: UserSummary {
            id: row.try_get("sender_id")?,
            name: row.try_get("sender_name")?,
            email: row.try_get("sender_email")?,
        },
    })
}
