//! Repository for chat data access operations.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use super::chat_user_repository::ChatUserRepository;
use crate::entities::{Chat, UserSummary};
use crate::types::{ChatResult, PageRequest};

const SELECT_CHAT: &str = "SELECT c.id, c.uuid, c.title, c.owner_id, c.company_id, c.last_message,
        c.created_at, c.updated_at, o.name AS owner_name, o.email AS owner_email
     FROM chats c
     JOIN users o ON o.id = c.owner_id";

/// Repository for chat database operations
#[derive(Clone)]
pub struct ChatRepository {
    pool: SqlitePool,
}

impl ChatRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: i64) -> ChatResult<Option<Chat>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_by_id_in(&mut conn, id).await
    }

    /// Same as [`ChatRepository::find_by_id`] but on a caller-owned connection,
    /// so it sees uncommitted writes of a running transaction.
    pub async fn find_by_id_in(conn: &mut SqliteConnection, id: i64) -> ChatResult<Option<Chat>> {
        let row = sqlx::query(&format!("{SELECT_CHAT} WHERE c.id = ?"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => Ok(Some(Self::hydrate(conn, &row).await?)),
            None => Ok(None),
        }
    }

    /// Find a chat by uuid, scoped to one company
    pub async fn find_by_uuid(&self, uuid: &str, company_id: i64) -> ChatResult<Option<Chat>> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query(&format!(
            "{SELECT_CHAT} WHERE c.uuid = ? AND c.company_id = ?"
        ))
        .bind(uuid)
        .bind(company_id)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => Ok(Some(Self::hydrate(&mut conn, &row).await?)),
            None => Ok(None),
        }
    }

    /// Chats the user participates in, most recently active first, plus the
    /// total number of such chats.
    pub async fn list_for_participant(
        &self,
        user_id: i64,
        page: PageRequest,
    ) -> ChatResult<(Vec<Chat>, i64)> {
        let mut conn = self.pool.acquire().await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_users WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&mut *conn)
            .await?;

        let rows = sqlx::query(&format!(
            "{SELECT_CHAT}
             JOIN chat_users cu ON cu.chat_id = c.id AND cu.user_id = ?
             ORDER BY c.updated_at DESC, c.id DESC
             LIMIT ? OFFSET ?"
        ))
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&mut *conn)
        .await?;

        let mut chats = Vec::with_capacity(rows.len());
        for row in &rows {
            chats.push(Self::hydrate(&mut conn, row).await?);
        }

        Ok((chats, count))
    }

    pub async fn insert(
        conn: &mut SqliteConnection,
        uuid: &str,
        title: &str,
        owner_id: i64,
        company_id: i64,
        now: &str,
    ) -> ChatResult<i64> {
        let id = sqlx::query(
            "INSERT INTO chats (uuid, title, owner_id, company_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid)
        .bind(title)
        .bind(owner_id)
        .bind(company_id)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

        Ok(id)
    }

    pub async fn update_title(
        conn: &mut SqliteConnection,
        id: i64,
        title: &str,
        now: &str,
    ) -> ChatResult<()> {
        sqlx::query("UPDATE chats SET title = ?, updated_at = ? WHERE id = ?")
            .bind(title)
            .bind(now)
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn set_last_message(
        conn: &mut SqliteConnection,
        id: i64,
        last_message: &str,
        now: &str,
    ) -> ChatResult<()> {
        sqlx::query("UPDATE chats SET last_message = ?, updated_at = ? WHERE id = ?")
            .bind(last_message)
            .bind(now)
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Stored file names of every media message of a chat
    pub async fn media_files(&self, id: i64) -> ChatResult<Vec<String>> {
        let files = sqlx::query_scalar(
            "SELECT media_path FROM chat_messages WHERE chat_id = ? AND media_path IS NOT NULL",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(files)
    }

    /// Removes the chat; participants and messages go with it through the
    /// foreign key cascade.
    pub async fn delete(&self, id: i64) -> ChatResult<bool> {
        let removed = sqlx::query("DELETE FROM chats WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(removed > 0)
    }

    /// Ids out of `user_ids` that do not belong to the given company.
    pub async fn users_outside_company(
        &self,
        company_id: i64,
        user_ids: &[i64],
    ) -> ChatResult<Vec<i64>> {
        let mut outsiders = Vec::new();
        for user_id in user_ids {
            let found: Option<i64> =
                sqlx::query_scalar("SELECT id FROM users WHERE id = ? AND company_id = ?")
                    .bind(*user_id)
                    .bind(company_id)
                    .fetch_optional(&self.pool)
                    .await?;
            if found.is_none() {
                outsiders.push(*user_id);
            }
        }
        Ok(outsiders)
    }

    async fn hydrate(conn: &mut SqliteConnection, row: &SqliteRow) -> ChatResult<Chat> {
        let id: i64 = row.try_get("id")?;
        let users = ChatUserRepository::for_chat(conn, id).await?;

        Ok(Chat {
            id,
            uuid: row.try_get("uuid")?,
            title: row.try_get("title")?,
            owner_id: row.try_get("owner_id")?,
            company_id: row.try_get("company_id")?,
            last_message: row.try_get("last_message")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            owner: UserSummary::from_row(row, "owner_")?,
            users,
        })
    }
}
