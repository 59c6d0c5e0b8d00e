//! Repository for chat participants and their unread counters.

use sqlx::{Row, SqliteConnection};

use crate::entities::{ChatUser, UserSummary};
use crate::types::ChatResult;

pub struct ChatUserRepository;

impl ChatUserRepository {
    /// Participants of a chat in the order they joined
    pub async fn for_chat(conn: &mut SqliteConnection, chat_id: i64) -> ChatResult<Vec<ChatUser>> {
        let rows = sqlx::query(
            "SELECT cu.id, cu.chat_id, cu.user_id, cu.unreads, cu.created_at, cu.updated_at,
                    u.name AS user_name, u.email AS user_email
             FROM chat_users cu
             JOIN users u ON u.id = cu.user_id
             WHERE cu.chat_id = ?
             ORDER BY cu.id ASC",
        )
        .bind(chat_id)
        .fetch_all(&mut *conn)
        .await?;

        let members = rows
            .iter()
            .map(|row| {
                Ok(ChatUser {
                    id: row.try_get("id")?,
                    chat_id: row.try_get("chat_id")?,
                    user_id: row.try_get("user_id")?,
                    unreads: row.try_get("unreads")?,
                    created_at: row.try_get("created_at")?,
                    updated_at: row.try_get("updated_at")?,
                    user: UserSummary::from_row(row, "user_")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(members)
    }

    /// Adds a participant with a zero unread counter. Existing rows are kept.
    pub async fn add(
        conn: &mut SqliteConnection,
        chat_id: i64,
        user_id: i64,
        now: &str,
    ) -> ChatResult<()> {
        sqlx::query(
            "INSERT INTO chat_users (chat_id, user_id, unreads, created_at, updated_at)
             VALUES (?, ?, 0, ?, ?)
             ON CONFLICT (chat_id, user_id) DO NOTHING",
        )
        .bind(chat_id)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn remove(conn: &mut SqliteConnection, chat_id: i64, user_id: i64) -> ChatResult<()> {
        sqlx::query("DELETE FROM chat_users WHERE chat_id = ? AND user_id = ?")
            .bind(chat_id)
            .bind(user_id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Returns whether a participant row was touched.
    pub async fn reset_unreads(
        conn: &mut SqliteConnection,
        chat_id: i64,
        user_id: i64,
        now: &str,
    ) -> ChatResult<bool> {
        let updated = sqlx::query(
            "UPDATE chat_users SET unreads = 0, updated_at = ? WHERE chat_id = ? AND user_id = ?",
        )
        .bind(now)
        .bind(chat_id)
        .bind(user_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
        Ok(updated > 0)
    }

    pub async fn increment_unreads_except(
        conn: &mut SqliteConnection,
        chat_id: i64,
        user_id: i64,
        now: &str,
    ) -> ChatResult<()> {
        sqlx::query(
            "UPDATE chat_users SET unreads = unreads + 1, updated_at = ?
             WHERE chat_id = ? AND user_id != ?",
        )
        .bind(now)
        .bind(chat_id)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}
