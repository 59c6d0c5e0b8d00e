use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use utoipa::ToSchema;

/// The slice of a user embedded in chat and message payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i64,
    pub name: String,
    pub email: String,
}

impl UserSummary {
    /// Reads `{prefix}id`, `{prefix}name` and `{prefix}email` from a joined row.
    pub(crate) fn from_row(row: &SqliteRow, prefix: &str) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get(format!("{prefix}id").as_str())?,
            name: row.try_get(format!("{prefix}name").as_str())?,
            email: row.try_get(format!("{prefix}email").as_str())?,
        })
    }
}

/// The authenticated user a chat operation runs on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: i64,
    pub company_id: i64,
}
