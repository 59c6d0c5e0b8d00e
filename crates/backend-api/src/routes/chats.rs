use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use huddle_chats::{Chat, ChatPage, CreateChat, UpdateChat};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{events, state::actor, util::PageQuery, ApiError, AppState};

/// Participant reference as sent by the chat form
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UserRef {
    pub id: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateChatRequest {
    pub title: String,
    #[serde(default)]
    pub users: Vec<UserRef>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateChatRequest {
    pub title: Option<String>,
    pub users: Option<Vec<UserRef>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteChatResponse {
    pub message: String,
}

fn user_ids(users: Vec<UserRef>) -> Vec<i64> {
    users.into_iter().map(|user| user.id).collect()
}

#[utoipa::path(
    get,
    path = "/api/chats",
    tag = "Chats",
    security(("bearerAuth" = [])),
    params(PageQuery),
    responses(
        (status = 200, description = "Chats the caller participates in", body = ChatPage),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_chats(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Result<Json<ChatPage>, ApiError> {
    let user = state.current_user(&headers).await?;
    let page = state
        .chats()
        .list(actor(&user), query.page_number())
        .await?;
    Ok(Json(page))
}

#[utoipa::path(
    post,
    path = "/api/chats",
    tag = "Chats",
    security(("bearerAuth" = [])),
    request_body = CreateChatRequest,
    responses(
        (status = 200, description = "Chat created", body = Chat),
        (status = 400, description = "Invalid title or participants", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateChatRequest>,
) -> Result<Json<Chat>, ApiError> {
    let user = state.current_user(&headers).await?;
    let chat = state
        .chats()
        .create(
            actor(&user),
            CreateChat {
                title: payload.title,
                users: user_ids(payload.users),
            },
        )
        .await?;

    events::chat_saved(state.hub(), "create", &chat).await;
    Ok(Json(chat))
}

#[utoipa::path(
    get,
    path = "/api/chats/{chat_uuid}",
    tag = "Chats",
    security(("bearerAuth" = [])),
    params(("chat_uuid" = String, Path, description = "Public chat uuid")),
    responses(
        (status = 200, description = "Chat with participants", body = Chat),
        (status = 403, description = "Caller is not a participant", body = crate::error::ErrorResponse),
        (status = 404, description = "Chat not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_chat(
    State(state): State<AppState>,
    Path(chat_uuid): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Chat>, ApiError> {
    let user = state.current_user(&headers).await?;
    let chat = state.chats().show(&chat_uuid, actor(&user)).await?;
    Ok(Json(chat))
}

#[utoipa::path(
    put,
    path = "/api/chats/{chat_id}",
    tag = "Chats",
    security(("bearerAuth" = [])),
    params(("chat_id" = i64, Path, description = "Chat id")),
    request_body = UpdateChatRequest,
    responses(
        (status = 200, description = "Chat updated", body = Chat),
        (status = 400, description = "Invalid title or participants", body = crate::error::ErrorResponse),
        (status = 403, description = "Only the owner can update the chat", body = crate::error::ErrorResponse),
        (status = 404, description = "Chat not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_chat(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
    headers: HeaderMap,
    Json(payload): Json<UpdateChatRequest>,
) -> Result<Json<Chat>, ApiError> {
    let user = state.current_user(&headers).await?;
    let chat = state
        .chats()
        .update(
            chat_id,
            actor(&user),
            UpdateChat {
                title: payload.title,
                users: payload.users.map(user_ids),
            },
        )
        .await?;

    events::chat_saved(state.hub(), "update", &chat).await;
    Ok(Json(chat))
}

#[utoipa::path(
    delete,
    path = "/api/chats/{chat_id}",
    tag = "Chats",
    security(("bearerAuth" = [])),
    params(("chat_id" = i64, Path, description = "Chat id")),
    responses(
        (status = 200, description = "Chat deleted", body = DeleteChatResponse),
        (status = 403, description = "Only the owner can delete the chat", body = crate::error::ErrorResponse),
        (status = 404, description = "Chat not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_chat(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<DeleteChatResponse>, ApiError> {
    let user = state.current_user(&headers).await?;
    let deleted = state.chats().delete(chat_id, actor(&user)).await?;

    state.media().remove_all(deleted.media_files.clone()).await;
    events::chat_deleted(state.hub(), &deleted).await;

    Ok(Json(DeleteChatResponse {
        message: "Chat deleted".to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/chats/{chat_id}/read",
    tag = "Chats",
    security(("bearerAuth" = [])),
    params(("chat_id" = i64, Path, description = "Chat id")),
    responses(
        (status = 200, description = "Unread counter cleared", body = Chat),
        (status = 403, description = "Caller is not a participant", body = crate::error::ErrorResponse),
        (status = 404, description = "Chat not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn mark_chat_read(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Chat>, ApiError> {
    let user = state.current_user(&headers).await?;
    let chat = state.chats().mark_as_read(chat_id, actor(&user)).await?;

    events::chat_read(state.hub(), &chat).await;
    Ok(Json(chat))
}
