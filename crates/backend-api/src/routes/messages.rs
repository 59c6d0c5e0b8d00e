use axum::{
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::{header::CONTENT_TYPE, HeaderMap},
    Json,
};
use huddle_auth::User;
use huddle_chats::{ChatMessage, MessagePage, NewMedia, NewMessage};
use serde::Deserialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::{events, state::actor, util::PageQuery, ApiError, AppState};

/// Multipart field carrying uploaded files
const MEDIA_FIELD: &str = "medias";

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateMessageRequest {
    pub message: String,
}

#[utoipa::path(
    get,
    path = "/api/chats/{chat_id}/messages",
    tag = "Messages",
    security(("bearerAuth" = [])),
    params(
        ("chat_id" = i64, Path, description = "Chat id"),
        PageQuery
    ),
    responses(
        (status = 200, description = "One page of history, oldest first within the page", body = MessagePage),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller is not a participant", body = crate::error::ErrorResponse),
        (status = 404, description = "Chat not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_messages(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Result<Json<MessagePage>, ApiError> {
    let user = state.current_user(&headers).await?;
    let page = state
        .messages()
        .list(chat_id, actor(&user), query.page_number())
        .await?;
    Ok(Json(page))
}

/// Accepts either a JSON text message or a multipart upload with one or
/// more `medias` files. Every upload becomes its own message and the last
/// one is returned.
#[utoipa::path(
    post,
    path = "/api/chats/{chat_id}/messages",
    tag = "Messages",
    security(("bearerAuth" = [])),
    params(("chat_id" = i64, Path, description = "Chat id")),
    request_body(
        content = CreateMessageRequest,
        description = "JSON text message, or multipart/form-data with `medias` files"
    ),
    responses(
        (status = 200, description = "Stored message", body = ChatMessage),
        (status = 400, description = "Empty message or no files", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller is not a participant", body = crate::error::ErrorResponse),
        (status = 404, description = "Chat not found", body = crate::error::ErrorResponse),
        (status = 413, description = "Upload too large", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_message(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
    headers: HeaderMap,
    request: Request,
) -> Result<Json<ChatMessage>, ApiError> {
    let user = state.current_user(&headers).await?;

    let is_multipart = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    let message = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|err| ApiError::new(err.status(), err.body_text()))?;
        post_uploads(&state, chat_id, &user, multipart).await?
    } else {
        let Json(payload) = Json::<CreateMessageRequest>::from_request(request, &state)
            .await
            .map_err(|err| ApiError::new(err.status(), err.body_text()))?;
        post(&state, chat_id, &user, NewMessage::Text(payload.message)).await?
    };

    Ok(Json(message))
}

async fn post(
    state: &AppState,
    chat_id: i64,
    user: &User,
    new_message: NewMessage,
) -> Result<ChatMessage, ApiError> {
    let posted = state
        .messages()
        .create(chat_id, actor(user), new_message)
        .await?;
    events::message_created(state.hub(), &posted.message, &posted.chat).await;
    Ok(posted.message)
}

async fn post_uploads(
    state: &AppState,
    chat_id: i64,
    user: &User,
    mut multipart: Multipart,
) -> Result<ChatMessage, ApiError> {
    let mut last = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::new(err.status(), err.body_text()))?
    {
        if field.name() != Some(MEDIA_FIELD) {
            continue;
        }

        let original_name = field.file_name().unwrap_or("upload").to_string();
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|err| ApiError::new(err.status(), err.body_text()))?;

        let stored_name = state.media().save(&original_name, &bytes).await?;
        let media = NewMedia {
            stored_name: stored_name.clone(),
            original_name,
            mime_type,
        };

        match post(state, chat_id, user, NewMessage::Media(media)).await {
            Ok(message) => last = Some(message),
            Err(error) => {
                if let Err(cleanup) = state.media().remove(&stored_name).await {
                    warn!(stored_name = %stored_name, error = %cleanup, "failed to discard upload");
                }
                return Err(error);
            }
        }
    }

    let message = last.ok_or_else(|| ApiError::bad_request("No media files were uploaded"))?;
    info!(chat_id, user_id = user.id, "stored media upload");
    Ok(message)
}
