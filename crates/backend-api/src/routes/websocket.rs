use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use huddle_auth::User;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::{
    events,
    socket::{ConnectionId, ServerFrame, SocketHub},
    state::actor,
    ApiError, AppState,
};

#[derive(Debug, Deserialize)]
pub struct WebSocketQuery {
    token: Option<String>,
}

/// Frames a client may send.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ClientFrame {
    Ping,
    Typing {
        #[serde(rename = "chatId")]
        chat_id: i64,
        #[serde(rename = "isTyping")]
        is_typing: bool,
    },
}

#[utoipa::path(
    get,
    path = "/ws",
    tag = "WebSocket",
    params(("token" = String, Query, description = "Session token")),
    responses(
        (status = 101, description = "Switching protocols"),
        (status = 400, description = "Not a websocket upgrade", body = crate::error::ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorResponse)
    )
)]
pub async fn websocket_handler(
    Query(params): Query<WebSocketQuery>,
    State(state): State<AppState>,
    ws: Option<WebSocketUpgrade>,
) -> Result<Response, ApiError> {
    let token = params
        .token
        .filter(|token| !token.trim().is_empty())
        .ok_or_else(|| ApiError::unauthorized("missing token"))?;
    let (user, _) = state.authenticate(token.trim()).await?;
    let ws = ws.ok_or_else(|| ApiError::bad_request("expected a websocket upgrade request"))?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user)))
}

async fn handle_socket(socket: WebSocket, state: AppState, user: User) {
    let hub = state.hub().clone();
    let subscription = hub
        .join([
            SocketHub::user_room(user.id),
            SocketHub::company_room(user.company_id),
        ])
        .await;
    let connection_id = subscription.id;
    let mut out_rx = subscription.receiver;

    info!(user_id = user.id, connection_id, "websocket connected");

    let (mut ws_sender, mut receiver) = socket.split();
    // Ends when the client goes away or the hub evicts this connection.
    let mut sender_task = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(error) => {
                    warn!(%error, "failed to encode websocket frame");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(text)).await.is_err() {
                return;
            }
        }
        let _ = ws_sender.send(Message::Close(None)).await;
    });

    let hello = ServerFrame::new(
        "hello",
        json!({ "userId": user.id, "companyId": user.company_id }),
    );
    hub.send_to(connection_id, hello).await;

    loop {
        tokio::select! {
            _ = &mut sender_task => {
                debug!(user_id = user.id, connection_id, "websocket outbox closed");
                break;
            }
            message = receiver.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    let session = Session {
                        hub: &hub,
                        connection_id,
                        state: &state,
                        user: &user,
                    };
                    session.handle_frame(&text).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    debug!(user_id = user.id, %error, "websocket receive failed");
                    break;
                }
            },
        }
    }

    hub.leave(connection_id).await;
    sender_task.abort();
    info!(user_id = user.id, connection_id, "websocket disconnected");
}

struct Session<'a> {
    hub: &'a SocketHub,
    connection_id: ConnectionId,
    state: &'a AppState,
    user: &'a User,
}

impl Session<'_> {
    async fn handle_frame(&self, text: &str) {
        let frame = match serde_json::from_str::<ClientFrame>(text) {
            Ok(frame) => frame,
            Err(error) => {
                warn!(user_id = self.user.id, %error, "rejected websocket frame");
                self.reply_error("Invalid event format").await;
                return;
            }
        };

        match frame {
            ClientFrame::Ping => self.reply(ServerFrame::new("pong", json!({}))).await,
            ClientFrame::Typing { chat_id, is_typing } => {
                let chat = self
                    .state
                    .chats()
                    .get_for_participant(chat_id, actor(self.user))
                    .await;
                match chat {
                    Ok(chat) => {
                        events::typing(self.hub, &chat, self.user.id, &self.user.name, is_typing)
                            .await;
                    }
                    Err(error) => {
                        warn!(user_id = self.user.id, chat_id, %error, "rejected typing frame");
                        self.reply_error(&error.to_string()).await;
                    }
                }
            }
        }
    }

    async fn reply(&self, frame: ServerFrame) {
        if !self.hub.send_to(self.connection_id, frame).await {
            debug!(connection_id = self.connection_id, "reply dropped, connection evicted");
        }
    }

    async fn reply_error(&self, message: &str) {
        self.reply(ServerFrame::new("error", json!({ "message": message })))
            .await;
    }
}
