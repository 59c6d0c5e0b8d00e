use axum::http::HeaderMap;
use huddle_auth::{AuthSession, Authenticator, User};
use huddle_chats::{Actor, ChatService, MessageService};
use huddle_config::AppConfig;
use sqlx::SqlitePool;

use crate::media::MediaStore;
use crate::socket::SocketHub;
use crate::util::require_bearer;
use crate::ApiError;

#[derive(Clone)]
pub struct AppState {
    authenticator: Authenticator,
    chats: ChatService,
    messages: MessageService,
    media: MediaStore,
    hub: SocketHub,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, authenticator: Authenticator, config: &AppConfig) -> Self {
        Self::with_hub(db_pool, authenticator, config, SocketHub::new())
    }

    pub fn with_hub(
        db_pool: SqlitePool,
        authenticator: Authenticator,
        config: &AppConfig,
        hub: SocketHub,
    ) -> Self {
        let media = MediaStore::new(&config.media);
        Self {
            chats: ChatService::new(db_pool.clone(), &config.chat),
            messages: MessageService::new(db_pool, &config.chat, media.public_url()),
            authenticator,
            media,
            hub,
        }
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    pub fn chats(&self) -> &ChatService {
        &self.chats
    }

    pub fn messages(&self) -> &MessageService {
        &self.messages
    }

    pub fn media(&self) -> &MediaStore {
        &self.media
    }

    pub fn hub(&self) -> &SocketHub {
        &self.hub
    }

    pub async fn authenticate(&self, token: &str) -> Result<(User, AuthSession), ApiError> {
        self.authenticator
            .authenticate_token(token)
            .await
            .map_err(ApiError::from)
    }

    /// Resolve the bearer token of a request to its user
    pub async fn current_user(&self, headers: &HeaderMap) -> Result<User, ApiError> {
        let token = require_bearer(headers)?;
        let (user, _) = self.authenticate(&token).await?;
        Ok(user)
    }
}

pub fn actor(user: &User) -> Actor {
    Actor {
        id: user.id,
        company_id: user.company_id,
    }
}
