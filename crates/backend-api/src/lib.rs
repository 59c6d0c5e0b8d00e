mod error;
mod state;
mod util;

pub mod docs;
pub mod events;
pub mod media;
pub mod routes;
pub mod socket;

pub use error::ApiError;
pub use media::MediaStore;
pub use socket::{ServerFrame, SocketHub};
pub use state::AppState;

use axum::{
    extract::DefaultBodyLimit,
    http::header::{AUTHORIZATION, CONTENT_TYPE},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::docs::ApiDoc;

const FALLBACK_BODY_LIMIT: usize = 50 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let media_root = state.media().root().to_path_buf();
    // Absolute CDN urls cannot be mounted, the files are then served under `/public`
    let media_url = match state.media().public_url() {
        url if url.len() > 1 && url.starts_with('/') => url.to_string(),
        _ => "/public".to_string(),
    };
    let body_limit =
        usize::try_from(state.media().max_upload_bytes()).unwrap_or(FALLBACK_BODY_LIMIT);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/auth/register", post(routes::auth::register))
        .route("/api/auth/login", post(routes::auth::login))
        .route("/api/auth/logout", post(routes::auth::logout))
        .route("/api/users", get(routes::users::list_company_users))
        .route("/api/users/me", get(routes::users::get_current_user))
        // Chat routes
        .route(
            "/api/chats",
            get(routes::chats::list_chats).post(routes::chats::create_chat),
        )
        // `GET` resolves the public uuid, the mutating verbs take the numeric id
        .route(
            "/api/chats/:chat_id",
            get(routes::chats::get_chat)
                .put(routes::chats::update_chat)
                .delete(routes::chats::delete_chat),
        )
        .route("/api/chats/:chat_id/read", post(routes::chats::mark_chat_read))
        .route(
            "/api/chats/:chat_id/messages",
            get(routes::messages::list_messages).post(routes::messages::create_message),
        )
        // WebSocket route
        .route("/ws", get(routes::websocket::websocket_handler))
        .merge(SwaggerUi::new("/docs").url("/docs/openapi.json", ApiDoc::openapi()))
        .nest_service(&media_url, ServeDir::new(media_root))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        .layer(cors_layer())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
}
