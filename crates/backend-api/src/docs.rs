use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::health_check,
        crate::routes::auth::register,
        crate::routes::auth::login,
        crate::routes::auth::logout,
        crate::routes::users::get_current_user,
        crate::routes::users::list_company_users,
        crate::routes::chats::list_chats,
        crate::routes::chats::create_chat,
        crate::routes::chats::get_chat,
        crate::routes::chats::update_chat,
        crate::routes::chats::delete_chat,
        crate::routes::chats::mark_chat_read,
        crate::routes::messages::list_messages,
        crate::routes::messages::create_message,
        crate::routes::websocket::websocket_handler
    ),
    components(
        schemas(
            crate::error::ErrorResponse,
            crate::routes::health::HealthResponse,
            crate::routes::auth::RegisterRequest,
            crate::routes::auth::LoginRequest,
            crate::routes::auth::SessionResponse,
            crate::routes::auth::UserResponse,
            crate::routes::users::UserProfileResponse,
            crate::routes::users::UsersResponse,
            crate::routes::chats::UserRef,
            crate::routes::chats::CreateChatRequest,
            crate::routes::chats::UpdateChatRequest,
            crate::routes::chats::DeleteChatResponse,
            crate::routes::messages::CreateMessageRequest,
            huddle_chats::Chat,
            huddle_chats::ChatUser,
            huddle_chats::ChatMessage,
            huddle_chats::UserSummary,
            huddle_chats::ChatPage,
            huddle_chats::MessagePage
        )
    ),
    tags(
        (name = "Health", description = "Service health endpoints"),
        (name = "Auth", description = "Registration and session management"),
        (name = "Users", description = "Profiles and the company directory"),
        (name = "Chats", description = "Chat lifecycle and read state"),
        (name = "Messages", description = "Chat history and posting"),
        (name = "WebSocket", description = "Realtime updates stream")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        let schemes = &mut components.security_schemes;

        let mut scheme = SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer));
        if let SecurityScheme::Http(http) = &mut scheme {
            http.bearer_format = Some("Bearer".to_string());
        }

        schemes.insert("bearerAuth".to_string(), scheme);
    }
}
