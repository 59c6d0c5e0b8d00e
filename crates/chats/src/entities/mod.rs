//! Domain entities for the chat system.

pub mod chat;
pub mod chat_user;
pub mod message;
pub mod user;

pub use chat::{Chat, CreateChat, DeletedChat, UpdateChat};
pub use chat_user::ChatUser;
pub use message::{ChatMessage, NewMedia, NewMessage};
pub use user::{Actor, UserSummary};
