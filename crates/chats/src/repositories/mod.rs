//! Data access layer for the chat system.
//!
//! Methods taking a `&mut SqliteConnection` are meant to run inside a
//! service-owned transaction.

pub mod chat_repository;
pub mod chat_user_repository;
pub mod message_repository;

pub use chat_repository::ChatRepository;
pub use chat_user_repository::ChatUserRepository;
pub use message_repository::{MediaColumns, MessageRepository};
