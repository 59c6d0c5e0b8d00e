//! # Huddle Chats Crate
//!
//! Core business logic for team chats: group conversations inside a
//! company, their participants with per-user unread counters, and the
//! text or media messages exchanged in them.
//!
//! ## Architecture
//!
//! - **Entities**: Domain models (Chat, ChatUser, ChatMessage)
//! - **Repositories**: Data access layer over SQLite
//! - **Services**: Business rules (ownership, participation, unread bookkeeping)
//! - **Types**: Errors and pagination
//!
//! ## Usage
//!
//! ```rust,ignore
//! use huddle_chats::{ChatService, CreateChat};
//!
//! let service = ChatService::new(pool, &config.chat);
//! let chat = service.create(actor, CreateChat { title, users }).await?;
//! ```

pub mod entities;
pub mod repositories;
pub mod services;
pub mod types;

pub use entities::{
    Actor, Chat, ChatMessage, ChatUser, CreateChat, DeletedChat, NewMedia, NewMessage,
    UpdateChat, UserSummary,
};
pub use services::{ChatService, MessageService, PostedMessage};
pub use types::{ChatError, ChatPage, ChatResult, MessagePage, Page, PageRequest};
