//! Shared types for the chat system.

pub mod errors;
pub mod pagination;

pub use errors::{ChatError, ChatResult};
pub use pagination::{ChatPage, MessagePage, Page, PageRequest};
