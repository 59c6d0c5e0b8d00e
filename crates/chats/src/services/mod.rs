//! Business logic services for the chat system.
//!
//! Services enforce company scoping, ownership and participation, and keep
//! the unread counters consistent with the messages written.

pub mod chat_service;
pub mod message_service;

pub use chat_service::ChatService;
pub use message_service::{MessageService, PostedMessage};

use chrono::{SecondsFormat, Utc};

/// RFC 3339 with microseconds, so text order equals time order.
pub(crate) fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
