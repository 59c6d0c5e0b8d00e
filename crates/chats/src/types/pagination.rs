//! OFFSET/LIMIT pagination shared by chat and message listings.

use serde::Serialize;
use utoipa::ToSchema;

use crate::entities::{Chat, ChatMessage};

/// One page of a listing, as returned to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[aliases(ChatPage = Page<Chat>, MessagePage = Page<ChatMessage>)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub records: Vec<T>,
    pub count: i64,
    pub has_more: bool,
}

impl<T> Page<T> {
    /// `has_more` holds when rows exist past the end of this page.
    pub fn new(records: Vec<T>, count: i64, request: PageRequest) -> Self {
        let seen = request.offset() + records.len() as i64;
        Self {
            has_more: count > seen,
            records,
            count,
        }
    }
}

/// A 1-based page number paired with the configured page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page_number: i64,
    page_size: i64,
}

impl PageRequest {
    /// Missing, zero or negative page numbers resolve to the first page.
    pub fn new(page_number: Option<i64>, page_size: i64) -> Self {
        Self {
            page_number: page_number.filter(|page| *page > 0).unwrap_or(1),
            page_size: page_size.max(1),
        }
    }

    pub fn page_number(&self) -> i64 {
        self.page_number
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        self.page_size.saturating_mul(self.page_number - 1)
    }
}
