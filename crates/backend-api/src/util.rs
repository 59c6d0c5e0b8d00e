use axum::http::{header::AUTHORIZATION, HeaderMap};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::ApiError;

pub fn require_bearer(headers: &HeaderMap) -> Result<String, ApiError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("missing authorization header"))?;

    let (scheme, token) = value.trim().split_once(' ').unwrap_or((value.trim(), ""));
    if !scheme.eq_ignore_ascii_case("Bearer") {
        return Err(ApiError::unauthorized("invalid authorization scheme"));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(ApiError::unauthorized("missing bearer token"));
    }

    Ok(token.to_string())
}

/// `?pageNumber=` of the paged listings. Kept as text so that garbage
/// falls back to the first page instead of failing the request.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    /// 1-based page number, defaults to 1
    pub page_number: Option<String>,
}

impl PageQuery {
    pub fn page_number(&self) -> Option<i64> {
        self.page_number
            .as_deref()
            .and_then(|value| value.trim().parse::<i64>().ok())
            .filter(|page| *page > 0)
    }
}
