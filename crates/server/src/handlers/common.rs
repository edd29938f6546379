//! Shared handler helpers.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::http::HeaderMap;

/// Catalog name of a request path: its last non-empty segment.
pub fn catalog_name(path: &str) -> String {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Refuse requests that carry this peer's own random identity.
pub fn reject_self_request(state: &AppState, headers: &HeaderMap) -> ApiResult<()> {
    if state.identity.is_self(headers) {
        return Err(ApiError::SelfRequest);
    }
    Ok(())
}
