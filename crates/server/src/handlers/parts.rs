//! Catalog parts listing endpoint.

use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{catalog_name, reject_self_request};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use tracing::debug;

/// GET /parts/{catalog}
///
/// Unknown catalogs answer 404 and queue a background refresh from the
/// upstream origin without waiting for queue space.
pub async fn get_parts(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    reject_self_request(&state, &headers)?;
    let catalog = catalog_name(&path);

    match state.parts.query(&catalog).await {
        Some(listing) => Ok((
            [(header::CONTENT_TYPE, "text/plain")],
            listing.to_string(),
        )
            .into_response()),
        None => {
            let queued = state.pulls.try_request(&catalog);
            debug!(catalog = %catalog, queued, "unknown catalog, refresh requested");
            Err(ApiError::CatalogNotFound(catalog))
        }
    }
}
