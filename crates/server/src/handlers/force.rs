//! Forced catalog refresh endpoint.

use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{catalog_name, reject_self_request};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use tracing::info;

/// POST /force/{catalog}
///
/// Queues a pull of the catalog, waiting for queue space if needed, and
/// returns once it is queued. The pull outcome is only visible in logs and
/// metrics.
pub async fn force_pull(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    reject_self_request(&state, &headers)?;
    let catalog = catalog_name(&path);
    if !state.pulls.request(&catalog).await {
        return Err(ApiError::QueueClosed);
    }
    info!(catalog = %catalog, "forced refresh queued");
    Ok(StatusCode::OK)
}
