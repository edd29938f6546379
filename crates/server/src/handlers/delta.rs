//! Delta archive endpoint.

use crate::delta::read_approved;
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{catalog_name, reject_self_request};
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{IntoResponse, Response};
use futures::TryStreamExt;
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::debug;

/// POST /delta/{catalog}
///
/// The body lists digests the client wants, one per line. The response is a
/// ZIP holding those blobs that belong to the catalog, plus the catalog.
pub async fn post_delta(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> ApiResult<Response> {
    reject_self_request(&state, &headers)?;
    let catalog = catalog_name(&path);

    let Some(listing) = state.parts.query(&catalog).await else {
        return Err(ApiError::CatalogNotFound(catalog));
    };

    let stream = body.into_data_stream().map_err(std::io::Error::other);
    let request = read_approved(StreamReader::new(stream), &listing).await;
    debug!(
        catalog = %catalog,
        requested = request.requested,
        approved = request.approved.len(),
        "delta request parsed"
    );

    let artifact = state.delta.build(&catalog, &request.approved).await?;
    let file = tokio::fs::File::open(&artifact.path)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to open delta archive: {e}")))?;
    let length = file
        .metadata()
        .await
        .map_err(|e| ApiError::Internal(format!("failed to stat delta archive: {e}")))?
        .len();

    let mut response = Body::from_stream(ReaderStream::new(file)).into_response();
    let response_headers = response.headers_mut();
    response_headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/zip"));
    response_headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    Ok(response)
}
