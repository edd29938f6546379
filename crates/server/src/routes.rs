//! Route configuration.

use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::routing::post;
use tower_http::timeout::{RequestBodyTimeoutLayer, TimeoutLayer};
use tower_http::trace::TraceLayer;

/// Create the application router.
///
/// Catalog routes take the last path segment as the catalog name, so
/// `/parts/any/prefix/<catalog>` is the same as `/parts/<catalog>`.
pub fn create_router(state: AppState) -> Router {
    let server = &state.config.server;
    let read_timeout = server.read_timeout();
    let write_timeout = server.write_timeout();
    let max_header_bytes = server.max_header_bytes;
    let metrics_enabled = server.metrics_enabled;

    let mut router = Router::new()
        .route("/parts/{*catalog}", get(handlers::get_parts))
        .route("/delta/{*catalog}", post(handlers::post_delta))
        .route(
            "/force/{*catalog}",
            post(handlers::force_pull).get(handlers::force_pull),
        )
        .route("/health", get(handlers::health_check));

    if metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    // Order of execution: TraceLayer -> response timeout -> body timeout -> header limit -> handler
    router
        .layer(middleware::from_fn_with_state(
            max_header_bytes,
            header_limit_middleware,
        ))
        .layer(RequestBodyTimeoutLayer::new(read_timeout))
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, write_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Reject requests whose headers exceed `limit` bytes in total.
async fn header_limit_middleware(
    State(limit): State<usize>,
    request: Request,
    next: Next,
) -> Response {
    let size: usize = request
        .headers()
        .iter()
        .map(|(name, value)| name.as_str().len() + value.len() + 4)
        .sum();
    if size > limit {
        tracing::debug!(size, limit, "request headers too large");
        return StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE.into_response();
    }
    next.run(request).await
}
