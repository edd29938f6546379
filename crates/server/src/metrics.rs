//! Prometheus metrics for the catalog peer.
//!
//! Covers the parts cache, delta archive construction and upstream pulls.
//! Metrics carry no catalog names or digests.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Parts cache metrics
pub static PARTS_CACHE_HITS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "holopeer_parts_cache_hits_total",
        "Parts queries answered from the in-memory cache",
    )
    .expect("metric creation failed")
});

pub static PARTS_CACHE_MISSES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "holopeer_parts_cache_misses_total",
        "Parts queries that had to load a catalog",
    )
    .expect("metric creation failed")
});

pub static PARTS_UNKNOWN: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "holopeer_parts_unknown_total",
        "Parts queries for catalogs not present locally",
    )
    .expect("metric creation failed")
});

pub static PARTS_CACHE_ENTRIES: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "holopeer_parts_cache_entries",
        "Catalog listings currently cached",
    )
    .expect("metric creation failed")
});

// Delta metrics
pub static DELTA_BUILDS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "holopeer_delta_builds_total",
        "Delta archives built and published",
    )
    .expect("metric creation failed")
});

pub static DELTA_REUSES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "holopeer_delta_reuses_total",
        "Delta requests served from an already published archive",
    )
    .expect("metric creation failed")
});

pub static DELTA_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "holopeer_delta_failures_total",
        "Delta archive builds that failed",
    )
    .expect("metric creation failed")
});

pub static DELTA_BUILD_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "holopeer_delta_build_duration_seconds",
            "Time taken to build one delta archive",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
    )
    .expect("metric creation failed")
});

// Pull metrics
pub static PULL_REQUESTS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "holopeer_pull_requests_total",
        "Catalog refresh requests taken off the pull queue",
    )
    .expect("metric creation failed")
});

pub static PULL_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "holopeer_pull_failures_total",
        "Catalog pulls that failed",
    )
    .expect("metric creation failed")
});

pub static PULL_SKIPPED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "holopeer_pull_skipped_total",
        "Refresh requests dropped because no upstream origin is configured or the queue was full",
    )
    .expect("metric creation failed")
});

static REGISTER: Once = Once::new();

/// Register all metrics with the global registry.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        REGISTRY
            .register(Box::new(PARTS_CACHE_HITS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PARTS_CACHE_MISSES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PARTS_UNKNOWN.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PARTS_CACHE_ENTRIES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(DELTA_BUILDS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(DELTA_REUSES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(DELTA_FAILURES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(DELTA_BUILD_DURATION.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PULL_REQUESTS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PULL_FAILURES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PULL_SKIPPED.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}
