//! HTTP peer for holotree catalogs.
//!
//! This crate provides the peer service:
//! - Parts listings of local catalogs, served from a bounded cache
//! - Delta archives of requested blobs, built once and reused
//! - Background pulls of unknown catalogs from an upstream origin
//! - Startup and graceful shutdown of the listener and workers

pub mod delta;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod lifecycle;
pub mod metrics;
pub mod routes;
pub mod state;
pub mod upstream;
pub mod workers;

pub use delta::{DeltaArtifact, DeltaBuilder, DeltaError};
pub use error::ApiError;
pub use identity::PeerIdentity;
pub use routes::create_router;
pub use state::{AppState, Workers};
pub use upstream::{PullError, PullReport, UpstreamClient};
