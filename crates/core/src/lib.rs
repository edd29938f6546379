//! Core primitives for the holotree catalog peer.
//!
//! This crate defines the pieces shared by the holotree adapter and the
//! peer server:
//! - Rolling hash and stream locator over a fixed seedling table
//! - Sorted set helpers used for catalog parts listings
//! - SHA-256 content identities for delta artifacts
//! - Configuration types

pub mod config;
pub mod error;
pub mod hash;
pub mod rolling;
pub mod set;

pub use error::{Error, Result};
pub use hash::{ContentHash, ContentHasher};
pub use rolling::{Locator, RollingHash, WriteLocator};

/// Capacity of the catalog parts cache and of the pull request queue.
pub const DEFAULT_QUEUE_SIZE: usize = 20;

/// Candidate digests must be longer than this to be considered at all.
pub const MIN_DIGEST_LEN: usize = 10;

/// Header carrying the per-process random identity of a peer.
pub const RANDOM_IDENTITY_HEADER: &str = "x-rcc-random-identity";

/// Header carrying the stable installation identity on outbound requests.
pub const INSTALLATION_ID_HEADER: &str = "robocorp-installation-id";
