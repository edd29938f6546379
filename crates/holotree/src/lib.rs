//! Holotree library access for the catalog peer.
//!
//! This crate provides:
//! - The `Holotree` trait over a content-addressed library of blobs and
//!   gzip-compressed JSON catalogs
//! - A local directory backend (`Hololib`)
//! - ZIP helpers for packing delta archives and unpacking them on import

pub mod archive;
pub mod backends;
pub mod catalog;
pub mod error;
pub mod traits;

pub use archive::{extract_into, zip_append};
pub use backends::hololib::Hololib;
pub use catalog::{Catalog, Dir, File};
pub use error::{HolotreeError, HolotreeResult};
pub use traits::{Holotree, blob_relative_path, validate_catalog_name, validate_digest};

use holopeer_core::config::HolotreeConfig;
use std::sync::Arc;

/// Open the holotree named by the configuration.
pub async fn from_config(config: &HolotreeConfig) -> HolotreeResult<Arc<dyn Holotree>> {
    if config.hololib.as_os_str().is_empty() {
        return Err(HolotreeError::Config("holotree.hololib is empty".to_string()));
    }
    let backend = Hololib::new(&config.hololib).await?;
    Ok(Arc::new(backend))
}
