//! Holotree trait definitions.

use crate::catalog::Catalog;
use crate::error::{HolotreeError, HolotreeResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Directory of catalog documents, relative to the hololib root.
pub const CATALOG_DIR: &str = "catalog";

/// Directory of content blobs, relative to the hololib root.
pub const LIBRARY_DIR: &str = "library";

/// Shortest digest that can be sharded into a library path.
pub const MIN_SHARDED_DIGEST_LEN: usize = 6;

/// Read access to a local holotree library.
///
/// Path helpers are synchronous and purely lexical; anything touching the
/// filesystem is async.
#[async_trait]
pub trait Holotree: Send + Sync + 'static {
    /// Root directory of the library.
    fn hololib_root(&self) -> &Path;

    /// Directory holding catalog documents.
    fn catalog_dir(&self) -> PathBuf {
        self.hololib_root().join(CATALOG_DIR)
    }

    /// Absolute path of a catalog document.
    fn catalog_path(&self, name: &str) -> HolotreeResult<PathBuf> {
        validate_catalog_name(name)?;
        Ok(self.catalog_dir().join(name))
    }

    /// Archive path of a catalog document, relative to the library root.
    fn catalog_relative_path(&self, name: &str) -> HolotreeResult<String> {
        validate_catalog_name(name)?;
        Ok(format!("{CATALOG_DIR}/{name}"))
    }

    /// Sharded path of a blob, relative to the library root.
    fn relative_path(&self, digest: &str) -> HolotreeResult<String> {
        blob_relative_path(digest)
    }

    /// Absolute path of a blob.
    fn absolute_path(&self, digest: &str) -> HolotreeResult<PathBuf> {
        Ok(self.hololib_root().join(self.relative_path(digest)?))
    }

    /// Names of the catalogs present, sorted.
    async fn catalogs(&self) -> HolotreeResult<Vec<String>>;

    /// Load and parse a catalog document.
    async fn load_catalog(&self, name: &str) -> HolotreeResult<Catalog>;

    /// Modification time of a catalog document, if it exists.
    async fn catalog_modified(&self, name: &str) -> HolotreeResult<Option<SystemTime>>;

    /// Whether the blob for `digest` is present.
    async fn has_blob(&self, digest: &str) -> HolotreeResult<bool>;
}

/// `library/aa/bb/cc/<digest>` for a digest `aabbcc...`.
pub fn blob_relative_path(digest: &str) -> HolotreeResult<String> {
    validate_digest(digest)?;
    Ok(format!(
        "{LIBRARY_DIR}/{}/{}/{}/{digest}",
        &digest[0..2],
        &digest[2..4],
        &digest[4..6]
    ))
}

/// Digests are single path components made of ASCII alphanumerics.
pub fn validate_digest(digest: &str) -> HolotreeResult<()> {
    if digest.len() < MIN_SHARDED_DIGEST_LEN {
        return Err(HolotreeError::InvalidDigest(format!(
            "too short: {digest:?}"
        )));
    }
    if !digest.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(HolotreeError::InvalidDigest(format!(
            "unexpected characters: {digest:?}"
        )));
    }
    Ok(())
}

/// Catalog names must be a single plain file name.
pub fn validate_catalog_name(name: &str) -> HolotreeResult<()> {
    if name.is_empty()
        || name == "."
        || name.contains("..")
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        return Err(HolotreeError::InvalidCatalogName(name.to_string()));
    }
    Ok(())
}

/// Catalog file names start with a lowercase hex digit and carry a
/// platform suffix after a dot.
pub fn looks_like_catalog(name: &str) -> bool {
    name.starts_with(|c: char| c.is_ascii_digit() || ('a'..='f').contains(&c)) && name.contains('.')
}
