//! Local hololib directory backend.

use crate::catalog::Catalog;
use crate::error::{HolotreeError, HolotreeResult};
use crate::traits::{CATALOG_DIR, Holotree, LIBRARY_DIR, looks_like_catalog};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tracing::{debug, instrument};

/// Holotree library stored in a local directory.
///
/// Layout: `<root>/catalog/<name>` for catalog documents and
/// `<root>/library/aa/bb/cc/<digest>` for blobs.
pub struct Hololib {
    root: PathBuf,
}

impl Hololib {
    /// Open a hololib, creating its catalog and library directories.
    pub async fn new(root: impl AsRef<Path>) -> HolotreeResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(CATALOG_DIR)).await?;
        fs::create_dir_all(root.join(LIBRARY_DIR)).await?;
        Ok(Self { root })
    }

    /// Open a hololib without touching the filesystem.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn list_catalogs_sync(dir: &Path) -> HolotreeResult<Vec<String>> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if looks_like_catalog(&name) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl Holotree for Hololib {
    fn hololib_root(&self) -> &Path {
        &self.root
    }

    #[instrument(skip(self), fields(backend = "hololib"))]
    async fn catalogs(&self) -> HolotreeResult<Vec<String>> {
        let dir = self.catalog_dir();
        tokio::task::spawn_blocking(move || Self::list_catalogs_sync(&dir)).await?
    }

    #[instrument(skip(self), fields(backend = "hololib"))]
    async fn load_catalog(&self, name: &str) -> HolotreeResult<Catalog> {
        let path = self.catalog_path(name)?;
        let name = name.to_string();
        let catalog = tokio::task::spawn_blocking(move || {
            let file = std::fs::File::open(&path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    HolotreeError::CatalogNotFound(name.clone())
                } else {
                    HolotreeError::Io(e)
                }
            })?;
            Catalog::from_gzip_reader(&name, file)
        })
        .await??;
        debug!("catalog loaded");
        Ok(catalog)
    }

    async fn catalog_modified(&self, name: &str) -> HolotreeResult<Option<SystemTime>> {
        let path = self.catalog_path(name)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.modified().ok()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn has_blob(&self, digest: &str) -> HolotreeResult<bool> {
        let path = self.absolute_path(digest)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}
