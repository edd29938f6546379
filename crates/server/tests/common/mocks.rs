//! Test doubles for the holotree and the upstream puller.

use async_trait::async_trait;
use holopeer_holotree::{Catalog, Holotree, HolotreeResult};
use holopeer_server::upstream::{PullError, PullReport};
use holopeer_server::workers::Puller;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;

/// Holotree wrapper that counts catalog loads.
#[allow(dead_code)]
pub struct CountingHolotree {
    inner: Arc<dyn Holotree>,
    loads: AtomicUsize,
}

#[allow(dead_code)]
impl CountingHolotree {
    pub fn new(inner: Arc<dyn Holotree>) -> Self {
        Self {
            inner,
            loads: AtomicUsize::new(0),
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Holotree for CountingHolotree {
    fn hololib_root(&self) -> &Path {
        self.inner.hololib_root()
    }

    async fn catalogs(&self) -> HolotreeResult<Vec<String>> {
        self.inner.catalogs().await
    }

    async fn load_catalog(&self, name: &str) -> HolotreeResult<Catalog> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load_catalog(name).await
    }

    async fn catalog_modified(&self, name: &str) -> HolotreeResult<Option<SystemTime>> {
        self.inner.catalog_modified(name).await
    }

    async fn has_blob(&self, digest: &str) -> HolotreeResult<bool> {
        self.inner.has_blob(digest).await
    }
}

/// Puller that reports every requested catalog on a channel.
#[allow(dead_code)]
pub struct RecordingPuller {
    pulled: mpsc::UnboundedSender<String>,
}

#[allow(dead_code)]
impl RecordingPuller {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (pulled, receiver) = mpsc::unbounded_channel();
        (Self { pulled }, receiver)
    }
}

#[async_trait]
impl Puller for RecordingPuller {
    fn origin(&self) -> &str {
        "http://upstream.test"
    }

    async fn pull(&self, catalog: &str) -> Result<PullReport, PullError> {
        let _ = self.pulled.send(catalog.to_string());
        Ok(PullReport::default())
    }
}

/// Next pulled catalog, or `None` if nothing arrives within a second.
#[allow(dead_code)]
pub async fn next_pull(receiver: &mut mpsc::UnboundedReceiver<String>) -> Option<String> {
    tokio::time::timeout(Duration::from_secs(1), receiver.recv())
        .await
        .ok()
        .flatten()
}
