//! Catalog parts provider.
//!
//! One task owns a bounded cache of catalog listings and answers queries
//! arriving on a channel, one at a time. A listing is the sorted set of blob
//! digests of a catalog joined by newlines.
//!
//! Replies travel on a oneshot channel. Dropping the reply sender without a
//! value tells the caller the catalog is unknown here.

use crate::metrics::{PARTS_CACHE_ENTRIES, PARTS_CACHE_HITS, PARTS_CACHE_MISSES, PARTS_UNKNOWN};
use holopeer_core::set;
use holopeer_holotree::{Holotree, HolotreeError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

/// One parts query.
#[derive(Debug)]
pub struct PartsQuery {
    pub catalog: String,
    pub reply: oneshot::Sender<Arc<str>>,
}

/// Caller side of the parts provider.
#[derive(Clone, Debug)]
pub struct PartsHandle {
    sender: mpsc::Sender<PartsQuery>,
}

impl PartsHandle {
    pub fn new(sender: mpsc::Sender<PartsQuery>) -> Self {
        Self { sender }
    }

    /// Listing of `catalog`, or `None` when the catalog is unknown or the
    /// provider has stopped.
    pub async fn query(&self, catalog: &str) -> Option<Arc<str>> {
        let (reply, answer) = oneshot::channel();
        let query = PartsQuery {
            catalog: catalog.to_string(),
            reply,
        };
        self.sender.send(query).await.ok()?;
        answer.await.ok()
    }
}

#[derive(Debug)]
struct CachedListing {
    listing: Arc<str>,
    modified: Option<SystemTime>,
}

/// Bounded map of catalog listings.
///
/// Admission order is tracked in a ring of `capacity` slots. Admitting a new
/// catalog evicts whatever catalog last occupied the slot at
/// `cursor % capacity`, so the map never holds more than `capacity` entries.
#[derive(Debug)]
pub struct PartsCache {
    entries: HashMap<String, CachedListing>,
    ring: Vec<Option<String>>,
    cursor: u64,
}

impl PartsCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: HashMap::with_capacity(capacity),
            ring: vec![None; capacity],
            cursor: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.ring.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, catalog: &str) -> bool {
        self.entries.contains_key(catalog)
    }

    pub fn get(&self, catalog: &str) -> Option<Arc<str>> {
        self.entries.get(catalog).map(|entry| entry.listing.clone())
    }

    fn modified(&self, catalog: &str) -> Option<SystemTime> {
        self.entries.get(catalog).and_then(|entry| entry.modified)
    }

    /// Admit a catalog that is not cached yet, evicting the ring occupant.
    pub fn admit(&mut self, catalog: String, listing: Arc<str>, modified: Option<SystemTime>) {
        if let Some(entry) = self.entries.get_mut(&catalog) {
            *entry = CachedListing { listing, modified };
            return;
        }
        let slot = (self.cursor % self.ring.len() as u64) as usize;
        if let Some(evicted) = self.ring[slot].take() {
            trace!(catalog = %evicted, "parts cache eviction");
            self.entries.remove(&evicted);
        }
        self.ring[slot] = Some(catalog.clone());
        self.entries.insert(catalog, CachedListing { listing, modified });
        self.cursor += 1;
    }
}

/// Sorted digests of `catalog` joined by newlines.
async fn load_listing(holotree: &dyn Holotree, catalog: &str) -> Result<Arc<str>, HolotreeError> {
    let known = holotree.catalogs().await?;
    if !set::member(&known, &catalog.to_string()) {
        return Err(HolotreeError::CatalogNotFound(catalog.to_string()));
    }
    let digests = holotree.load_catalog(catalog).await?.digest_map();
    let keys: Vec<&str> = digests.keys().map(String::as_str).collect();
    Ok(Arc::from(keys.join("\n")))
}

/// Whether the cached listing predates the catalog file on disk.
async fn is_stale(holotree: &dyn Holotree, cache: &PartsCache, catalog: &str) -> bool {
    match holotree.catalog_modified(catalog).await {
        Ok(current) => current.is_none() || current != cache.modified(catalog),
        Err(_) => true,
    }
}

/// Serve parts queries until every sender is gone.
pub async fn run_parts_provider(
    holotree: Arc<dyn Holotree>,
    mut queries: mpsc::Receiver<PartsQuery>,
    mut cache: PartsCache,
    revalidate: bool,
) {
    info!(capacity = cache.capacity(), revalidate, "parts provider started");
    while let Some(PartsQuery { catalog, reply }) = queries.recv().await {
        let mut cached = cache.get(&catalog);
        if cached.is_some() && revalidate && is_stale(holotree.as_ref(), &cache, &catalog).await {
            debug!(catalog = %catalog, "cached listing outdated");
            cached = None;
        }
        if let Some(listing) = cached {
            PARTS_CACHE_HITS.inc();
            trace!(catalog = %catalog, "parts cache hit");
            let _ = reply.send(listing);
            continue;
        }

        PARTS_CACHE_MISSES.inc();
        match load_listing(holotree.as_ref(), &catalog).await {
            Ok(listing) => {
                let modified = holotree.catalog_modified(&catalog).await.ok().flatten();
                cache.admit(catalog.clone(), listing.clone(), modified);
                PARTS_CACHE_ENTRIES.set(cache.len() as i64);
                debug!(catalog = %catalog, cached = cache.len(), "parts listing loaded");
                let _ = reply.send(listing);
            }
            Err(err) => {
                PARTS_UNKNOWN.inc();
                debug!(catalog = %catalog, error = %err, "parts query unanswered");
                drop(reply);
            }
        }
    }
    info!("parts provider stopped");
}

/// Start the parts provider task.
pub fn spawn_parts_provider(
    holotree: Arc<dyn Holotree>,
    queue_capacity: usize,
    cache_capacity: usize,
    revalidate: bool,
) -> (PartsHandle, JoinHandle<()>) {
    let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
    let task = tokio::spawn(run_parts_provider(
        holotree,
        receiver,
        PartsCache::new(cache_capacity),
        revalidate,
    ));
    (PartsHandle::new(sender), task)
}
