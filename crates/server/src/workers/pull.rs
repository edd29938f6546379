//! Catalog pull worker.
//!
//! Refresh requests queue up in a bounded channel and a single task pulls
//! them from the upstream origin one after another. Failures are logged and
//! the worker moves on; nothing is retried.

use crate::metrics::{PULL_FAILURES, PULL_REQUESTS, PULL_SKIPPED};
use crate::upstream::{PullError, PullReport};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Something that can bring a catalog and its missing blobs into the local
/// holotree.
#[async_trait]
pub trait Puller: Send + Sync + 'static {
    /// Where catalogs are pulled from, for log lines.
    fn origin(&self) -> &str;

    async fn pull(&self, catalog: &str) -> Result<PullReport, PullError>;
}

/// Caller side of the pull worker.
#[derive(Clone, Debug)]
pub struct PullHandle {
    sender: mpsc::Sender<String>,
}

impl PullHandle {
    pub fn new(sender: mpsc::Sender<String>) -> Self {
        Self { sender }
    }

    /// Queue a refresh without waiting. Returns false when the queue is full
    /// or the worker has stopped.
    pub fn try_request(&self, catalog: &str) -> bool {
        match self.sender.try_send(catalog.to_string()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                PULL_SKIPPED.inc();
                debug!(catalog = %catalog, "pull queue full, refresh dropped");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Queue a refresh, waiting for queue space. Returns false when the
    /// worker has stopped.
    pub async fn request(&self, catalog: &str) -> bool {
        self.sender.send(catalog.to_string()).await.is_ok()
    }
}

/// Consume refresh requests until every sender is gone.
///
/// Without a puller every request is drained and logged.
pub async fn run_pull_worker(puller: Option<Arc<dyn Puller>>, mut requests: mpsc::Receiver<String>) {
    match &puller {
        Some(puller) => info!(origin = %puller.origin(), "pull worker started"),
        None => info!("pull worker started without upstream origin"),
    }

    let mut counter: u64 = 0;
    while let Some(catalog) = requests.recv().await {
        counter += 1;
        PULL_REQUESTS.inc();
        let Some(puller) = &puller else {
            PULL_SKIPPED.inc();
            info!(counter, catalog = %catalog, "no upstream origin, ignoring pull request");
            continue;
        };

        info!(counter, catalog = %catalog, origin = %puller.origin(), "pulling catalog");
        match puller.pull(&catalog).await {
            Ok(report) => info!(
                counter,
                catalog = %catalog,
                missing = report.missing,
                extracted = report.extracted,
                "catalog pulled"
            ),
            Err(err) => {
                PULL_FAILURES.inc();
                warn!(counter, catalog = %catalog, error = %err, "catalog pull failed");
            }
        }
    }
    info!(handled = counter, "pull worker stopped");
}

/// Start the pull worker task.
pub fn spawn_pull_worker(
    puller: Option<Arc<dyn Puller>>,
    queue_capacity: usize,
) -> (PullHandle, JoinHandle<()>) {
    let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
    let task = tokio::spawn(run_pull_worker(puller, receiver));
    (PullHandle::new(sender), task)
}
