//! Application state shared across handlers.

use crate::delta::DeltaBuilder;
use crate::identity::PeerIdentity;
use crate::workers::{PartsHandle, PullHandle, Puller, spawn_parts_provider, spawn_pull_worker};
use holopeer_core::config::AppConfig;
use holopeer_holotree::Holotree;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::warn;

/// Background worker tasks.
///
/// Workers exit once every clone of the `AppState` that feeds them is gone.
pub struct Workers {
    pub parts: JoinHandle<()>,
    pub pulls: JoinHandle<()>,
}

impl Workers {
    /// Wait for both workers, aborting whatever is still running after
    /// `limit`.
    pub async fn join(self, limit: Duration) {
        let Workers { mut parts, mut pulls } = self;
        let joined = tokio::time::timeout(limit, async {
            let _ = (&mut parts).await;
            let _ = (&mut pulls).await;
        })
        .await;
        if joined.is_err() {
            warn!(limit_secs = limit.as_secs(), "workers still busy, aborting them");
            parts.abort();
            pulls.abort();
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Local holotree library.
    pub holotree: Arc<dyn Holotree>,
    /// Identities of this peer.
    pub identity: Arc<PeerIdentity>,
    /// Parts provider queue.
    pub parts: PartsHandle,
    /// Pull worker queue.
    pub pulls: PullHandle,
    /// Delta archive builder.
    pub delta: Arc<DeltaBuilder>,
}

impl AppState {
    /// Start the workers and assemble the state that feeds them.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(
        config: AppConfig,
        holotree: Arc<dyn Holotree>,
        identity: PeerIdentity,
        puller: Option<Arc<dyn Puller>>,
    ) -> (Self, Workers) {
        let (parts, parts_task) = spawn_parts_provider(
            holotree.clone(),
            config.cache.parts_queue_capacity,
            config.cache.parts_capacity,
            config.cache.revalidate_on_lookup,
        );
        let (pulls, pulls_task) = spawn_pull_worker(puller, config.cache.pull_queue_capacity);
        let delta = DeltaBuilder::new(
            holotree.clone(),
            config.storage.scratch_dir.clone(),
            config.delta.order_sensitive_identity,
        );

        let state = Self {
            config: Arc::new(config),
            holotree,
            identity: Arc::new(identity),
            parts,
            pulls,
            delta: Arc::new(delta),
        };
        let workers = Workers {
            parts: parts_task,
            pulls: pulls_task,
        };
        (state, workers)
    }
}
