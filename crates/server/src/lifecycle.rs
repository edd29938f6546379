//! Startup and shutdown.
//!
//! Startup clears stale holdfiles, opens the hololib, resolves identities,
//! starts the workers and binds the listener. Shutdown stops accepting
//! connections, lets in-flight requests finish within the grace period,
//! closes the worker queues, waits for the workers and clears holdfiles
//! again.

use crate::identity::{PeerIdentity, load_or_create_installation_id};
use crate::routes::create_router;
use crate::state::{AppState, Workers};
use crate::upstream::UpstreamClient;
use crate::workers::Puller;
use anyhow::{Context, Result};
use holopeer_core::config::AppConfig;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Extension of transient holdfiles.
pub const HOLD_EXTENSION: &str = "hld";

/// Create `dir` if needed and delete every `*.hld` file directly inside it.
/// Returns the number of files removed.
pub async fn clean_hold_dir(dir: &Path) -> std::io::Result<usize> {
    tokio::fs::create_dir_all(dir).await?;
    let mut removed = 0;
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_hold = path
            .extension()
            .is_some_and(|extension| extension == HOLD_EXTENSION);
        if !is_hold || !entry.file_type().await?.is_file() {
            continue;
        }
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                removed += 1;
                debug!(path = %path.display(), "holdfile removed");
            }
            Err(err) => warn!(path = %path.display(), error = %err, "could not remove holdfile"),
        }
    }
    Ok(removed)
}

/// Everything needed before the listener starts.
pub async fn prepare(config: AppConfig) -> Result<(AppState, Workers)> {
    config.validate().context("invalid configuration")?;

    let hold_dir = config.storage.hold_dir();
    let removed = clean_hold_dir(&hold_dir)
        .await
        .with_context(|| format!("failed to prepare hold directory {}", hold_dir.display()))?;
    info!(hold_dir = %hold_dir.display(), removed, "hold directory ready");

    tokio::fs::create_dir_all(&config.storage.scratch_dir)
        .await
        .with_context(|| {
            format!(
                "failed to create scratch directory {}",
                config.storage.scratch_dir.display()
            )
        })?;

    let holotree = holopeer_holotree::from_config(&config.holotree)
        .await
        .context("failed to open hololib")?;
    info!(hololib = %config.holotree.hololib.display(), "hololib opened");

    let installation = load_or_create_installation_id(&config)
        .await
        .context("failed to resolve installation identity")?;
    let identity = PeerIdentity::new(installation);

    let puller: Option<Arc<dyn Puller>> = match config.upstream.resolved_origin() {
        Some(origin) => {
            let client = UpstreamClient::new(
                &origin,
                holotree.clone(),
                config.storage.scratch_dir.clone(),
                &identity,
                config.upstream.timeout(),
            )
            .context("failed to create upstream client")?;
            info!(origin = %origin, "upstream origin configured");
            Some(Arc::new(client))
        }
        None => {
            info!("no upstream origin configured, refresh requests will only be logged");
            None
        }
    };

    Ok(AppState::start(config, holotree, identity, puller))
}

/// Serve until `shutdown` is cancelled, then drain and stop the workers.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    workers: Workers,
    shutdown: CancellationToken,
) -> Result<()> {
    let grace = state.config.server.shutdown_grace();
    let hold_dir = state.config.storage.hold_dir();
    let app = create_router(state);

    let signal = shutdown.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            signal.cancelled().await;
            info!("shutdown requested, draining connections");
        })
        .into_future();

    let deadline = async {
        shutdown.cancelled().await;
        tokio::time::sleep(grace).await;
    };
    tokio::select! {
        result = server => result.context("server error")?,
        _ = deadline => warn!(grace_secs = grace.as_secs(), "grace period elapsed, closing remaining connections"),
    }

    workers.join(grace).await;
    let removed = clean_hold_dir(&hold_dir)
        .await
        .with_context(|| format!("failed to clean hold directory {}", hold_dir.display()))?;
    info!(removed, "peer stopped");
    Ok(())
}

/// Prepare, bind and serve until `shutdown` is cancelled.
pub async fn run(config: AppConfig, shutdown: CancellationToken) -> Result<()> {
    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    let (state, workers) = prepare(config).await?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    info!("Listening on {}", addr);

    serve(listener, state, workers, shutdown).await
}

/// Cancel `token` on SIGINT, SIGHUP or SIGTERM.
#[cfg(unix)]
pub fn spawn_signal_listener(token: CancellationToken) -> Result<tokio::task::JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt()).context("failed to register SIGINT")?;
    let mut sighup = signal(SignalKind::hangup()).context("failed to register SIGHUP")?;
    let mut sigterm = signal(SignalKind::terminate()).context("failed to register SIGTERM")?;
    Ok(tokio::spawn(async move {
        let name = tokio::select! {
            _ = sigint.recv() => "SIGINT",
            _ = sighup.recv() => "SIGHUP",
            _ = sigterm.recv() => "SIGTERM",
            _ = token.cancelled() => return,
        };
        info!(signal = name, "signal received");
        token.cancel();
    }))
}

/// Cancel `token` on Ctrl-C.
#[cfg(not(unix))]
pub fn spawn_signal_listener(token: CancellationToken) -> Result<tokio::task::JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(err) = result {
                    warn!(error = %err, "failed to listen for Ctrl-C");
                    return;
                }
            }
            _ = token.cancelled() => return,
        }
        info!(signal = "ctrl-c", "signal received");
        token.cancel();
    }))
}
