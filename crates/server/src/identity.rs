//! Peer identities.
//!
//! Every process picks a random identity at startup and sends it on its own
//! outbound requests, which lets a peer recognise and refuse requests that
//! loop back to itself. The installation identity is stable across restarts.

use axum::http::HeaderMap;
use holopeer_core::RANDOM_IDENTITY_HEADER;
use holopeer_core::config::AppConfig;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

/// User agent sent on outbound requests.
pub const USER_AGENT: &str = concat!("holopeer/", env!("CARGO_PKG_VERSION"));

/// Identities of this peer.
#[derive(Clone, Debug)]
pub struct PeerIdentity {
    /// Random per-process identity.
    pub random: String,
    /// Stable installation identity.
    pub installation: String,
}

impl PeerIdentity {
    pub fn new(installation: impl Into<String>) -> Self {
        Self {
            random: Uuid::new_v4().simple().to_string(),
            installation: installation.into(),
        }
    }

    /// Whether the request carries this process's own random identity.
    pub fn is_self(&self, headers: &HeaderMap) -> bool {
        headers
            .get(RANDOM_IDENTITY_HEADER)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.trim() == self.random)
    }
}

/// Installation identity from config, else the one persisted under the
/// storage root, else a freshly generated one that gets persisted.
pub async fn load_or_create_installation_id(config: &AppConfig) -> std::io::Result<String> {
    if let Some(id) = config
        .upstream
        .installation_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
    {
        return Ok(id.to_string());
    }

    let path = config.storage.installation_id_path();
    if let Some(id) = read_installation_id(&path).await? {
        return Ok(id);
    }

    let id = Uuid::new_v4().to_string();
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, format!("{id}\n")).await?;
    info!(path = %path.display(), "installation identity created");
    Ok(id)
}

async fn read_installation_id(path: &Path) -> std::io::Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => {
            let id = text.trim();
            Ok((!id.is_empty()).then(|| id.to_string()))
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}
