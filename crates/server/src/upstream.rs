//! Upstream peer client.
//!
//! Pulling a catalog asks the origin for its parts listing, keeps only the
//! digests whose blobs are missing locally, requests a delta archive of
//! those and unpacks it into the local hololib.

use crate::identity::{PeerIdentity, USER_AGENT};
use crate::workers::pull::Puller;
use async_trait::async_trait;
use futures::StreamExt;
use holopeer_core::{ContentHash, INSTALLATION_ID_HEADER, RANDOM_IDENTITY_HEADER};
use holopeer_holotree::{Holotree, HolotreeError, extract_into};
use reqwest::header::{HeaderMap, HeaderValue};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

/// Upstream pull errors.
#[derive(Debug, thiserror::Error)]
pub enum PullError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("invalid header value: {0}")]
    Header(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("holotree error: {0}")]
    Holotree(#[from] HolotreeError),

    #[error("blocking task failed: {0}")]
    Task(String),
}

/// Outcome of one pull.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PullReport {
    /// Digests requested from the origin.
    pub missing: usize,
    /// Files unpacked into the hololib, catalog included.
    pub extracted: usize,
    /// SHA-256 of the downloaded archive.
    pub archive_sha256: String,
}

/// HTTP client for one upstream origin.
pub struct UpstreamClient {
    http: reqwest::Client,
    origin: String,
    holotree: Arc<dyn Holotree>,
    scratch: PathBuf,
}

impl UpstreamClient {
    pub fn new(
        origin: &str,
        holotree: Arc<dyn Holotree>,
        scratch: impl Into<PathBuf>,
        identity: &PeerIdentity,
        timeout: Duration,
    ) -> Result<Self, PullError> {
        let mut headers = HeaderMap::new();
        headers.insert(INSTALLATION_ID_HEADER, header_value(&identity.installation)?);
        headers.insert(RANDOM_IDENTITY_HEADER, header_value(&identity.random)?);
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            origin: origin.trim_end_matches('/').to_string(),
            holotree,
            scratch: scratch.into(),
        })
    }

    fn url(&self, route: &str, catalog: &str) -> String {
        format!("{}/{route}/{catalog}", self.origin)
    }

    /// Digests of `catalog` at the origin whose blobs are absent locally.
    #[instrument(skip(self), fields(origin = %self.origin))]
    pub async fn missing_parts(&self, catalog: &str) -> Result<Vec<String>, PullError> {
        let url = self.url("parts", catalog);
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(PullError::Status {
                url,
                status: status.as_u16(),
            });
        }
        let body = response.text().await?;

        let mut missing = Vec::new();
        for digest in body.lines().map(str::trim).filter(|line| !line.is_empty()) {
            match self.holotree.has_blob(digest).await {
                Ok(true) => {}
                Ok(false) => missing.push(digest.to_string()),
                Err(err) => warn!(digest, error = %err, "ignoring unusable digest from origin"),
            }
        }
        Ok(missing)
    }

    /// Download the delta archive for `digests` into the scratch directory.
    ///
    /// The archive is streamed to a process-specific temporary name while
    /// being hashed, then renamed after its content hash. Returns the final
    /// path and the hash.
    #[instrument(skip(self, digests), fields(origin = %self.origin, count = digests.len()))]
    pub async fn download_delta(
        &self,
        catalog: &str,
        digests: &[String],
    ) -> Result<(PathBuf, String), PullError> {
        let url = self.url("delta", catalog);
        let response = self.http.post(&url).body(digests.join("\n")).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PullError::Status {
                url,
                status: status.as_u16(),
            });
        }

        tokio::fs::create_dir_all(&self.scratch).await?;
        let temp_path = self
            .scratch
            .join(format!("peercc_{:x}.zip", std::process::id()));
        let result = stream_to_file(response, &temp_path).await;
        let sha = match result {
            Ok(sha) => sha,
            Err(err) => {
                let _ = tokio::fs::remove_file(&temp_path).await;
                return Err(err);
            }
        };

        let final_path = self.scratch.join(format!("peercc_{sha}.zip"));
        tokio::fs::rename(&temp_path, &final_path).await?;
        debug!(path = %final_path.display(), "delta archive downloaded");
        Ok((final_path, sha))
    }

    /// Unpack a downloaded archive into the hololib.
    pub async fn import(&self, archive: &Path) -> Result<usize, PullError> {
        let root = self.holotree.hololib_root().to_path_buf();
        let archive = archive.to_path_buf();
        tokio::task::spawn_blocking(move || extract_into(&root, &archive))
            .await
            .map_err(|e| PullError::Task(e.to_string()))?
            .map_err(PullError::from)
    }
}

#[async_trait]
impl Puller for UpstreamClient {
    fn origin(&self) -> &str {
        &self.origin
    }

    async fn pull(&self, catalog: &str) -> Result<PullReport, PullError> {
        let missing = self.missing_parts(catalog).await?;
        debug!(catalog, missing = missing.len(), "requesting missing parts");
        let (archive, sha) = self.download_delta(catalog, &missing).await?;
        let imported = self.import(&archive).await;
        if let Err(err) = tokio::fs::remove_file(&archive).await {
            debug!(path = %archive.display(), error = %err, "could not remove downloaded archive");
        }
        Ok(PullReport {
            missing: missing.len(),
            extracted: imported?,
            archive_sha256: sha,
        })
    }
}

fn header_value(value: &str) -> Result<HeaderValue, PullError> {
    HeaderValue::from_str(value).map_err(|e| PullError::Header(e.to_string()))
}

async fn stream_to_file(response: reqwest::Response, path: &Path) -> Result<String, PullError> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut hasher = ContentHash::hasher();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        hasher.update(&chunk);
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    file.sync_all().await?;
    Ok(hasher.finalize().to_hex())
}
