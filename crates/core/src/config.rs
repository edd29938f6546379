//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the upstream peer to pull catalogs from.
pub const REMOTE_ORIGIN_ENV: &str = "RCC_REMOTE_ORIGIN";

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:4653").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Seconds allowed for reading a request body.
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
    /// Seconds allowed for producing a whole response.
    #[serde(default = "default_write_timeout_secs")]
    pub write_timeout_secs: u64,
    /// Upper bound on the combined size of request headers.
    #[serde(default = "default_max_header_bytes")]
    pub max_header_bytes: usize,
    /// Seconds in-flight requests get to finish after a shutdown signal.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:4653".to_string()
}

fn default_read_timeout_secs() -> u64 {
    20
}

fn default_write_timeout_secs() -> u64 {
    40
}

fn default_max_header_bytes() -> usize {
    16 * 1024
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            read_timeout_secs: default_read_timeout_secs(),
            write_timeout_secs: default_write_timeout_secs(),
            max_header_bytes: default_max_header_bytes(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl ServerConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Location of the local holotree library.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HolotreeConfig {
    /// Root of the hololib (contains `catalog/` and `library/`).
    #[serde(default = "default_hololib")]
    pub hololib: PathBuf,
}

/// `$ROBOCORP_HOME/hololib`, or `~/.robocorp/hololib` when unset.
fn default_hololib() -> PathBuf {
    let home = std::env::var_os("ROBOCORP_HOME")
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".robocorp")
        });
    home.join("hololib")
}

impl Default for HolotreeConfig {
    fn default() -> Self {
        Self {
            hololib: default_hololib(),
        }
    }
}

/// Local working directories.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Peer storage root. Holdfiles live in `<path>/hold`.
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
    /// Where delta archives are built and cached.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./data/peer")
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("rccremote")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            scratch_dir: default_scratch_dir(),
        }
    }
}

impl StorageConfig {
    /// Directory holding transient `*.hld` files.
    pub fn hold_dir(&self) -> PathBuf {
        self.path.join("hold")
    }

    /// File the generated installation identity is persisted to.
    pub fn installation_id_path(&self) -> PathBuf {
        self.path.join("installation-id")
    }
}

/// Upstream peer used for catalog pulls.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the upstream peer. Falls back to `RCC_REMOTE_ORIGIN`.
    #[serde(default)]
    pub origin: Option<String>,
    /// Stable installation identity sent upstream. Generated and persisted
    /// under the storage root when absent.
    #[serde(default)]
    pub installation_id: Option<String>,
    /// Overall timeout for one upstream request in seconds.
    #[serde(default = "default_upstream_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_upstream_timeout_secs() -> u64 {
    300
}

impl UpstreamConfig {
    /// Configured origin, else the one named by the environment. Blank
    /// values count as unset and a trailing slash is dropped.
    pub fn resolved_origin(&self) -> Option<String> {
        self.origin
            .clone()
            .or_else(|| std::env::var(REMOTE_ORIGIN_ENV).ok())
            .map(|origin| origin.trim().trim_end_matches('/').to_string())
            .filter(|origin| !origin.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Worker queue and cache sizing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Number of catalog listings kept in memory.
    #[serde(default = "default_capacity")]
    pub parts_capacity: usize,
    /// Pending catalog pulls before force requests wait.
    #[serde(default = "default_capacity")]
    pub pull_queue_capacity: usize,
    /// Pending parts queries before callers wait.
    #[serde(default = "default_parts_queue_capacity")]
    pub parts_queue_capacity: usize,
    /// Drop a cached listing when its catalog file changed since admission.
    #[serde(default)]
    pub revalidate_on_lookup: bool,
}

fn default_capacity() -> usize {
    crate::DEFAULT_QUEUE_SIZE
}

fn default_parts_queue_capacity() -> usize {
    16
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            parts_capacity: default_capacity(),
            pull_queue_capacity: default_capacity(),
            parts_queue_capacity: default_parts_queue_capacity(),
            revalidate_on_lookup: false,
        }
    }
}

/// Delta archive construction.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DeltaConfig {
    /// Derive the archive identity from digests in request order instead of
    /// sorted order. Duplicates are dropped either way.
    #[serde(default)]
    pub order_sensitive_identity: bool,
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub holotree: HolotreeConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub delta: DeltaConfig,
}

impl AppConfig {
    /// Create a test configuration rooted in `root`.
    ///
    /// **For testing only.** No upstream origin, metrics enabled.
    pub fn for_testing(root: &std::path::Path) -> Self {
        Self {
            server: ServerConfig::default(),
            holotree: HolotreeConfig {
                hololib: root.join("hololib"),
            },
            storage: StorageConfig {
                path: root.join("storage"),
                scratch_dir: root.join("scratch"),
            },
            upstream: UpstreamConfig {
                origin: None,
                installation_id: Some("00000000-0000-4000-8000-000000000000".to_string()),
                timeout_secs: default_upstream_timeout_secs(),
            },
            cache: CacheConfig::default(),
            delta: DeltaConfig::default(),
        }
    }

    /// Reject settings the daemon cannot run with.
    pub fn validate(&self) -> crate::Result<()> {
        let checks = [
            ("server.read_timeout_secs", self.server.read_timeout_secs as usize),
            ("server.write_timeout_secs", self.server.write_timeout_secs as usize),
            ("server.max_header_bytes", self.server.max_header_bytes),
            ("upstream.timeout_secs", self.upstream.timeout_secs as usize),
            ("cache.parts_capacity", self.cache.parts_capacity),
            ("cache.pull_queue_capacity", self.cache.pull_queue_capacity),
            ("cache.parts_queue_capacity", self.cache.parts_queue_capacity),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(crate::Error::Config(format!("{name} cannot be 0")));
            }
        }
        if self.server.bind.trim().is_empty() {
            return Err(crate::Error::Config("server.bind cannot be empty".to_string()));
        }
        Ok(())
    }
}
