//! Delta archive construction.
//!
//! A delta archive holds the blobs a client asked for (restricted to the
//! catalog's own digests) plus the catalog document itself. Archives are
//! named after the SHA-256 of the approved digest list and kept in the
//! scratch directory, so an identical request later is served from disk.
//! Archives are written under a temporary name and published by rename.

use crate::metrics::{DELTA_BUILD_DURATION, DELTA_BUILDS, DELTA_FAILURES, DELTA_REUSES};
use dashmap::DashMap;
use holopeer_core::{ContentHash, MIN_DIGEST_LEN, set};
use holopeer_holotree::{Holotree, HolotreeError, zip_append};
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::Mutex;
use tracing::{debug, error, info, trace};
use zip::ZipWriter;

/// Delta build errors.
#[derive(Debug, thiserror::Error)]
pub enum DeltaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("holotree error: {0}")]
    Holotree(#[from] HolotreeError),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("blocking task failed: {0}")]
    Task(String),
}

/// Reduce one request line to a digest candidate.
///
/// Lines are trimmed, a trailing slash is dropped and only the last path
/// segment is kept. Anything of `MIN_DIGEST_LEN` characters or fewer is
/// not a digest.
pub fn parse_candidate(line: &str) -> Option<&str> {
    let flat = line.trim().trim_end_matches('/');
    let base = flat.rsplit('/').next().unwrap_or(flat).trim();
    (base.len() > MIN_DIGEST_LEN).then_some(base)
}

/// What a delta request body asked for.
#[derive(Debug, Default)]
pub struct DeltaRequest {
    /// Lines read from the body, approved or not.
    pub requested: usize,
    /// Candidates that are digests of the catalog, in request order.
    pub approved: Vec<String>,
}

/// Read candidate lines until end of input or the first read error,
/// keeping only digests listed in `listing`.
///
/// A final line without a newline still counts.
pub async fn read_approved<R>(mut reader: R, listing: &str) -> DeltaRequest
where
    R: AsyncBufRead + Unpin,
{
    let members: Vec<&str> = listing.lines().collect();
    let known: HashSet<&str> = set::membership(&members);
    let mut request = DeltaRequest::default();
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        match reader.read_until(b'\n', &mut buffer).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => {
                debug!(error = %err, "delta request body ended early");
                break;
            }
        }
        request.requested += 1;
        let line = String::from_utf8_lossy(&buffer);
        match parse_candidate(&line) {
            Some(candidate) if known.contains(candidate) => {
                request.approved.push(candidate.to_string())
            }
            Some(candidate) => trace!(candidate, "ignoring digest outside catalog"),
            None => trace!(line = line.trim(), "ignoring short delta line"),
        }
    }
    request
}

/// Digest list an archive is named after.
///
/// Sorted and deduplicated by default, so the same set of digests always
/// maps to the same archive. The order-sensitive variant keeps the approved
/// list exactly as requested, duplicates included.
pub fn canonical_order(approved: &[String], order_sensitive: bool) -> Vec<String> {
    if order_sensitive {
        approved.to_vec()
    } else {
        set::set(approved)
    }
}

/// First occurrence of each digest, in order. One ZIP entry per blob.
pub fn archive_entries(digests: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    digests
        .iter()
        .filter(|digest| seen.insert(digest.as_str()))
        .cloned()
        .collect()
}

/// Hex SHA-256 of the digests joined by newlines.
pub fn delta_identity(digests: &[String]) -> String {
    ContentHash::of_lines(digests).to_hex()
}

/// A published delta archive.
#[derive(Clone, Debug)]
pub struct DeltaArtifact {
    pub identity: String,
    pub path: PathBuf,
    /// Whether the archive existed before this request.
    pub reused: bool,
}

/// Builds and caches delta archives in a scratch directory.
pub struct DeltaBuilder {
    holotree: Arc<dyn Holotree>,
    scratch: PathBuf,
    order_sensitive: bool,
    in_flight: DashMap<String, Arc<Mutex<()>>>,
}

impl DeltaBuilder {
    pub fn new(holotree: Arc<dyn Holotree>, scratch: impl Into<PathBuf>, order_sensitive: bool) -> Self {
        Self {
            holotree,
            scratch: scratch.into(),
            order_sensitive,
            in_flight: DashMap::new(),
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch
    }

    pub fn artifact_path(&self, identity: &str) -> PathBuf {
        self.scratch.join(format!("{identity}_parts.zip"))
    }

    /// Temporary build path, unique per identity and parent process.
    pub fn build_path(&self, identity: &str) -> PathBuf {
        self.scratch
            .join(format!("{identity}_{:x}_build.zip", parent_process_id()))
    }

    /// Archive of `approved` digests plus the `catalog` document.
    ///
    /// Concurrent requests for the same identity wait for one build.
    pub async fn build(&self, catalog: &str, approved: &[String]) -> Result<DeltaArtifact, DeltaError> {
        let digests = canonical_order(approved, self.order_sensitive);
        let identity = delta_identity(&digests);
        let path = self.artifact_path(&identity);

        if tokio::fs::try_exists(&path).await? {
            DELTA_REUSES.inc();
            debug!(catalog, identity = %identity, "delta archive reused");
            return Ok(DeltaArtifact {
                identity,
                path,
                reused: true,
            });
        }

        let entries = archive_entries(&digests);
        let in_flight = InFlight::enter(&self.in_flight, &identity);
        let guard = in_flight.lock().lock().await;
        let result = self.build_locked(catalog, &entries, &identity, &path).await;
        drop(guard);
        drop(in_flight);

        let reused = result?;
        Ok(DeltaArtifact {
            identity,
            path,
            reused,
        })
    }

    /// Identities with a build in progress or waiting.
    pub fn in_flight_builds(&self) -> usize {
        self.in_flight.len()
    }

    async fn build_locked(
        &self,
        catalog: &str,
        digests: &[String],
        identity: &str,
        path: &Path,
    ) -> Result<bool, DeltaError> {
        if tokio::fs::try_exists(path).await? {
            DELTA_REUSES.inc();
            return Ok(true);
        }

        tokio::fs::create_dir_all(&self.scratch).await?;
        let started = Instant::now();
        let holotree = self.holotree.clone();
        let temp = self.build_path(identity);
        let target = path.to_path_buf();
        let catalog_name = catalog.to_string();
        let entries = digests.to_vec();
        let outcome = tokio::task::spawn_blocking(move || {
            write_archive(holotree.as_ref(), &catalog_name, &entries, &temp, &target)
        })
        .await
        .map_err(|e| DeltaError::Task(e.to_string()))
        .and_then(|result| result);

        match outcome {
            Ok(()) => {
                DELTA_BUILDS.inc();
                DELTA_BUILD_DURATION.observe(started.elapsed().as_secs_f64());
                info!(
                    catalog,
                    identity,
                    parts = digests.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "delta archive built"
                );
                Ok(false)
            }
            Err(err) => {
                DELTA_FAILURES.inc();
                error!(catalog, identity, error = %err, "delta archive build failed");
                Err(err)
            }
        }
    }
}

/// Registration of one request in the in-flight map.
///
/// Dropping it, including when the request future is cancelled, removes the
/// identity's entry once no other request holds it.
struct InFlight<'a> {
    map: &'a DashMap<String, Arc<Mutex<()>>>,
    identity: &'a str,
    lock: Arc<Mutex<()>>,
}

impl<'a> InFlight<'a> {
    fn enter(map: &'a DashMap<String, Arc<Mutex<()>>>, identity: &'a str) -> Self {
        let lock = map
            .entry(identity.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        Self { map, identity, lock }
    }

    fn lock(&self) -> &Mutex<()> {
        &self.lock
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        // Release this holder first so concurrent drops cannot both see the other.
        drop(std::mem::take(&mut self.lock));
        self.map
            .remove_if(self.identity, |_, entry| Arc::strong_count(entry) <= 1);
    }
}

/// Write every blob and then the catalog into `temp`, then publish it at
/// `target`. A failed build leaves `temp` behind.
fn write_archive(
    holotree: &dyn Holotree,
    catalog: &str,
    digests: &[String],
    temp: &Path,
    target: &Path,
) -> Result<(), DeltaError> {
    let mut sink = ZipWriter::new(File::create(temp)?);
    for digest in digests {
        let absolute = holotree.absolute_path(digest)?;
        let relative = holotree.relative_path(digest)?;
        zip_append(&mut sink, &absolute, &relative)?;
    }
    zip_append(
        &mut sink,
        &holotree.catalog_path(catalog)?,
        &holotree.catalog_relative_path(catalog)?,
    )?;
    let file = sink.finish()?;
    file.sync_all()?;
    std::fs::rename(temp, target)?;
    Ok(())
}

#[cfg(unix)]
fn parent_process_id() -> u32 {
    std::os::unix::process::parent_id()
}

#[cfg(not(unix))]
fn parent_process_id() -> u32 {
    std::process::id()
}
