//! ZIP transport of holotree parts.
//!
//! Delta archives carry blobs and catalogs at their library-relative paths,
//! so unpacking one at the hololib root puts every entry where it belongs.

use crate::error::{HolotreeError, HolotreeResult};
use std::fs::{self, File};
use std::io::{self, Seek, Write};
use std::path::Path;
use tracing::{debug, trace};
use uuid::Uuid;
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

/// Entry options shared by every appended file.
///
/// The timestamp is pinned so two builds from the same inputs produce
/// identical bytes.
fn entry_options() -> FileOptions {
    FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644)
}

/// Append the file at `absolute` to `sink` as entry `relative`.
///
/// The sink is left open for further entries. Returns the number of bytes
/// copied.
pub fn zip_append<W: Write + Seek>(
    sink: &mut ZipWriter<W>,
    absolute: &Path,
    relative: &str,
) -> HolotreeResult<u64> {
    let mut source = File::open(absolute)?;
    sink.start_file(relative, entry_options())?;
    let copied = io::copy(&mut source, sink)?;
    trace!(entry = relative, bytes = copied, "zip entry appended");
    Ok(copied)
}

/// Unpack `archive` under `root`, returning the number of files written.
///
/// Each file lands in a sibling temporary path first and is renamed into
/// place, so readers never observe a partially written blob.
pub fn extract_into(root: &Path, archive: &Path) -> HolotreeResult<usize> {
    let mut archive = ZipArchive::new(File::open(archive)?)?;
    let mut written = 0;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let Some(enclosed) = entry.enclosed_name().map(|p| root.join(p)) else {
            return Err(HolotreeError::UnsafeEntry(entry.name().to_string()));
        };
        if entry.is_dir() {
            fs::create_dir_all(&enclosed)?;
            continue;
        }
        let Some(parent) = enclosed.parent() else {
            return Err(HolotreeError::UnsafeEntry(entry.name().to_string()));
        };
        fs::create_dir_all(parent)?;

        let temp_path = parent.join(format!(".tmp.{}", Uuid::new_v4()));
        let result = (|| -> HolotreeResult<()> {
            let mut out = File::create(&temp_path)?;
            io::copy(&mut entry, &mut out)?;
            out.sync_all()?;
            fs::rename(&temp_path, &enclosed)?;
            Ok(())
        })();
        if let Err(err) = result {
            let _ = fs::remove_file(&temp_path);
            return Err(err);
        }
        written += 1;
    }
    debug!(root = %root.display(), files = written, "archive extracted");
    Ok(written)
}
