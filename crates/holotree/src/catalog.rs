//! Catalog documents.
//!
//! A catalog is a gzip-compressed JSON description of one holotree: a tree
//! of directories whose files each name the digest of their content blob.
//! Only the fields needed to enumerate digests are modelled; everything
//! else in the document is ignored.

use crate::error::{HolotreeError, HolotreeResult};
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{BufReader, Read};

/// Parsed catalog.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub identity: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub tree: Option<Dir>,
}

/// Directory node.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Dir {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "subdirs")]
    pub dirs: Option<BTreeMap<String, Dir>>,
    #[serde(default)]
    pub files: Option<BTreeMap<String, File>>,
}

/// File node.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct File {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: i64,
    pub digest: String,
}

impl Catalog {
    /// Decode a gzip-compressed JSON catalog.
    pub fn from_gzip_reader<R: Read>(name: &str, reader: R) -> HolotreeResult<Self> {
        let decoder = GzDecoder::new(reader);
        serde_json::from_reader(BufReader::new(decoder)).map_err(|source| {
            HolotreeError::MalformedCatalog {
                name: name.to_string(),
                source,
            }
        })
    }

    /// Every digest in the tree mapped to one path it appears at.
    ///
    /// When several files share content the last one visited wins; the
    /// key set is what matters to callers.
    pub fn digest_map(&self) -> BTreeMap<String, String> {
        let mut target = BTreeMap::new();
        if let Some(tree) = &self.tree {
            collect_digests(tree, "", &mut target);
        }
        target
    }
}

fn collect_digests(dir: &Dir, prefix: &str, target: &mut BTreeMap<String, String>) {
    for (name, subdir) in dir.dirs.iter().flatten() {
        collect_digests(subdir, &join(prefix, name), target);
    }
    for (name, file) in dir.files.iter().flatten() {
        target.insert(file.digest.clone(), join(prefix, name));
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}
