use flate2::{Compression, write::GzEncoder};
use holopeer_holotree::catalog::{Catalog, Dir, File};
use holopeer_holotree::traits::blob_relative_path;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Deterministic 32-character hex digest for a seed.
pub fn digest_for(seed: u64) -> String {
    let state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    format!("{:016x}{:016x}", state, state.rotate_left(17) ^ seed)
}

/// A hololib laid out in a temporary directory.
pub struct HololibFixture {
    pub root: PathBuf,
    _temp: TempDir,
}

#[allow(dead_code)]
impl HololibFixture {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("hololib");
        std::fs::create_dir_all(root.join("catalog")).unwrap();
        std::fs::create_dir_all(root.join("library")).unwrap();
        Self { root, _temp: temp }
    }

    pub fn temp_path(&self) -> &Path {
        self._temp.path()
    }

    /// Store `content` as the blob for `digest`.
    pub fn add_blob(&self, digest: &str, content: &[u8]) -> PathBuf {
        let path = self.root.join(blob_relative_path(digest).unwrap());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    /// Write a catalog whose tree holds `files` as `(path, digest)` pairs.
    pub fn add_catalog(&self, name: &str, files: &[(&str, &str)]) -> PathBuf {
        let mut tree = Dir::default();
        for (path, digest) in files {
            insert(&mut tree, path, digest);
        }
        let catalog = Catalog {
            identity: Some(name.to_string()),
            platform: Some("linux_amd64".to_string()),
            tree: Some(tree),
        };
        let json = serde_json::to_vec(&catalog).unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&json).unwrap();
        let path = self.root.join("catalog").join(name);
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();
        path
    }

    /// Catalog plus blobs for every digest, with content derived from the digest.
    pub fn add_environment(&self, name: &str, digests: &[String]) {
        let files: Vec<(String, &str)> = digests
            .iter()
            .enumerate()
            .map(|(at, digest)| (format!("env/lib/file{at}.py"), digest.as_str()))
            .collect();
        let pairs: Vec<(&str, &str)> = files.iter().map(|(p, d)| (p.as_str(), *d)).collect();
        self.add_catalog(name, &pairs);
        for digest in digests {
            self.add_blob(digest, format!("content of {digest}").as_bytes());
        }
    }
}

fn insert(dir: &mut Dir, path: &str, digest: &str) {
    match path.split_once('/') {
        Some((head, rest)) => {
            let child = dir
                .dirs
                .get_or_insert_with(BTreeMap::new)
                .entry(head.to_string())
                .or_insert_with(|| Dir {
                    name: head.to_string(),
                    ..Dir::default()
                });
            insert(child, rest, digest);
        }
        None => {
            dir.files.get_or_insert_with(BTreeMap::new).insert(
                path.to_string(),
                File {
                    name: path.to_string(),
                    size: 0,
                    digest: digest.to_string(),
                },
            );
        }
    }
}
