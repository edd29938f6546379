//! Integration tests for pulling catalogs from an upstream peer.

mod common;

use common::{HololibFixture, blob_content, digests};
use holopeer_core::{ContentHash, INSTALLATION_ID_HEADER, RANDOM_IDENTITY_HEADER};
use holopeer_holotree::{Holotree, Hololib};
use holopeer_server::PeerIdentity;
use holopeer_server::identity::USER_AGENT;
use holopeer_server::upstream::{PullError, UpstreamClient};
use holopeer_server::workers::Puller;
use httpmock::prelude::*;
use std::io::{Cursor, Write};
use std::sync::Arc;
use std::time::Duration;
use zip::ZipWriter;
use zip::write::FileOptions;

const CATALOG: &str = "abc123def456.linux_amd64";

struct Peer {
    fixture: HololibFixture,
    holotree: Arc<dyn Holotree>,
    identity: PeerIdentity,
}

impl Peer {
    fn new() -> Self {
        let fixture = HololibFixture::new();
        let holotree: Arc<dyn Holotree> = Arc::new(Hololib::open(fixture.root.clone()));
        Self {
            fixture,
            holotree,
            identity: PeerIdentity::new("11111111-2222-4333-8444-555555555555"),
        }
    }

    fn scratch(&self) -> std::path::PathBuf {
        self.fixture.temp_path().join("scratch")
    }

    fn client(&self, origin: &str) -> UpstreamClient {
        UpstreamClient::new(
            origin,
            self.holotree.clone(),
            self.scratch(),
            &self.identity,
            Duration::from_secs(5),
        )
        .unwrap()
    }
}

fn library_path(digest: &str) -> String {
    format!(
        "library/{}/{}/{}/{digest}",
        &digest[0..2],
        &digest[2..4],
        &digest[4..6]
    )
}

/// Delta archive as an origin would send it.
fn delta_archive(digests: &[String], catalog: &[u8]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for digest in digests {
        writer
            .start_file(library_path(digest), FileOptions::default())
            .unwrap();
        writer.write_all(&blob_content(digest)).unwrap();
    }
    writer
        .start_file(format!("catalog/{CATALOG}"), FileOptions::default())
        .unwrap();
    writer.write_all(catalog).unwrap();
    writer.finish().unwrap().into_inner()
}

#[tokio::test]
async fn test_pull_requests_only_missing_parts() {
    let peer = Peer::new();
    let mut parts = digests(1, 4);
    parts.sort();
    let present = parts[1].clone();
    peer.fixture.add_blob(&present, &blob_content(&present));
    let missing: Vec<String> = parts.iter().filter(|d| **d != present).cloned().collect();

    let archive = delta_archive(&missing, b"catalog document");
    let server = MockServer::start_async().await;
    let parts_mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("/parts/{CATALOG}"))
                .header(INSTALLATION_ID_HEADER, peer.identity.installation.as_str())
                .header(RANDOM_IDENTITY_HEADER, peer.identity.random.as_str())
                .header("user-agent", USER_AGENT);
            then.status(200).body(parts.join("\n"));
        })
        .await;
    let delta_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/delta/{CATALOG}"))
                .body(missing.join("\n"));
            then.status(200)
                .header("content-type", "application/zip")
                .body(archive.clone());
        })
        .await;

    let report = peer.client(&server.base_url()).pull(CATALOG).await.unwrap();

    parts_mock.assert_async().await;
    delta_mock.assert_async().await;
    assert_eq!(report.missing, 3);
    assert_eq!(report.extracted, 4);
    assert_eq!(report.archive_sha256, ContentHash::compute(&archive).to_hex());

    for digest in &parts {
        assert!(peer.holotree.has_blob(digest).await.unwrap(), "{digest}");
    }
    let catalog = std::fs::read(peer.fixture.root.join("catalog").join(CATALOG)).unwrap();
    assert_eq!(catalog, b"catalog document");

    let leftovers = std::fs::read_dir(peer.scratch()).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn test_pull_with_trailing_slash_origin() {
    let peer = Peer::new();
    let archive = delta_archive(&[], b"empty catalog");
    let server = MockServer::start_async().await;
    let parts_mock = server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/parts/{CATALOG}"));
            then.status(200).body("");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(format!("/delta/{CATALOG}"));
            then.status(200).body(archive.clone());
        })
        .await;

    let origin = format!("{}/", server.base_url());
    let report = peer.client(&origin).pull(CATALOG).await.unwrap();

    parts_mock.assert_async().await;
    assert_eq!(report.missing, 0);
    assert_eq!(report.extracted, 1);
}

#[tokio::test]
async fn test_pull_stops_when_origin_lacks_catalog() {
    let peer = Peer::new();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/parts/{CATALOG}"));
            then.status(404).body("404 not found, sorry");
        })
        .await;
    let delta_mock = server
        .mock_async(|when, then| {
            when.method(POST).path(format!("/delta/{CATALOG}"));
            then.status(200);
        })
        .await;

    let err = peer
        .client(&server.base_url())
        .pull(CATALOG)
        .await
        .unwrap_err();

    assert!(matches!(err, PullError::Status { status: 404, .. }));
    delta_mock.assert_hits_async(0).await;
    assert!(!peer.fixture.root.join("catalog").join(CATALOG).exists());
}

#[tokio::test]
async fn test_failed_delta_leaves_no_download() {
    let peer = Peer::new();
    let wanted = digests(50, 1);
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/parts/{CATALOG}"));
            then.status(200).body(wanted.join("\n"));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(format!("/delta/{CATALOG}"));
            then.status(500).body("500 internal server error");
        })
        .await;

    let err = peer
        .client(&server.base_url())
        .pull(CATALOG)
        .await
        .unwrap_err();

    assert!(matches!(err, PullError::Status { status: 500, .. }));
    let downloads = std::fs::read_dir(peer.scratch())
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(downloads, 0);
}

#[tokio::test]
async fn test_corrupt_archive_is_removed() {
    let peer = Peer::new();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/parts/{CATALOG}"));
            then.status(200).body("");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(format!("/delta/{CATALOG}"));
            then.status(200).body("definitely not a zip");
        })
        .await;

    let err = peer
        .client(&server.base_url())
        .pull(CATALOG)
        .await
        .unwrap_err();

    assert!(matches!(err, PullError::Holotree(_)));
    assert_eq!(std::fs::read_dir(peer.scratch()).unwrap().count(), 0);
}
