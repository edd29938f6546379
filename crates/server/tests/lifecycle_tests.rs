//! Startup and graceful shutdown of a real listener.

mod common;

use common::{HololibFixture, digests};
use holopeer_core::config::AppConfig;
use holopeer_server::lifecycle::{prepare, serve};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

fn config_for(fixture: &HololibFixture) -> AppConfig {
    let mut config = AppConfig::for_testing(fixture.temp_path());
    config.server.shutdown_grace_secs = 2;
    config
}

#[tokio::test]
async fn test_serves_until_cancelled_and_cleans_holdfiles() {
    let fixture = HololibFixture::new();
    let catalog = "beef01.linux_amd64";
    let parts = digests(7, 3);
    fixture.add_environment(catalog, &parts);

    let config = config_for(&fixture);
    let hold_dir = config.storage.hold_dir();
    std::fs::create_dir_all(&hold_dir).unwrap();
    std::fs::write(hold_dir.join("stale.hld"), b"old").unwrap();

    let (state, workers) = prepare(config).await.unwrap();
    assert!(!hold_dir.join("stale.hld").exists());
    assert!(state.config.storage.scratch_dir.is_dir());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(serve(listener, state, workers, shutdown.clone()));

    let client = reqwest::Client::new();
    let health = client
        .get(format!("http://{addr}/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(health.status(), 200);

    let listing = client
        .get(format!("http://{addr}/parts/{catalog}"))
        .send()
        .await
        .unwrap();
    assert_eq!(listing.status(), 200);
    let mut expected = parts.clone();
    expected.sort();
    assert_eq!(listing.text().await.unwrap(), expected.join("\n"));

    std::fs::write(hold_dir.join("running.hld"), b"busy").unwrap();
    shutdown.cancel();

    tokio::time::timeout(Duration::from_secs(10), server)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
    assert!(!hold_dir.join("running.hld").exists());
    assert!(
        TcpListener::bind(addr).await.is_ok(),
        "listener should be released"
    );
}

#[tokio::test]
async fn test_prepare_rejects_invalid_config() {
    let fixture = HololibFixture::new();
    let mut config = config_for(&fixture);
    config.cache.parts_capacity = 0;

    let err = prepare(config).await.err().unwrap();

    assert!(err.to_string().contains("invalid configuration"));
}

#[tokio::test]
async fn test_prepare_persists_installation_id() {
    let fixture = HololibFixture::new();
    let mut config = config_for(&fixture);
    config.upstream.installation_id = None;
    let id_path = config.storage.installation_id_path();

    let (first, workers) = prepare(config.clone()).await.unwrap();
    let installation = first.identity.installation.clone();
    drop(first);
    workers.join(Duration::from_secs(1)).await;

    let (second, _workers) = prepare(config).await.unwrap();
    assert_eq!(second.identity.installation, installation);
    assert_ne!(second.identity.random, "");
    assert!(id_path.is_file());
}
