//! Server test utilities.

use super::fixtures::HololibFixture;
use super::mocks::{CountingHolotree, RecordingPuller};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use holopeer_core::RANDOM_IDENTITY_HEADER;
use holopeer_core::config::AppConfig;
use holopeer_holotree::{Holotree, Hololib};
use holopeer_server::workers::Puller;
use holopeer_server::{AppState, PeerIdentity, Workers, create_router};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower::ServiceExt;

/// A router over a temporary hololib, with a recording puller.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub holotree: Arc<CountingHolotree>,
    pub pulls: mpsc::UnboundedReceiver<String>,
    pub workers: Workers,
    pub fixture: HololibFixture,
}

#[allow(dead_code)]
impl TestServer {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let fixture = HololibFixture::new();
        let mut config = AppConfig::for_testing(fixture.temp_path());
        modifier(&mut config);

        let inner: Arc<dyn Holotree> = Arc::new(Hololib::open(fixture.root.clone()));
        let holotree = Arc::new(CountingHolotree::new(inner));
        let (puller, pulls) = RecordingPuller::new();
        let puller: Arc<dyn Puller> = Arc::new(puller);

        let identity = PeerIdentity::new("test-installation");
        let (state, workers) = AppState::start(
            config,
            holotree.clone() as Arc<dyn Holotree>,
            identity,
            Some(puller),
        );
        let router = create_router(state.clone());

        Self {
            router,
            state,
            holotree,
            pulls,
            workers,
            fixture,
        }
    }

    /// Send a request and collect the whole response body.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, body.to_vec())
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let (status, _, body) = self.send(request).await;
        (status, body)
    }

    pub async fn post(&self, uri: &str, body: impl Into<Body>) -> (StatusCode, Vec<u8>) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .body(body.into())
            .unwrap();
        let (status, _, body) = self.send(request).await;
        (status, body)
    }

    /// A request carrying this server's own random identity.
    pub fn self_request(&self, method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(RANDOM_IDENTITY_HEADER, self.state.identity.random.as_str())
            .body(Body::empty())
            .unwrap()
    }
}
