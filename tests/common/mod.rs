#![allow(dead_code)]

use axum::extract::ConnectInfo;
use axum_test::TestServer;
use linkrelay::application::services::ClickRecorder;
use linkrelay::config::ProducerSettings;
use linkrelay::domain::click_event::ClickEvent;
use linkrelay::domain::repositories::LinkRepository;
use linkrelay::infrastructure::messaging::{InMemoryEventChannel, TelemetryPublisher};
use linkrelay::infrastructure::persistence::InMemoryLinkRepository;
use linkrelay::routes::router;
use linkrelay::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tower::Layer;

pub const BASE_URL: &str = "https://sho.rt";
pub const MAX_CUSTOM_CODE_LENGTH: usize = 10;

/// Everything a handler test needs to drive and inspect the service.
pub struct TestContext {
    pub state: AppState,
    pub repo: Arc<InMemoryLinkRepository>,
    pub channel: Arc<InMemoryEventChannel>,
    pub publisher: Arc<TelemetryPublisher>,
    pub click_rx: mpsc::Receiver<ClickEvent>,
}

impl TestContext {
    /// Serves the full router with a fixed peer address.
    pub fn server(&self) -> TestServer {
        let app = router(self.state.clone()).layer(MockConnectInfoLayer);
        TestServer::new(app).unwrap()
    }
}

pub fn test_settings() -> ProducerSettings {
    ProducerSettings {
        partitions: 3,
        request_timeout: Duration::from_secs(2),
        max_block: Duration::from_millis(200),
        retry_backoff: Duration::from_millis(10),
        ..ProducerSettings::default()
    }
}

pub fn create_test_context() -> TestContext {
    create_test_context_with(test_settings(), 100)
}

pub fn create_test_context_with(settings: ProducerSettings, queue_capacity: usize) -> TestContext {
    let repo = Arc::new(InMemoryLinkRepository::new());
    let channel = Arc::new(InMemoryEventChannel::new());
    let publisher = Arc::new(TelemetryPublisher::new(channel.clone(), &settings));
    let (click_recorder, click_rx) = ClickRecorder::new(queue_capacity);

    let link_repository: Arc<dyn LinkRepository> = repo.clone();
    let state = AppState::new(
        link_repository,
        click_recorder,
        publisher.clone(),
        BASE_URL,
        MAX_CUSTOM_CODE_LENGTH,
    );

    TestContext {
        state,
        repo,
        channel,
        publisher,
        click_rx,
    }
}

#[derive(Clone)]
pub struct MockConnectInfoLayer;

impl<S> Layer<S> for MockConnectInfoLayer {
    type Service = MockConnectInfoService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MockConnectInfoService { inner }
    }
}

#[derive(Clone)]
pub struct MockConnectInfoService<S> {
    inner: S,
}

impl<S, B> tower::Service<axum::http::Request<B>> for MockConnectInfoService<S>
where
    S: tower::Service<axum::http::Request<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: axum::http::Request<B>) -> Self::Future {
        let addr: SocketAddr = "127.0.0.1:12345".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        self.inner.call(req)
    }
}
