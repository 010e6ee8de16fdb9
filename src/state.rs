//! Shared application state injected into handlers.

use std::sync::Arc;

use crate::application::services::{ClickRecorder, LinkService};
use crate::domain::repositories::LinkRepository;
use crate::infrastructure::messaging::TelemetryPublisher;

/// State cloned into every handler.
///
/// Holds the only [`ClickRecorder`] senders: once the server drops its
/// state, the click queue closes and the worker drains.
#[derive(Clone)]
pub struct AppState {
    pub link_service: Arc<LinkService<dyn LinkRepository>>,
    pub link_repository: Arc<dyn LinkRepository>,
    pub click_recorder: ClickRecorder,
    pub publisher: Arc<TelemetryPublisher>,
}

impl AppState {
    pub fn new(
        link_repository: Arc<dyn LinkRepository>,
        click_recorder: ClickRecorder,
        publisher: Arc<TelemetryPublisher>,
        base_url: &str,
        max_custom_code_length: usize,
    ) -> Self {
        let link_service = Arc::new(LinkService::new(
            Arc::clone(&link_repository),
            base_url,
            max_custom_code_length,
        ));

        Self {
            link_service,
            link_repository,
            click_recorder,
            publisher,
        }
    }
}
