//! Non-blocking click capture for the redirect path.

use chrono::Utc;
use metrics::counter;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::domain::click_event::ClickEvent;
use crate::domain::entities::Link;
use crate::utils::client_ip::ClientContext;

/// Hands click events to the background worker without waiting.
///
/// The queue is bounded. When it is full or closed the event is dropped and
/// logged; the redirect that triggered it is never affected.
#[derive(Clone)]
pub struct ClickRecorder {
    sender: mpsc::Sender<ClickEvent>,
}

impl ClickRecorder {
    /// Creates a recorder and the receiving end of its queue.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ClickEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Records a click on `link`, stamped with the current time.
    pub fn record_click(&self, link: &Link, client: ClientContext) {
        let event = ClickEvent::new(
            link,
            Utc::now(),
            client.user_agent,
            client.ip_address,
            client.referer,
        );

        match self.sender.try_send(event) {
            Ok(()) => {
                counter!("click_events_enqueued_total").increment(1);
                debug!(link_id = link.id, short_code = %link.short_code, "Click queued");
            }
            Err(TrySendError::Full(event)) => {
                counter!("click_events_dropped_total").increment(1);
                warn!(
                    link_id = event.link_id,
                    short_code = %event.short_code,
                    "Click queue full, dropping event"
                );
            }
            Err(TrySendError::Closed(event)) => {
                counter!("click_events_dropped_total").increment(1);
                warn!(
                    link_id = event.link_id,
                    short_code = %event.short_code,
                    "Click queue closed, dropping event"
                );
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Free slots in the queue.
    pub fn capacity(&self) -> usize {
        self.sender.capacity()
    }

    pub fn max_capacity(&self) -> usize {
        self.sender.max_capacity()
    }
}
