//! Background worker draining the click queue into the telemetry publisher.

use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::domain::click_event::ClickEvent;
use crate::domain::repositories::LinkRepository;
use crate::infrastructure::messaging::TelemetryPublisher;

/// Publishes queued click events until the queue closes.
///
/// Events are handed to the publisher one at a time, in queue order, so the
/// per-short-code order of redirects is the order consumers observe.
/// Delivery results and click counter updates are awaited on up to
/// `concurrency` background tasks. Every failure is logged and dropped.
///
/// Returns after the queue is closed and every started delivery resolved.
pub async fn run_click_worker<L>(
    mut rx: mpsc::Receiver<ClickEvent>,
    publisher: Arc<TelemetryPublisher>,
    link_repository: Arc<L>,
    concurrency: usize,
) where
    L: LinkRepository + ?Sized + 'static,
{
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    while let Some(event) = rx.recv().await {
        while tasks.try_join_next().is_some() {}

        let delivery = match publisher.publish(&event).await {
            Ok(delivery) => Some(delivery),
            Err(e) => {
                warn!(
                    link_id = event.link_id,
                    short_code = %event.short_code,
                    "Click event not published: {}",
                    e
                );
                None
            }
        };

        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            break;
        };
        let repository = Arc::clone(&link_repository);

        tasks.spawn(async move {
            let _permit = permit;

            if let Err(e) = repository.increment_click_count(event.link_id).await {
                warn!(link_id = event.link_id, "Failed to update click count: {}", e);
            }

            if let Some(delivery) = delivery {
                match delivery.await {
                    Ok(metadata) => debug!(
                        short_code = %event.short_code,
                        partition = metadata.partition,
                        offset = metadata.offset,
                        "Click event delivered"
                    ),
                    Err(e) => warn!(
                        link_id = event.link_id,
                        short_code = %event.short_code,
                        "Click event dropped: {}",
                        e
                    ),
                }
            }
        });
    }

    while tasks.join_next().await.is_some() {}
    info!("Click worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProducerSettings;
    use crate::domain::entities::{Link, NewLink};
    use crate::infrastructure::messaging::{ChannelError, InMemoryEventChannel};
    use crate::infrastructure::persistence::InMemoryLinkRepository;
    use chrono::Utc;
    use std::time::Duration;

    fn event(link: &Link, ua: &str) -> ClickEvent {
        ClickEvent::new(link, Utc::now(), Some(ua.to_string()), None, None)
    }

    async fn setup() -> (
        Arc<InMemoryEventChannel>,
        Arc<TelemetryPublisher>,
        Arc<InMemoryLinkRepository>,
        Link,
    ) {
        let channel = Arc::new(InMemoryEventChannel::new());
        let settings = ProducerSettings {
            retry_backoff: Duration::from_millis(2),
            ..ProducerSettings::default()
        };
        let publisher = Arc::new(TelemetryPublisher::new(channel.clone(), &settings));
        let repository = Arc::new(InMemoryLinkRepository::new());
        let link = repository
            .insert(NewLink::new("https://example.com", "G"))
            .await
            .unwrap();
        (channel, publisher, repository, link)
    }

    #[tokio::test]
    async fn test_worker_publishes_in_queue_order_and_counts_clicks() {
        let (channel, publisher, repository, link) = setup().await;
        let (tx, rx) = mpsc::channel(100);

        for i in 0..25 {
            tx.send(event(&link, &format!("ua-{i}"))).await.unwrap();
        }
        drop(tx);

        run_click_worker(rx, publisher, repository.clone(), 4).await;

        let agents: Vec<String> = channel
            .records_for_key("G")
            .iter()
            .map(|r| ClickEvent::parse_and_validate(&r.value).unwrap().user_agent.unwrap())
            .collect();
        let expected: Vec<String> = (0..25).map(|i| format!("ua-{i}")).collect();
        assert_eq!(agents, expected);

        let stored = repository.find_by_code("G").await.unwrap().unwrap();
        assert_eq!(stored.click_count, 25);
    }

    #[tokio::test]
    async fn test_worker_survives_channel_failures() {
        let (channel, publisher, repository, link) = setup().await;
        channel.fail_next(ChannelError::Rejected("broken".into()));
        let (tx, rx) = mpsc::channel(10);

        tx.send(event(&link, "ua-0")).await.unwrap();
        drop(tx);

        run_click_worker(rx, publisher, repository.clone(), 1).await;

        assert!(channel.is_empty());
        let stored = repository.find_by_code("G").await.unwrap().unwrap();
        assert_eq!(stored.click_count, 1);
    }
}
