//! Ordered, idempotent click event publisher.
//!
//! Every partition gets its own lane: a bounded queue drained by one task.
//! The lane stamps records with per-partition sequence numbers in queue
//! order, sends at most `max_in_flight` records per batch and never starts
//! the next batch before the current one is resolved. A transient failure
//! re-sends the unresolved records with their original sequence numbers, so
//! the channel's deduplication turns retries into exactly-once appends and
//! per-key order is preserved.

use metrics::counter;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, RwLock};
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::{debug, error, info, warn};

use super::channel::{ChannelError, EventChannel, ProducerRecord, RecordMetadata};
use super::partitioner::partition_for;
use crate::config::ProducerSettings;
use crate::domain::click_event::ClickEvent;

/// Upper bound for a single retry delay.
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Terminal publish failures.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to serialize click event: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("publisher queue stayed full for {0:?}")]
    BufferFull(Duration),

    #[error("publisher is closed")]
    Closed,

    #[error("delivery timed out after {attempts} attempt(s)")]
    DeliveryTimeout { attempts: u32 },

    #[error("retries exhausted after {attempts} attempt(s): {last}")]
    RetriesExhausted { attempts: u32, last: ChannelError },

    #[error("event channel refused the record: {0}")]
    Channel(ChannelError),
}

/// Delivery state of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Pending,
    Sent,
    Retrying,
    Failed,
}

impl DeliveryState {
    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryState::Sent | DeliveryState::Failed)
    }

    pub fn can_transition_to(self, next: DeliveryState) -> bool {
        !self.is_terminal() && next != DeliveryState::Pending
    }
}

/// Resolves once the record is acknowledged or has failed for good.
///
/// Dropping the future does not cancel delivery.
pub struct DeliveryFuture {
    rx: oneshot::Receiver<Result<RecordMetadata, PublishError>>,
}

impl Future for DeliveryFuture {
    type Output = Result<RecordMetadata, PublishError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(PublishError::Closed)))
    }
}

struct Envelope {
    key: String,
    value: String,
    enqueued_at: Instant,
    reply: oneshot::Sender<Result<RecordMetadata, PublishError>>,
}

struct InFlight {
    record: ProducerRecord,
    deadline: Instant,
    state: DeliveryState,
    attempts: u32,
    reply: oneshot::Sender<Result<RecordMetadata, PublishError>>,
}

impl InFlight {
    fn transition(&mut self, next: DeliveryState) {
        if !self.state.can_transition_to(next) {
            warn!(
                from = ?self.state,
                to = ?next,
                sequence = self.record.sequence,
                "Ignoring invalid delivery state transition"
            );
            return;
        }
        self.state = next;
    }

    fn succeed(mut self, metadata: RecordMetadata) {
        self.transition(DeliveryState::Sent);
        debug!(
            partition = metadata.partition,
            offset = metadata.offset,
            sequence = self.record.sequence,
            short_code = %self.record.key,
            duplicate = metadata.duplicate,
            "Click event sent"
        );
        counter!("click_events_published_total").increment(1);
        let _ = self.reply.send(Ok(metadata));
    }

    fn fail(mut self, error: PublishError) {
        self.transition(DeliveryState::Failed);
        error!(
            partition = self.record.partition,
            sequence = self.record.sequence,
            short_code = %self.record.key,
            attempts = self.attempts,
            "Click event failed: {}",
            error
        );
        counter!("click_events_failed_total").increment(1);
        let _ = self.reply.send(Err(error));
    }
}

/// Per-lane view of the producer settings.
struct LaneConfig {
    topic: String,
    producer_id: String,
    idempotent: bool,
    retries: u32,
    request_timeout: Duration,
    max_in_flight: usize,
    retry_backoff: Duration,
}

impl LaneConfig {
    fn backoff(&self) -> impl Iterator<Item = Duration> + use<> {
        // from_millis(2).factor(b / 2) yields b, 2b, 4b, ...
        let factor = (self.retry_backoff.as_millis() as u64 / 2).max(1);
        ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(MAX_RETRY_BACKOFF.max(self.retry_backoff))
    }
}

struct Lane {
    partition: u32,
    config: Arc<LaneConfig>,
    channel: Arc<dyn EventChannel>,
    next_sequence: u64,
}

impl Lane {
    async fn run(mut self, mut rx: mpsc::Receiver<Envelope>) {
        while let Some(first) = rx.recv().await {
            let mut batch = vec![self.stamp(first)];
            while batch.len() < self.config.max_in_flight {
                match rx.try_recv() {
                    Ok(envelope) => batch.push(self.stamp(envelope)),
                    Err(_) => break,
                }
            }
            self.deliver(batch).await;
        }
        debug!(partition = self.partition, "Publisher lane drained");
    }

    fn take_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }

    fn stamp(&mut self, envelope: Envelope) -> InFlight {
        let sequence = self.take_sequence();
        debug!(
            partition = self.partition,
            sequence,
            short_code = %envelope.key,
            "Click event pending"
        );
        InFlight {
            record: ProducerRecord {
                topic: self.config.topic.clone(),
                partition: self.partition,
                key: envelope.key,
                value: envelope.value,
                producer_id: self.config.producer_id.clone(),
                sequence,
            },
            deadline: envelope.enqueued_at + self.config.request_timeout,
            state: DeliveryState::Pending,
            attempts: 0,
            reply: envelope.reply,
        }
    }

    /// Drives one batch to a terminal state for every record.
    async fn deliver(&mut self, mut pending: Vec<InFlight>) {
        let mut backoff = self.config.backoff();
        let mut retries = 0u32;

        loop {
            let now = Instant::now();
            let (expired, live): (Vec<_>, Vec<_>) =
                pending.into_iter().partition(|p| p.deadline <= now);
            for record in expired {
                let attempts = record.attempts;
                record.fail(PublishError::DeliveryTimeout { attempts });
            }
            pending = live;

            let Some(deadline) = pending.iter().map(|p| p.deadline).min() else {
                return;
            };

            let records: Vec<ProducerRecord> = pending
                .iter_mut()
                .map(|p| {
                    p.attempts += 1;
                    p.record.clone()
                })
                .collect();

            let sent = tokio::time::timeout_at(
                deadline,
                self.channel.send_batch(self.partition, &records),
            )
            .await;

            let error = match sent {
                Ok(Ok(outcomes)) if outcomes.len() == pending.len() => {
                    for (record, outcome) in pending.into_iter().zip(outcomes) {
                        match outcome {
                            Ok(metadata) => record.succeed(metadata),
                            Err(e) => record.fail(PublishError::Channel(e)),
                        }
                    }
                    return;
                }
                Ok(Ok(outcomes)) => ChannelError::Unavailable(format!(
                    "channel acknowledged {} of {} records",
                    outcomes.len(),
                    pending.len()
                )),
                Ok(Err(e)) => e,
                Err(_) => ChannelError::Timeout,
            };

            if !error.is_retriable() {
                for record in pending {
                    record.fail(PublishError::Channel(error.clone()));
                }
                return;
            }

            if retries >= self.config.retries {
                for record in pending {
                    let attempts = record.attempts;
                    record.fail(PublishError::RetriesExhausted {
                        attempts,
                        last: error.clone(),
                    });
                }
                return;
            }
            retries += 1;

            for record in pending.iter_mut() {
                record.transition(DeliveryState::Retrying);
                warn!(
                    partition = self.partition,
                    sequence = record.record.sequence,
                    short_code = %record.record.key,
                    attempt = record.attempts,
                    "Click event retrying: {}",
                    error
                );
                counter!("telemetry_publish_retries_total").increment(1);
            }

            let delay = backoff.next().unwrap_or(MAX_RETRY_BACKOFF);
            tokio::time::sleep_until((Instant::now() + delay).min(deadline)).await;

            if !self.config.idempotent {
                for record in pending.iter_mut() {
                    record.record.sequence = self.take_sequence();
                }
            }
        }
    }
}

/// Publishes click events to an [`EventChannel`], keyed by short code.
///
/// Created once at startup and shared by reference. Must be constructed
/// inside a Tokio runtime, since it spawns one lane task per partition.
pub struct TelemetryPublisher {
    partitions: u32,
    max_block: Duration,
    lanes: RwLock<Option<Vec<mpsc::Sender<Envelope>>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    channel: Arc<dyn EventChannel>,
}

impl TelemetryPublisher {
    pub fn new(channel: Arc<dyn EventChannel>, settings: &ProducerSettings) -> Self {
        let config = Arc::new(LaneConfig {
            topic: settings.topic.clone(),
            producer_id: generate_producer_id(),
            idempotent: settings.enable_idempotence,
            retries: settings.retries,
            request_timeout: settings.request_timeout,
            max_in_flight: settings.max_in_flight.max(1),
            retry_backoff: settings.retry_backoff,
        });

        let partitions = settings.partitions.max(1);
        let mut senders = Vec::with_capacity(partitions as usize);
        let mut handles = Vec::with_capacity(partitions as usize);

        for partition in 0..partitions {
            let (tx, rx) = mpsc::channel(settings.lane_capacity.max(1));
            let lane = Lane {
                partition,
                config: Arc::clone(&config),
                channel: Arc::clone(&channel),
                next_sequence: 0,
            };
            senders.push(tx);
            handles.push(tokio::spawn(lane.run(rx)));
        }

        info!(
            topic = %config.topic,
            partitions,
            producer_id = %config.producer_id,
            idempotent = config.idempotent,
            max_in_flight = config.max_in_flight,
            "Telemetry publisher started"
        );

        Self {
            partitions,
            max_block: settings.max_block,
            lanes: RwLock::new(Some(senders)),
            handles: Mutex::new(handles),
            channel,
        }
    }

    /// Queues `event` for delivery.
    ///
    /// Waits at most `max_block` for room in the partition's queue. Events
    /// with the same short code are delivered in the order their `publish`
    /// calls returned.
    ///
    /// # Errors
    ///
    /// Fails with [`PublishError::Serialization`], [`PublishError::BufferFull`]
    /// or [`PublishError::Closed`]. Delivery failures are reported by the
    /// returned [`DeliveryFuture`].
    pub async fn publish(&self, event: &ClickEvent) -> Result<DeliveryFuture, PublishError> {
        let value = event.to_json()?;
        let key = event.key().to_string();
        let partition = partition_for(&key, self.partitions);

        let lane = {
            let lanes = self.lanes.read().unwrap_or_else(|e| e.into_inner());
            lanes
                .as_ref()
                .and_then(|senders| senders.get(partition as usize))
                .cloned()
                .ok_or(PublishError::Closed)?
        };

        let permit = tokio::time::timeout(self.max_block, lane.reserve())
            .await
            .map_err(|_| PublishError::BufferFull(self.max_block))?
            .map_err(|_| PublishError::Closed)?;

        let (reply, rx) = oneshot::channel();
        permit.send(Envelope {
            key,
            value,
            enqueued_at: Instant::now(),
            reply,
        });

        Ok(DeliveryFuture { rx })
    }

    pub fn partitions(&self) -> u32 {
        self.partitions
    }

    pub fn is_closed(&self) -> bool {
        self.lanes.read().unwrap_or_else(|e| e.into_inner()).is_none()
    }

    pub async fn health_check(&self) -> bool {
        !self.is_closed() && self.channel.health_check().await
    }

    /// Stops accepting events, waits up to `timeout` for queued events to be
    /// resolved, then closes the channel.
    ///
    /// Lanes still busy at the deadline are aborted; their pending deliveries
    /// resolve to [`PublishError::Closed`]. Calling `close` again is a no-op.
    pub async fn close(&self, timeout: Duration) -> Result<(), ChannelError> {
        let senders = self
            .lanes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(senders) = senders else {
            return Ok(());
        };
        drop(senders);

        let handles: Vec<JoinHandle<()>> =
            std::mem::take(&mut *self.handles.lock().unwrap_or_else(|e| e.into_inner()));
        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();

        let drained = tokio::time::timeout(timeout, async {
            for handle in handles {
                if let Err(e) = handle.await {
                    error!("Publisher lane panicked: {}", e);
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!(?timeout, "Publisher lanes did not drain in time, aborting");
            for abort in aborts {
                abort.abort();
            }
        }

        self.channel.close().await?;
        info!("Telemetry publisher closed");
        Ok(())
    }
}

fn generate_producer_id() -> String {
    let mut buffer = [0u8; 8];
    if getrandom::fill(&mut buffer).is_err() {
        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        buffer = nanos.to_le_bytes();
    }
    hex::encode(buffer)
}
