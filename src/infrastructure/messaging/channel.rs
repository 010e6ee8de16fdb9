//! Event channel trait and wire-level types.

use async_trait::async_trait;
use thiserror::Error;

/// Errors reported by an [`EventChannel`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("event channel unavailable: {0}")]
    Unavailable(String),

    #[error("event channel request timed out")]
    Timeout,

    #[error("not enough replicas acknowledged the write: required {required}, acked {acked}")]
    NotEnoughReplicas { required: u32, acked: u32 },

    #[error("record rejected by event channel: {0}")]
    Rejected(String),

    #[error("event channel is closed")]
    Closed,
}

impl ChannelError {
    /// Whether re-sending the same record may succeed.
    ///
    /// Retries are safe for every retriable error because channels
    /// deduplicate on `(producer_id, partition, sequence)`.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ChannelError::Unavailable(_)
                | ChannelError::Timeout
                | ChannelError::NotEnoughReplicas { .. }
        )
    }
}

/// A keyed message ready to be appended to one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerRecord {
    pub topic: String,
    pub partition: u32,
    pub key: String,
    pub value: String,
    /// Identifies the producer instance for deduplication.
    pub producer_id: String,
    /// Position of this record in the producer's stream for `partition`.
    /// Retries reuse it.
    pub sequence: u64,
}

/// Acknowledgement for an appended record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordMetadata {
    pub partition: u32,
    pub offset: u64,
    /// The channel had already accepted this sequence; `offset` is the
    /// offset of that first append.
    pub duplicate: bool,
}

/// Result for one record of a batch.
pub type SendOutcome = Result<RecordMetadata, ChannelError>;

/// Ordered, durable, partitioned message transport.
///
/// Within a partition, records of one batch are appended in slice order and
/// batches are appended in call order. Implementations must deduplicate:
/// a record whose `sequence` is not greater than the last sequence accepted
/// for its `(producer_id, partition)` is acknowledged with
/// `duplicate = true` and not appended again.
///
/// # Implementations
///
/// - [`crate::infrastructure::messaging::RedisStreamChannel`] - Redis Streams
/// - [`crate::infrastructure::messaging::InMemoryEventChannel`] - in-process, with fault injection
#[async_trait]
pub trait EventChannel: Send + Sync {
    /// Appends `records` (all for `partition`) in order.
    ///
    /// # Errors
    ///
    /// A whole-batch `Err` means the transport failed and any record of the
    /// batch may or may not have been appended. Per-record failures are
    /// reported in the returned vector, which has one entry per record, and
    /// are final for that record.
    async fn send_batch(
        &self,
        partition: u32,
        records: &[ProducerRecord],
    ) -> Result<Vec<SendOutcome>, ChannelError>;

    /// Checks if the channel backend is reachable.
    async fn health_check(&self) -> bool;

    /// Releases the channel. Later sends fail with [`ChannelError::Closed`].
    async fn close(&self) -> Result<(), ChannelError>;
}
