//! Click telemetry transport.
//!
//! Provides an [`EventChannel`] trait with two implementations:
//! - [`RedisStreamChannel`] - Redis Streams, one stream per partition
//! - [`InMemoryEventChannel`] - in-process, used in tests and when Redis is not configured
//!
//! and the [`TelemetryPublisher`] that delivers click events over it.

mod channel;
mod memory_channel;
mod partitioner;
mod publisher;
mod redis_channel;

pub use channel::{ChannelError, EventChannel, ProducerRecord, RecordMetadata, SendOutcome};
pub use memory_channel::{InMemoryEventChannel, StoredRecord};
pub use partitioner::{murmur2, partition_for};
pub use publisher::{DeliveryFuture, DeliveryState, PublishError, TelemetryPublisher};
pub use redis_channel::{RedisStreamChannel, ReplicaAcks};
