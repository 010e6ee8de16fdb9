//! Redis Streams event channel.

use async_trait::async_trait;
use redis::{AsyncCommands, Client, RedisError, aio::ConnectionManager};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::channel::{ChannelError, EventChannel, ProducerRecord, RecordMetadata, SendOutcome};

/// Dedup check, offset assignment and append, executed atomically.
///
/// KEYS: stream, producer table, offset counter, sequence offsets.
/// ARGV: producer id, sequence, key, value, sequence window.
/// Returns `{duplicate, offset}`; a duplicate carries the offset of its
/// first append.
const APPEND_SCRIPT: &str = r#"
local sequence = tonumber(ARGV[2])
local last = redis.call('HGET', KEYS[2], ARGV[1])
if last and sequence <= tonumber(last) then
  local original = redis.call('HGET', KEYS[4], ARGV[2])
  if original then
    return {1, tonumber(original)}
  end
  return redis.error_reply('OUT_OF_ORDER_SEQUENCE ' .. ARGV[2])
end
local offset = redis.call('INCR', KEYS[3]) - 1
redis.call('XADD', KEYS[1], '*',
  'key', ARGV[3], 'value', ARGV[4], 'offset', offset,
  'producer', ARGV[1], 'sequence', ARGV[2])
redis.call('HSET', KEYS[2], ARGV[1], ARGV[2])
redis.call('HSET', KEYS[4], ARGV[2], offset)
local expired = sequence - tonumber(ARGV[5])
if expired >= 0 then
  redis.call('HDEL', KEYS[4], tostring(expired))
end
return {0, offset}
"#;

/// Sequences per producer whose offsets are kept for duplicate acks.
/// Covers any batch a retry can resend.
const SEQUENCE_WINDOW: u64 = 1024;

/// Replication requirement applied after every batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicaAcks {
    /// Replicas that must confirm the write. Zero skips `WAIT`.
    pub replicas: u32,
    pub timeout: Duration,
}

/// Event channel backed by one Redis stream per partition.
///
/// Partition `p` of topic `t` is the stream `t:p`. Each entry carries
/// `key`, `value`, `offset`, `producer` and `sequence` fields; `offset`
/// comes from a per-partition counter so it is dense and starts at 0.
pub struct RedisStreamChannel {
    conn: ConnectionManager,
    replica_acks: Option<ReplicaAcks>,
    closed: AtomicBool,
}

impl RedisStreamChannel {
    /// Connects to Redis and verifies the connection with a PING.
    ///
    /// `replica_acks` is `None` when a leader acknowledgement is enough.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Unavailable`] if the URL is invalid or the
    /// server cannot be reached.
    pub async fn connect(
        redis_url: &str,
        replica_acks: Option<ReplicaAcks>,
    ) -> Result<Self, ChannelError> {
        info!("Connecting to Redis event channel");

        let client = Client::open(redis_url).map_err(|e| {
            ChannelError::Unavailable(format!("Failed to create Redis client: {}", e))
        })?;

        let manager = ConnectionManager::new(client).await.map_err(|e| {
            ChannelError::Unavailable(format!("Failed to connect to Redis: {}", e))
        })?;

        let mut test_conn = manager.clone();
        test_conn
            .ping::<()>()
            .await
            .map_err(|e| ChannelError::Unavailable(format!("Redis PING failed: {}", e)))?;

        info!("✓ Connected to Redis event channel");

        Ok(Self {
            conn: manager,
            replica_acks: replica_acks.filter(|acks| acks.replicas > 0),
            closed: AtomicBool::new(false),
        })
    }

    fn stream_key(topic: &str, partition: u32) -> String {
        format!("{}:{}", topic, partition)
    }

    fn sequence_key(stream: &str, producer_id: &str) -> String {
        format!("{}:seqs:{}", stream, producer_id)
    }

    async fn wait_for_replicas(&self, acks: ReplicaAcks) -> Result<(), ChannelError> {
        let mut conn = self.conn.clone();
        let acked: u32 = redis::cmd("WAIT")
            .arg(acks.replicas)
            .arg(acks.timeout.as_millis() as u64)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;

        if acked < acks.replicas {
            warn!(required = acks.replicas, acked, "Replica acknowledgement short");
            return Err(ChannelError::NotEnoughReplicas {
                required: acks.replicas,
                acked,
            });
        }
        Ok(())
    }
}

fn map_redis_error(e: RedisError) -> ChannelError {
    if e.is_timeout() {
        ChannelError::Timeout
    } else if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() {
        ChannelError::Unavailable(e.to_string())
    } else {
        ChannelError::Rejected(e.to_string())
    }
}

#[async_trait]
impl EventChannel for RedisStreamChannel {
    async fn send_batch(
        &self,
        partition: u32,
        records: &[ProducerRecord],
    ) -> Result<Vec<SendOutcome>, ChannelError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ChannelError::Closed);
        }
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for record in records {
            let stream = Self::stream_key(&record.topic, partition);
            pipe.cmd("EVAL")
                .arg(APPEND_SCRIPT)
                .arg(4)
                .arg(&stream)
                .arg(format!("{}:producers", stream))
                .arg(format!("{}:offset", stream))
                .arg(Self::sequence_key(&stream, &record.producer_id))
                .arg(&record.producer_id)
                .arg(record.sequence)
                .arg(&record.key)
                .arg(&record.value)
                .arg(SEQUENCE_WINDOW);
        }

        let mut conn = self.conn.clone();
        let replies: Vec<(i64, i64)> = pipe
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;

        if let Some(acks) = self.replica_acks {
            self.wait_for_replicas(acks).await?;
        }

        debug!(partition, records = records.len(), "Batch appended to stream");

        Ok(replies
            .into_iter()
            .map(|(duplicate, offset)| {
                Ok(RecordMetadata {
                    partition,
                    offset: offset.max(0) as u64,
                    duplicate: duplicate == 1,
                })
            })
            .collect())
    }

    async fn health_check(&self) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        let mut conn = self.conn.clone();
        conn.ping::<()>().await.is_ok()
    }

    async fn close(&self) -> Result<(), ChannelError> {
        self.closed.store(true, Ordering::Release);
        info!("Redis event channel closed");
        Ok(())
    }
}
