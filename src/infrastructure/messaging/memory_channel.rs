//! In-process event channel.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

use super::channel::{ChannelError, EventChannel, ProducerRecord, RecordMetadata, SendOutcome};

/// A record as appended to a partition log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub partition: u32,
    pub offset: u64,
    pub key: String,
    pub value: String,
    pub producer_id: String,
    pub sequence: u64,
}

enum Fault {
    /// Fail the next batch before anything is appended.
    Fail(ChannelError),
    /// Append the next batch, then report a transport failure.
    LoseAck,
}

#[derive(Default)]
struct State {
    logs: HashMap<u32, Vec<StoredRecord>>,
    /// Last accepted sequence per `(producer_id, partition)`.
    producers: HashMap<(String, u32), u64>,
    /// Offset of each accepted `(producer_id, partition, sequence)`.
    offsets: HashMap<(String, u32, u64), u64>,
    faults: VecDeque<Fault>,
    rejected_keys: HashSet<String>,
    unavailable: bool,
    closed: bool,
    batches: usize,
}

/// Event channel kept in process memory.
///
/// Implements the full [`EventChannel`] contract (ordered partition logs,
/// idempotent appends) and lets tests inject transport faults. Used as the
/// fallback channel when no Redis URL is configured; events are then lost
/// on restart.
#[derive(Default)]
pub struct InMemoryEventChannel {
    state: Mutex<State>,
    latency: Mutex<Duration>,
}

impl InMemoryEventChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock cannot leave the logs half-written.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fails the next batch with `error` without appending it.
    pub fn fail_next(&self, error: ChannelError) {
        self.state().faults.push_back(Fault::Fail(error));
    }

    /// Appends the next batch but reports a lost acknowledgement.
    pub fn lose_next_ack(&self) {
        self.state().faults.push_back(Fault::LoseAck);
    }

    /// While set, every batch fails with [`ChannelError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    /// Rejects every record with this key as non-retriable.
    pub fn reject_key(&self, key: impl Into<String>) {
        self.state().rejected_keys.insert(key.into());
    }

    /// Delay applied to every batch before it is processed.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap_or_else(|e| e.into_inner()) = latency;
    }

    /// Records of one partition in offset order.
    pub fn records(&self, partition: u32) -> Vec<StoredRecord> {
        self.state().logs.get(&partition).cloned().unwrap_or_default()
    }

    /// Records with `key` in offset order.
    pub fn records_for_key(&self, key: &str) -> Vec<StoredRecord> {
        let state = self.state();
        let mut records: Vec<StoredRecord> = state
            .logs
            .values()
            .flatten()
            .filter(|r| r.key == key)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.offset);
        records
    }

    /// Total number of appended records across partitions.
    pub fn len(&self) -> usize {
        self.state().logs.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `send_batch` calls received, including failed ones.
    pub fn batches_received(&self) -> usize {
        self.state().batches
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    fn append(state: &mut State, partition: u32, record: &ProducerRecord) -> SendOutcome {
        if state.rejected_keys.contains(&record.key) {
            return Err(ChannelError::Rejected(format!(
                "key {} is not accepted",
                record.key
            )));
        }

        let producer_key = (record.producer_id.clone(), partition);
        if let Some(&last_sequence) = state.producers.get(&producer_key)
            && record.sequence <= last_sequence
        {
            let sequence_key = (record.producer_id.clone(), partition, record.sequence);
            let Some(&offset) = state.offsets.get(&sequence_key) else {
                return Err(ChannelError::Rejected(format!(
                    "sequence {} is out of order for producer {}",
                    record.sequence, record.producer_id
                )));
            };
            debug!(
                partition,
                sequence = record.sequence,
                offset,
                "Duplicate sequence acknowledged without append"
            );
            return Ok(RecordMetadata {
                partition,
                offset,
                duplicate: true,
            });
        }

        let log = state.logs.entry(partition).or_default();
        let offset = log.len() as u64;
        log.push(StoredRecord {
            partition,
            offset,
            key: record.key.clone(),
            value: record.value.clone(),
            producer_id: record.producer_id.clone(),
            sequence: record.sequence,
        });
        state.producers.insert(producer_key, record.sequence);
        state
            .offsets
            .insert((record.producer_id.clone(), partition, record.sequence), offset);

        Ok(RecordMetadata {
            partition,
            offset,
            duplicate: false,
        })
    }
}

#[async_trait]
impl EventChannel for InMemoryEventChannel {
    async fn send_batch(
        &self,
        partition: u32,
        records: &[ProducerRecord],
    ) -> Result<Vec<SendOutcome>, ChannelError> {
        let latency = *self.latency.lock().unwrap_or_else(|e| e.into_inner());
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state();
        state.batches += 1;

        if state.closed {
            return Err(ChannelError::Closed);
        }
        if state.unavailable {
            return Err(ChannelError::Unavailable("channel marked unavailable".into()));
        }

        let lose_ack = match state.faults.pop_front() {
            Some(Fault::Fail(error)) => return Err(error),
            Some(Fault::LoseAck) => true,
            None => false,
        };

        let outcomes: Vec<SendOutcome> = records
            .iter()
            .map(|record| Self::append(&mut state, partition, record))
            .collect();

        if lose_ack {
            return Err(ChannelError::Unavailable("acknowledgement lost".into()));
        }

        Ok(outcomes)
    }

    async fn health_check(&self) -> bool {
        let state = self.state();
        !state.closed && !state.unavailable
    }

    async fn close(&self) -> Result<(), ChannelError> {
        self.state().closed = true;
        Ok(())
    }
}
