//! In-memory log store with consumer-group semantics.
//!
//! Faithful enough for behavioral tests: appends assign strictly increasing
//! entry ids, groups keep an independent delivery cursor, delivered entries
//! sit in a pending set until acknowledged, and the pending set survives for
//! inspection so tests can assert redeliverability.

use frontdesk_core::log_store::{GroupStart, LogStore, LogStoreError};
use frontdesk_core::record::Record;
use frontdesk_core::stream::{ConsumerName, EntryId, GroupName, StreamKey};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

#[derive(Default)]
struct GroupState {
    /// Index of the next undelivered entry.
    cursor: usize,
    /// Delivered-but-unacknowledged entries: entry id → consumer name.
    pending: HashMap<String, String>,
}

#[derive(Default)]
struct StreamState {
    entries: Vec<(EntryId, Record)>,
    groups: HashMap<String, GroupState>,
}

#[derive(Default)]
struct Inner {
    streams: HashMap<String, StreamState>,
    sequences: HashMap<String, u64>,
    next_entry: u64,
}

/// Deterministic in-memory [`LogStore`].
///
/// All state lives behind one mutex; operations are effectively serialized,
/// which matches the atomic-append guarantee the production store provides
/// per key.
#[derive(Default)]
pub struct InMemoryLogStore {
    inner: Mutex<Inner>,
}

impl InMemoryLogStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, LogStoreError> {
        self.inner
            .lock()
            .map_err(|e| LogStoreError::Store(format!("lock poisoned: {e}")))
    }

    /// Entry ids still pending (delivered, not acknowledged) for a group.
    ///
    /// Test-only inspection hook; the production store exposes the same
    /// information through its pending-entries list.
    ///
    /// # Errors
    ///
    /// Returns [`LogStoreError::Store`] if the internal lock is poisoned.
    pub fn pending(
        &self,
        key: &StreamKey,
        group: &GroupName,
    ) -> Result<Vec<EntryId>, LogStoreError> {
        let inner = self.lock()?;
        let Some(stream) = inner.streams.get(key.as_str()) else {
            return Ok(Vec::new());
        };
        let Some(state) = stream.groups.get(group.as_str()) else {
            return Ok(Vec::new());
        };
        let mut ids: Vec<EntryId> =
            state.pending.keys().map(|k| EntryId::from(k.as_str())).collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(ids)
    }

    /// Total number of entries appended to a key.
    ///
    /// # Errors
    ///
    /// Returns [`LogStoreError::Store`] if the internal lock is poisoned.
    pub fn entry_count(&self, key: &StreamKey) -> Result<usize, LogStoreError> {
        let inner = self.lock()?;
        Ok(inner
            .streams
            .get(key.as_str())
            .map_or(0, |s| s.entries.len()))
    }

    fn deliver(
        &self,
        key: &StreamKey,
        group: &GroupName,
        consumer: &ConsumerName,
        count: usize,
    ) -> Result<Vec<(EntryId, Record)>, LogStoreError> {
        let mut inner = self.lock()?;
        let Some(stream) = inner.streams.get_mut(key.as_str()) else {
            return Err(LogStoreError::GroupNotFound {
                key: key.clone(),
                group: group.clone(),
            });
        };
        let Some(state) = stream.groups.get_mut(group.as_str()) else {
            return Err(LogStoreError::GroupNotFound {
                key: key.clone(),
                group: group.clone(),
            });
        };

        let end = (state.cursor + count).min(stream.entries.len());
        let delivered: Vec<(EntryId, Record)> = stream.entries[state.cursor..end].to_vec();
        for (id, _) in &delivered {
            state
                .pending
                .insert(id.as_str().to_string(), consumer.as_str().to_string());
        }
        state.cursor = end;
        Ok(delivered)
    }
}

impl LogStore for InMemoryLogStore {
    fn append(
        &self,
        key: StreamKey,
        record: Record,
    ) -> Pin<Box<dyn Future<Output = Result<EntryId, LogStoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut inner = self.lock()?;
            inner.next_entry += 1;
            // Zero-padded so lexicographic order matches append order.
            let id = EntryId::new(format!("{:012}-0", inner.next_entry));
            inner
                .streams
                .entry(key.into_inner())
                .or_default()
                .entries
                .push((id.clone(), record));
            Ok(id)
        })
    }

    fn range(
        &self,
        key: StreamKey,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<(EntryId, Record)>, LogStoreError>> + Send + '_>>
    {
        Box::pin(async move {
            let inner = self.lock()?;
            Ok(inner
                .streams
                .get(key.as_str())
                .map(|s| s.entries.clone())
                .unwrap_or_default())
        })
    }

    fn create_group(
        &self,
        key: StreamKey,
        group: GroupName,
        start: GroupStart,
    ) -> Pin<Box<dyn Future<Output = Result<(), LogStoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut inner = self.lock()?;
            let stream = inner.streams.entry(key.into_inner()).or_default();
            let cursor = match start {
                GroupStart::Beginning => 0,
                GroupStart::End => stream.entries.len(),
            };
            // Idempotent: an existing group keeps its cursor and pending set.
            stream
                .groups
                .entry(group.as_str().to_string())
                .or_insert(GroupState {
                    cursor,
                    pending: HashMap::new(),
                });
            Ok(())
        })
    }

    fn read_group(
        &self,
        key: StreamKey,
        group: GroupName,
        consumer: ConsumerName,
        count: usize,
        block: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<(EntryId, Record)>, LogStoreError>> + Send + '_>>
    {
        Box::pin(async move {
            let delivered = self.deliver(&key, &group, &consumer, count)?;
            if !delivered.is_empty() || block.is_zero() {
                return Ok(delivered);
            }
            // Simulate the store's bounded blocking read: wait out the
            // window once, then return whatever arrived meanwhile.
            tokio::time::sleep(block).await;
            self.deliver(&key, &group, &consumer, count)
        })
    }

    fn ack(
        &self,
        key: StreamKey,
        group: GroupName,
        id: EntryId,
    ) -> Pin<Box<dyn Future<Output = Result<(), LogStoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut inner = self.lock()?;
            if let Some(state) = inner
                .streams
                .get_mut(key.as_str())
                .and_then(|s| s.groups.get_mut(group.as_str()))
            {
                state.pending.remove(id.as_str());
            }
            Ok(())
        })
    }

    fn next_sequence(
        &self,
        scope: String,
    ) -> Pin<Box<dyn Future<Output = Result<u64, LogStoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut inner = self.lock()?;
            let seq = inner.sequences.entry(scope).or_insert(0);
            *seq += 1;
            Ok(*seq)
        })
    }

    fn reset_sequence(
        &self,
        scope: String,
    ) -> Pin<Box<dyn Future<Output = Result<(), LogStoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut inner = self.lock()?;
            inner.sequences.remove(&scope);
            Ok(())
        })
    }
}
