//! Log store trait — the ordered, append-only system of record.
//!
//! This module defines the core abstraction over the log store: a database
//! of per-key append-only streams with consumer-group delivery. It exposes
//! exactly the operations the routing system needs and nothing else — no
//! component reaches through this interface to a lower-level client.
//!
//! # Design
//!
//! - Appends are atomic and totally ordered per key; the store assigns the
//!   [`EntryId`]. This is what makes concurrent ticket issuance from
//!   multiple reception points safe without an application-level lock.
//! - Sequence numbers are an atomic counter op against the store, never
//!   computed by the application.
//! - Consumer groups deliver each entry to exactly one member consumer and
//!   require explicit acknowledgment; unacknowledged entries are
//!   redelivered after a restart.
//!
//! # Implementations
//!
//! - `RedisLogStore` (in `frontdesk-redis`): production, Redis Streams
//! - `InMemoryLogStore` (in `frontdesk-testing`): deterministic tests
//!
//! # Dyn Compatibility
//!
//! The trait uses explicit `Pin<Box<dyn Future>>` returns instead of
//! `async fn` so it can be used as a trait object (`Arc<dyn LogStore>`)
//! and shared across every component of the service.

use crate::record::Record;
use crate::stream::{ConsumerName, EntryId, GroupName, StreamKey};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during log store operations.
#[derive(Error, Debug)]
pub enum LogStoreError {
    /// The requested stream key has never been appended to.
    #[error("Stream not found: {0}")]
    StreamNotFound(StreamKey),

    /// The named consumer group does not exist on the key.
    #[error("Consumer group {group} not found on {key}")]
    GroupNotFound {
        /// Stream key the group was expected on.
        key: StreamKey,
        /// The missing group.
        group: GroupName,
    },

    /// Connection or command failure against the backing store.
    #[error("Store error: {0}")]
    Store(String),

    /// A record failed to encode or decode at the store boundary.
    #[error("Encoding error: {0}")]
    Encoding(String),
}

/// Where a newly created consumer group starts reading.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupStart {
    /// Deliver every entry already in the log, then new ones.
    Beginning,
    /// Deliver only entries appended after group creation.
    End,
}

/// Ordered, append-only record store with consumer-group delivery.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the store is shared behind an
/// `Arc` by every request path and the background consumer.
pub trait LogStore: Send + Sync {
    /// Append a record to a stream.
    ///
    /// The store assigns the entry id; ids are strictly increasing within a
    /// key even under concurrent appenders.
    ///
    /// # Errors
    ///
    /// - [`LogStoreError::Store`]: connection or command failure
    /// - [`LogStoreError::Encoding`]: the record could not be flattened
    fn append(
        &self,
        key: StreamKey,
        record: Record,
    ) -> Pin<Box<dyn Future<Output = Result<EntryId, LogStoreError>> + Send + '_>>;

    /// Read the full stream, oldest first.
    ///
    /// A key that has never been appended to yields an empty vector, not an
    /// error — new queues start empty.
    ///
    /// # Errors
    ///
    /// - [`LogStoreError::Store`]: connection or command failure
    fn range(
        &self,
        key: StreamKey,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<(EntryId, Record)>, LogStoreError>> + Send + '_>>;

    /// Create a consumer group on a key, idempotently.
    ///
    /// Creating a group that already exists is a no-op, so every replica
    /// can call this unconditionally at startup. The key is created empty
    /// if it does not exist yet.
    ///
    /// # Errors
    ///
    /// - [`LogStoreError::Store`]: connection or command failure
    fn create_group(
        &self,
        key: StreamKey,
        group: GroupName,
        start: GroupStart,
    ) -> Pin<Box<dyn Future<Output = Result<(), LogStoreError>> + Send + '_>>;

    /// Read up to `count` entries not yet delivered to the group, blocking
    /// for at most `block` before returning whatever arrived (usually
    /// nothing — an empty read is the normal case).
    ///
    /// Entries returned here are *pending* for `consumer` until
    /// [`ack`](Self::ack)ed; a crashed consumer's pending entries become
    /// eligible for redelivery.
    ///
    /// # Errors
    ///
    /// - [`LogStoreError::GroupNotFound`]: the group was never created
    /// - [`LogStoreError::Store`]: connection or command failure
    fn read_group(
        &self,
        key: StreamKey,
        group: GroupName,
        consumer: ConsumerName,
        count: usize,
        block: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<(EntryId, Record)>, LogStoreError>> + Send + '_>>;

    /// Acknowledge one delivered entry on behalf of the group.
    ///
    /// Only acknowledged entries leave the pending set; callers must ack
    /// strictly after their processing of the entry succeeded.
    ///
    /// # Errors
    ///
    /// - [`LogStoreError::Store`]: connection or command failure
    fn ack(
        &self,
        key: StreamKey,
        group: GroupName,
        id: EntryId,
    ) -> Pin<Box<dyn Future<Output = Result<(), LogStoreError>> + Send + '_>>;

    /// Atomically increment and return the sequence counter for a scope
    /// (one scope per counter). First call yields 1.
    ///
    /// # Errors
    ///
    /// - [`LogStoreError::Store`]: connection or command failure
    fn next_sequence(
        &self,
        scope: String,
    ) -> Pin<Box<dyn Future<Output = Result<u64, LogStoreError>> + Send + '_>>;

    /// Reset a scope's sequence counter to zero (next issuance yields 1).
    ///
    /// Used by the clear-queue admin operation.
    ///
    /// # Errors
    ///
    /// - [`LogStoreError::Store`]: connection or command failure
    fn reset_sequence(
        &self,
        scope: String,
    ) -> Pin<Box<dyn Future<Output = Result<(), LogStoreError>> + Send + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_not_found_error_display() {
        let error = LogStoreError::GroupNotFound {
            key: StreamKey::new("queue:tickets"),
            group: GroupName::new("ticket-processors"),
        };

        let display = format!("{error}");
        assert!(display.contains("ticket-processors"));
        assert!(display.contains("queue:tickets"));
    }

    #[test]
    fn stream_not_found_error_display() {
        let error = LogStoreError::StreamNotFound(StreamKey::new("counter:missing:queue"));
        assert!(format!("{error}").contains("counter:missing:queue"));
    }
}
