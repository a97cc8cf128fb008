//! # Frontdesk Core
//!
//! Core traits and types for the Frontdesk queue-routing architecture.
//!
//! This crate defines the storage-free abstractions every other crate builds
//! on. The central idea: an ordered, append-only log per queue is the only
//! system of record. Everything else — queue listings, positions, wait
//! estimates, counter availability — is a disposable projection rebuilt by
//! replaying that log.
//!
//! ## Core Concepts
//!
//! - **[`stream::StreamKey`]**: the name of one append-only log
//! - **[`record::Record`]**: a flat field/value entry (the wire format)
//! - **[`log_store::LogStore`]**: append, ranged read, consumer groups,
//!   acknowledgment, and atomic per-scope sequence numbers
//! - **[`runtime_queue::RuntimeQueue`]**: a lightweight per-counter list for
//!   O(1) "what's enqueued right now" reads
//! - **[`presence::Presence`]**: TTL'd online markers per counter
//! - **[`clock::Clock`]**: injectable time source
//!
//! ## Architecture Principles
//!
//! - The log store is the only strong serialization point
//! - Entries are immutable once appended; removal is a new entry
//! - Readers reconstruct state by replay, never by shared memory
//! - Implementations are swappable (Redis in production, in-memory in tests)

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

pub mod clock;
pub mod log_store;
pub mod presence;
pub mod record;
pub mod runtime_queue;
pub mod stream;

pub use clock::{Clock, SystemClock};
pub use log_store::{GroupStart, LogStore, LogStoreError};
pub use presence::{Presence, PresenceError};
pub use record::{Record, RecordError};
pub use runtime_queue::{RuntimeQueue, RuntimeQueueError};
pub use stream::{ConsumerName, EntryId, GroupName, StreamKey};
