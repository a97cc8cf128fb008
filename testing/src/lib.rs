//! # Frontdesk Testing
//!
//! Testing utilities and helpers for the Frontdesk architecture.
//!
//! This crate provides deterministic in-memory implementations of the core
//! storage traits so every component can be exercised without a live Redis:
//!
//! - [`InMemoryLogStore`]: append-only streams with real consumer-group
//!   semantics (per-group cursor, pending set, explicit ack)
//! - [`InMemoryRuntimeQueue`]: per-counter FIFO lists
//! - [`InMemoryPresence`]: TTL'd online markers on real time
//! - [`FixedClock`] / [`test_clock`]: frozen time for reproducible tests
//!
//! ## Example
//!
//! ```
//! use frontdesk_testing::InMemoryLogStore;
//! use frontdesk_core::{LogStore, Record, StreamKey};
//!
//! # async fn example() {
//! let store = InMemoryLogStore::new();
//! let key = StreamKey::new("counter:c-1:queue");
//!
//! store
//!     .append(key.clone(), Record::new().with("status", "WAITING"))
//!     .await
//!     .unwrap();
//!
//! let entries = store.range(key).await.unwrap();
//! assert_eq!(entries.len(), 1);
//! # }
//! ```

pub mod log_store;
pub mod mocks;
pub mod presence;
pub mod runtime_queue;

pub use log_store::InMemoryLogStore;
pub use mocks::{FixedClock, test_clock};
pub use presence::InMemoryPresence;
pub use runtime_queue::InMemoryRuntimeQueue;
