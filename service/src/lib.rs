//! # Frontdesk
//!
//! Priority queue routing for walk-in and appointment patients.
//!
//! Walk-ins and booked patients take a number at a reception kiosk; the
//! service scores them, assigns the least-loaded online counter, and hands
//! back a ticket. Every mutation is an append to an ordered log — the log
//! is the system of record, and queue listings, positions and wait
//! estimates are projections rebuilt by replay. A consumer-group worker
//! drains the assignment log and fans real-time updates out to connected
//! counter, doctor and technician screens.
//!
//! ## Modules
//!
//! - [`priority`]: scoring rules and the single queue comparator
//! - [`issuer`]: identity resolution and ticket issuance
//! - [`selector`]: counter scoring and randomized tie-break
//! - [`projector`]: replay-and-filter queue projection
//! - [`queue`]: add/update/remove/list/stats over the per-counter logs
//! - [`consumer`]: the consumer-group worker on the assignment log
//! - [`notifier`]: scoped fan-out channels plus broadcast
//! - [`directory`]: read-only lookups into the upstream systems
//! - [`api`] / [`server`] / [`ws`]: the HTTP surface

pub mod api;
pub mod config;
pub mod consumer;
pub mod counters;
pub mod directory;
pub mod effects;
pub mod error;
pub mod issuer;
pub mod mocks;
pub mod notifier;
pub mod priority;
pub mod projector;
pub mod queue;
pub mod selector;
pub mod server;
pub mod types;
pub mod ws;

pub use config::Config;
pub use error::{Error, Result};
