//! Counter presence — TTL'd online markers.
//!
//! A counter is online while its marker exists; markers expire after a TTL
//! so a crashed counter client goes offline without any explicit signal.
//! Counter frontends are expected to re-mark themselves on a heartbeat
//! shorter than the TTL.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Errors from the presence backend.
#[derive(Error, Debug)]
#[error("Presence error: {0}")]
pub struct PresenceError(pub String);

/// TTL'd per-counter online markers.
pub trait Presence: Send + Sync {
    /// Mark a counter online for `ttl`. Re-marking extends the TTL.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError`] on backend failure.
    fn mark_online(
        &self,
        counter_id: String,
        ttl: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<(), PresenceError>> + Send + '_>>;

    /// Remove a counter's marker immediately.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError`] on backend failure.
    fn mark_offline(
        &self,
        counter_id: String,
    ) -> Pin<Box<dyn Future<Output = Result<(), PresenceError>> + Send + '_>>;

    /// Whether the counter's marker currently exists.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError`] on backend failure.
    fn is_online(
        &self,
        counter_id: String,
    ) -> Pin<Box<dyn Future<Output = Result<bool, PresenceError>> + Send + '_>>;
}
