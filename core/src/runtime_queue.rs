//! Runtime per-counter list.
//!
//! A lightweight push/pop/list interface keyed by counter id, used for O(1)
//! "what's currently enqueued" reads independent of full log replay. The
//! list is a convenience cache, never a system of record: clearing it loses
//! nothing that the log can't rebuild.

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors from the runtime queue backend.
#[derive(Error, Debug)]
pub enum RuntimeQueueError {
    /// Connection or command failure.
    #[error("Runtime queue error: {0}")]
    Store(String),

    /// A stored item failed to decode as JSON.
    #[error("Corrupt queue item on {counter_id}: {reason}")]
    Corrupt {
        /// Counter whose list held the item.
        counter_id: String,
        /// Decode failure detail.
        reason: String,
    },
}

/// Per-counter FIFO list of enqueued items (JSON documents).
///
/// Items are opaque to the queue itself; callers serialize whatever shape
/// they need. Implementations must be `Send + Sync`.
pub trait RuntimeQueue: Send + Sync {
    /// Push an item to the back of a counter's list.
    ///
    /// # Errors
    ///
    /// - [`RuntimeQueueError::Store`]: connection or command failure
    fn push(
        &self,
        counter_id: String,
        item: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<(), RuntimeQueueError>> + Send + '_>>;

    /// Pop the front item of a counter's list, if any.
    ///
    /// # Errors
    ///
    /// - [`RuntimeQueueError::Store`]: connection or command failure
    /// - [`RuntimeQueueError::Corrupt`]: the stored item was not valid JSON
    fn pop(
        &self,
        counter_id: String,
    ) -> Pin<Box<dyn Future<Output = Result<Option<serde_json::Value>, RuntimeQueueError>> + Send + '_>>;

    /// List a counter's items front to back without consuming them.
    ///
    /// # Errors
    ///
    /// - [`RuntimeQueueError::Store`]: connection or command failure
    /// - [`RuntimeQueueError::Corrupt`]: a stored item was not valid JSON
    fn list(
        &self,
        counter_id: String,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<serde_json::Value>, RuntimeQueueError>> + Send + '_>>;

    /// Drop every item on a counter's list.
    ///
    /// # Errors
    ///
    /// - [`RuntimeQueueError::Store`]: connection or command failure
    fn clear(
        &self,
        counter_id: String,
    ) -> Pin<Box<dyn Future<Output = Result<(), RuntimeQueueError>> + Send + '_>>;

    /// Current length of a counter's list.
    ///
    /// # Errors
    ///
    /// - [`RuntimeQueueError::Store`]: connection or command failure
    fn len(
        &self,
        counter_id: String,
    ) -> Pin<Box<dyn Future<Output = Result<usize, RuntimeQueueError>> + Send + '_>>;
}
