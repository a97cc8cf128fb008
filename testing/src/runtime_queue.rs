//! In-memory runtime queue.

use frontdesk_core::runtime_queue::{RuntimeQueue, RuntimeQueueError};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard};

/// In-memory [`RuntimeQueue`] keyed by counter id.
#[derive(Default)]
pub struct InMemoryRuntimeQueue {
    lists: Mutex<HashMap<String, VecDeque<serde_json::Value>>>,
}

impl InMemoryRuntimeQueue {
    /// Create an empty queue set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<String, VecDeque<serde_json::Value>>>, RuntimeQueueError>
    {
        self.lists
            .lock()
            .map_err(|e| RuntimeQueueError::Store(format!("lock poisoned: {e}")))
    }
}

impl RuntimeQueue for InMemoryRuntimeQueue {
    fn push(
        &self,
        counter_id: String,
        item: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<(), RuntimeQueueError>> + Send + '_>> {
        Box::pin(async move {
            self.lock()?.entry(counter_id).or_default().push_back(item);
            Ok(())
        })
    }

    fn pop(
        &self,
        counter_id: String,
    ) -> Pin<Box<dyn Future<Output = Result<Option<serde_json::Value>, RuntimeQueueError>> + Send + '_>>
    {
        Box::pin(async move {
            Ok(self
                .lock()?
                .get_mut(&counter_id)
                .and_then(VecDeque::pop_front))
        })
    }

    fn list(
        &self,
        counter_id: String,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<serde_json::Value>, RuntimeQueueError>> + Send + '_>>
    {
        Box::pin(async move {
            Ok(self
                .lock()?
                .get(&counter_id)
                .map(|list| list.iter().cloned().collect())
                .unwrap_or_default())
        })
    }

    fn clear(
        &self,
        counter_id: String,
    ) -> Pin<Box<dyn Future<Output = Result<(), RuntimeQueueError>> + Send + '_>> {
        Box::pin(async move {
            self.lock()?.remove(&counter_id);
            Ok(())
        })
    }

    fn len(
        &self,
        counter_id: String,
    ) -> Pin<Box<dyn Future<Output = Result<usize, RuntimeQueueError>> + Send + '_>> {
        Box::pin(async move { Ok(self.lock()?.get(&counter_id).map_or(0, VecDeque::len)) })
    }
}
