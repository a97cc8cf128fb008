//! In-memory presence markers with real TTL expiry.

use frontdesk_core::presence::{Presence, PresenceError};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// In-memory [`Presence`] implementation.
///
/// Markers expire against the monotonic clock, so short-TTL tests behave
/// exactly like the production store.
#[derive(Default)]
pub struct InMemoryPresence {
    markers: Mutex<HashMap<String, Instant>>,
}

impl InMemoryPresence {
    /// Create an empty presence set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Instant>>, PresenceError> {
        self.markers
            .lock()
            .map_err(|e| PresenceError(format!("lock poisoned: {e}")))
    }
}

impl Presence for InMemoryPresence {
    fn mark_online(
        &self,
        counter_id: String,
        ttl: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<(), PresenceError>> + Send + '_>> {
        Box::pin(async move {
            self.lock()?.insert(counter_id, Instant::now() + ttl);
            Ok(())
        })
    }

    fn mark_offline(
        &self,
        counter_id: String,
    ) -> Pin<Box<dyn Future<Output = Result<(), PresenceError>> + Send + '_>> {
        Box::pin(async move {
            self.lock()?.remove(&counter_id);
            Ok(())
        })
    }

    fn is_online(
        &self,
        counter_id: String,
    ) -> Pin<Box<dyn Future<Output = Result<bool, PresenceError>> + Send + '_>> {
        Box::pin(async move {
            Ok(self
                .lock()?
                .get(&counter_id)
                .is_some_and(|expiry| *expiry > Instant::now()))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Panics: tests assert on presence results
mod tests {
    use super::*;

    #[tokio::test]
    async fn marker_expires_after_ttl() {
        let presence = InMemoryPresence::new();
        presence
            .mark_online("c-1".into(), Duration::from_millis(20))
            .await
            .unwrap();
        assert!(presence.is_online("c-1".into()).await.unwrap());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!presence.is_online("c-1".into()).await.unwrap());
    }

    #[tokio::test]
    async fn mark_offline_removes_immediately() {
        let presence = InMemoryPresence::new();
        presence
            .mark_online("c-1".into(), Duration::from_secs(60))
            .await
            .unwrap();
        presence.mark_offline("c-1".into()).await.unwrap();
        assert!(!presence.is_online("c-1".into()).await.unwrap());
    }
}
