//! Counter selection under load.
//!
//! Scores every online, under-capacity counter by backlog and throughput,
//! then picks uniformly at random among the top scorers so equally loaded
//! counters share incoming tickets instead of one of them starving. The
//! randomness source is injectable: production uses the thread RNG, tests
//! can pin the pick.

use crate::directory::Directory;
use crate::error::{Error, Result};
use crate::types::CounterStatus;
use frontdesk_core::presence::Presence;
use frontdesk_core::runtime_queue::RuntimeQueue;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Injectable choice among equally scored candidates.
pub trait TieBreak: Send + Sync {
    /// Pick an index in `0..len`. `len` is always ≥ 1.
    fn pick(&self, len: usize) -> usize;
}

/// Production tie-break: uniform over the candidates.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomTieBreak;

impl TieBreak for RandomTieBreak {
    fn pick(&self, len: usize) -> usize {
        rand::thread_rng().gen_range(0..len)
    }
}

/// Deterministic tie-break for tests: always the given index (modulo the
/// candidate count).
#[derive(Debug, Clone, Copy)]
pub struct FixedTieBreak(pub usize);

impl TieBreak for FixedTieBreak {
    fn pick(&self, len: usize) -> usize {
        self.0 % len
    }
}

/// Scores and selects counters from live presence and backlog signals.
pub struct CounterSelector {
    directory: Arc<dyn Directory>,
    presence: Arc<dyn Presence>,
    runtime_queue: Arc<dyn RuntimeQueue>,
    tie_break: Arc<dyn TieBreak>,
    default_max_queue: usize,
    default_average_minutes: u32,
    directory_timeout: Duration,
}

impl CounterSelector {
    /// Build a selector.
    #[must_use]
    pub fn new(
        directory: Arc<dyn Directory>,
        presence: Arc<dyn Presence>,
        runtime_queue: Arc<dyn RuntimeQueue>,
        tie_break: Arc<dyn TieBreak>,
        default_max_queue: usize,
        default_average_minutes: u32,
        directory_timeout: Duration,
    ) -> Self {
        Self {
            directory,
            presence,
            runtime_queue,
            tie_break,
            default_max_queue,
            default_average_minutes,
            directory_timeout,
        }
    }

    /// Live status of every counter in the directory.
    ///
    /// Recomputed per request from presence and backlog signals — counter
    /// status is transient and never persisted as its own record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unavailable`] when the directory cannot be read,
    /// or a store error from the presence/backlog reads.
    pub async fn statuses(&self) -> Result<Vec<CounterStatus>> {
        // The directory is an external read like any other: bounded, and
        // a miss is a retryable outage rather than a hang.
        let counters = tokio::time::timeout(self.directory_timeout, self.directory.counters())
            .await
            .map_err(|_| Error::Unavailable("counter directory timed out".to_string()))?
            .map_err(|e| Error::Unavailable(format!("counter directory unreadable: {e}")))?;

        let mut statuses = Vec::with_capacity(counters.len());
        for counter in counters {
            let is_online = self.presence.is_online(counter.id.to_string()).await?;
            let backlog = self.runtime_queue.len(counter.id.to_string()).await?;
            let max_queue = counter.max_queue_length.unwrap_or(self.default_max_queue);

            statuses.push(CounterStatus {
                counter_id: counter.id,
                counter_code: counter.code,
                counter_name: counter.name,
                location: counter.location,
                is_available: is_online && backlog < max_queue,
                is_online,
                current_queue_length: backlog,
                average_processing_minutes: counter
                    .average_processing_minutes
                    .unwrap_or(self.default_average_minutes),
                last_assigned_at: None,
            });
        }
        Ok(statuses)
    }

    /// Select the best available counter.
    ///
    /// Shorter backlog and faster processing score higher; ties at the top
    /// score are broken by the injected randomness source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unavailable`] when no counter is online and under
    /// capacity.
    pub async fn select(&self) -> Result<CounterStatus> {
        let available: Vec<CounterStatus> = self
            .statuses()
            .await?
            .into_iter()
            .filter(|c| c.is_available)
            .collect();

        if available.is_empty() {
            return Err(Error::Unavailable("no counter available".to_string()));
        }

        let best = available
            .iter()
            .map(|c| score(c))
            .max()
            .unwrap_or_default();
        let candidates: Vec<CounterStatus> = available
            .into_iter()
            .filter(|c| score(c) == best)
            .collect();

        let picked = self.tie_break.pick(candidates.len());
        let counter = candidates
            .get(picked)
            .cloned()
            .ok_or_else(|| Error::Unavailable("tie-break out of range".to_string()))?;

        tracing::debug!(
            counter = %counter.counter_id,
            score = best,
            candidates = candidates.len(),
            "Counter selected"
        );
        Ok(counter)
    }
}

/// Backlog/throughput score: `max(0, 10 − backlog)×10 + max(0, 30 − avg)×2`.
fn score(counter: &CounterStatus) -> i64 {
    let backlog = i64::try_from(counter.current_queue_length).unwrap_or(i64::MAX);
    let avg = i64::from(counter.average_processing_minutes);
    (10 - backlog).max(0) * 10 + (30 - avg).max(0) * 2
}
