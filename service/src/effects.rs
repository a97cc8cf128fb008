//! Bounded background effect queue.
//!
//! Side effects that are not on the critical path — analytics appends,
//! runtime-queue pushes, live notifications — are dispatched here so the
//! caller never waits on them and a burst of issuances cannot spawn
//! unbounded concurrent background work. Effects run in dispatch order on
//! one drain task; failures are logged and swallowed.

use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

type BoxedEffect = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

struct NamedEffect {
    name: &'static str,
    effect: BoxedEffect,
}

/// Handle for dispatching fire-and-forget effects.
///
/// Cheap to clone; all clones feed the same bounded queue. The drain task
/// stops once every handle is dropped and the queue runs dry.
#[derive(Clone)]
pub struct EffectQueue {
    tx: mpsc::Sender<NamedEffect>,
}

impl EffectQueue {
    /// Create a queue with the given capacity and spawn its drain task.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<NamedEffect>(capacity);
        let handle = tokio::spawn(async move {
            while let Some(named) = rx.recv().await {
                tracing::trace!(effect = named.name, "Running background effect");
                named.effect.await;
            }
            tracing::debug!("Effect queue drained, worker stopping");
        });
        (Self { tx }, handle)
    }

    /// Enqueue an effect. When the queue is full the effect is dropped with
    /// a warning — background work is best-effort by contract, and shedding
    /// beats unbounded buffering.
    pub fn dispatch<F, E>(&self, name: &'static str, effect: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: std::fmt::Display,
    {
        let wrapped: BoxedEffect = Box::pin(async move {
            if let Err(e) = effect.await {
                tracing::warn!(effect = name, error = %e, "Background effect failed");
            }
        });

        if let Err(e) = self.tx.try_send(NamedEffect {
            name,
            effect: wrapped,
        }) {
            tracing::warn!(effect = name, error = %e, "Effect queue full, dropping effect");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Panics: tests assert on channel results
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn effects_run_in_dispatch_order() {
        let (queue, handle) = EffectQueue::new(8);
        let seen = Arc::new(tokio::sync::Mutex::new(Vec::new()));

        for n in 0..4_u32 {
            let seen = seen.clone();
            queue.dispatch("ordered", async move {
                seen.lock().await.push(n);
                Ok::<(), Infallible>(())
            });
        }

        drop(queue);
        handle.await.unwrap();
        assert_eq!(*seen.lock().await, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn failures_do_not_stop_the_drain() {
        let (queue, handle) = EffectQueue::new(8);
        let ran = Arc::new(AtomicUsize::new(0));

        queue.dispatch("failing", async { Err("boom") });
        let counter = ran.clone();
        queue.dispatch("after-failure", async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<(), Infallible>(())
        });

        drop(queue);
        handle.await.unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
