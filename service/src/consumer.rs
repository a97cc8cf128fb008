//! Assignment-log consumer worker.
//!
//! One long-lived worker per deployment replica drains the global
//! assignment log through a named consumer group, dispatches each entry to
//! a handler, and acknowledges only the entries whose dispatch completed.
//! Replicas sharing the group name split the log between them, so scaling
//! out never double-notifies.
//!
//! # Lifecycle
//!
//! ```text
//! INIT (create group, ignore already-exists)
//!   └─> loop:
//!         bounded-block group read (usually empty)
//!         per entry: decode → dispatch → ack on success
//!         on poll failure: log, sleep, retry
//!       until shutdown signal
//! ```
//!
//! A failing entry is logged and left unacknowledged — it stays pending in
//! the group and becomes eligible for redelivery after a restart. One bad
//! entry never stops the loop or the entries behind it.

use crate::notifier::{EventKind, Notifier, Scope};
use crate::types::Ticket;
use async_trait::async_trait;
use frontdesk_core::log_store::{GroupStart, LogStore};
use frontdesk_core::record::Record;
use frontdesk_core::stream::{ConsumerName, EntryId, GroupName, StreamKey};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Handler for one decoded assignment-log entry.
///
/// Returning an error leaves the entry unacknowledged (redeliverable);
/// returning `Ok` acknowledges it. Handlers must therefore be idempotent —
/// redelivery after a crash is part of the contract.
#[async_trait]
pub trait EntryHandler: Send + Sync + 'static {
    /// Process one entry.
    ///
    /// # Errors
    ///
    /// Any error is logged by the consumer and leaves the entry pending.
    async fn handle(
        &self,
        id: &EntryId,
        record: &Record,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Configuration for an [`AssignmentConsumer`].
pub struct ConsumerOptions {
    /// Log key to drain.
    pub key: StreamKey,
    /// Consumer group name (shared across replicas).
    pub group: GroupName,
    /// This replica's consumer name.
    pub consumer: ConsumerName,
    /// Max entries per poll.
    pub batch_size: usize,
    /// Blocking-read timeout per poll.
    pub block: Duration,
    /// Delay before retrying a failed poll.
    pub retry_delay: Duration,
}

/// The consumer worker. Owns its poll loop; stopped via the watch channel
/// handed to [`spawn`](Self::spawn).
pub struct AssignmentConsumer {
    store: Arc<dyn LogStore>,
    handler: Arc<dyn EntryHandler>,
    options: ConsumerOptions,
    shutdown: watch::Receiver<bool>,
}

impl AssignmentConsumer {
    /// Build a consumer.
    #[must_use]
    pub fn new(
        store: Arc<dyn LogStore>,
        handler: Arc<dyn EntryHandler>,
        options: ConsumerOptions,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            handler,
            options,
            shutdown,
        }
    }

    /// Spawn the worker as a background task.
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run the worker until shutdown.
    ///
    /// Public so tests can drive the loop directly without spawning.
    pub async fn run(mut self) {
        info!(
            key = %self.options.key,
            group = %self.options.group,
            consumer = %self.options.consumer,
            "Assignment consumer starting"
        );

        if let Err(e) = self
            .store
            .create_group(
                self.options.key.clone(),
                self.options.group.clone(),
                GroupStart::Beginning,
            )
            .await
        {
            // The group may exist or the store may be briefly down; the
            // poll loop surfaces persistent failures on its own.
            warn!(error = %e, "Consumer group creation failed, continuing");
        }

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let poll = self.store.read_group(
                self.options.key.clone(),
                self.options.group.clone(),
                self.options.consumer.clone(),
                self.options.batch_size,
                self.options.block,
            );

            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
                batch = poll => {
                    match batch {
                        // Zero entries is the normal, majority case.
                        Ok(entries) => self.process_batch(entries).await,
                        Err(e) => {
                            error!(error = %e, "Poll failed, retrying");
                            tokio::time::sleep(self.options.retry_delay).await;
                        }
                    }
                }
            }
        }

        info!(consumer = %self.options.consumer, "Assignment consumer stopped");
    }

    /// Dispatch a batch entry by entry; acks complete even if shutdown was
    /// requested mid-batch.
    async fn process_batch(&self, entries: Vec<(EntryId, Record)>) {
        for (id, record) in entries {
            match self.handler.handle(&id, &record).await {
                Ok(()) => {
                    if let Err(e) = self
                        .store
                        .ack(
                            self.options.key.clone(),
                            self.options.group.clone(),
                            id.clone(),
                        )
                        .await
                    {
                        warn!(entry = %id, error = %e, "Ack failed, entry will be redelivered");
                    }
                }
                Err(e) => {
                    // Left unacknowledged: pending until a later consumer
                    // claims it.
                    error!(entry = %id, error = %e, "Entry processing failed");
                }
            }
        }
    }
}

// ============================================================================
// Ticket event handler
// ============================================================================

/// Decodes assignment-log entries and fans them out to subscribers.
pub struct TicketEventHandler {
    notifier: Arc<Notifier>,
}

impl TicketEventHandler {
    /// Build a handler over the notifier.
    #[must_use]
    pub const fn new(notifier: Arc<Notifier>) -> Self {
        Self { notifier }
    }

    fn handle_ticket_issued(&self, record: &Record) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let ticket = Ticket::from_record(record)?;
        let scope = Scope::Counter(ticket.counter_id.to_string());
        self.notifier.publish(
            &scope,
            EventKind::TicketProcessed,
            serde_json::json!({
                "ticket_id": ticket.id,
                "queue_number": ticket.queue_number,
                "subject_name": ticket.subject_name,
                "counter_id": ticket.counter_id,
                "counter_code": ticket.counter_code,
                "priority_tier": ticket.priority_tier,
                "sequence": ticket.sequence,
            }),
        );
        Ok(())
    }

    fn handle_ticket_status(&self, record: &Record) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let ticket_id = record.str_field("ticket_id")?;
        let counter_id = record.str_field("counter_id")?;
        let status = record.str_field("status")?;
        let call_count = record.u64_field("call_count").unwrap_or(0);

        let kind = if status == "CALLED" {
            EventKind::TicketCalled
        } else {
            EventKind::TicketStatusChanged
        };
        self.notifier.publish(
            &Scope::Counter(counter_id.to_string()),
            kind,
            serde_json::json!({
                "ticket_id": ticket_id,
                "counter_id": counter_id,
                "status": status,
                "call_count": call_count,
                "queue_number": record.get("queue_number"),
                "subject_name": record.get("subject_name"),
            }),
        );
        Ok(())
    }
}

#[async_trait]
impl EntryHandler for TicketEventHandler {
    async fn handle(
        &self,
        id: &EntryId,
        record: &Record,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let event = record.str_field("event")?;
        match event {
            "TICKET_ISSUED" => self.handle_ticket_issued(record),
            "TICKET_STATUS" => self.handle_ticket_status(record),
            other => {
                // Well-formed but unknown kinds are acknowledged: they
                // would never become processable by redelivery.
                debug!(entry = %id, event = other, "Ignoring unknown event kind");
                Ok(())
            }
        }
    }
}
