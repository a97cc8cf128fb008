//! Counter administration: presence, queue clearing, calling tickets.
//!
//! These are the operations a counter frontend drives: going online and
//! offline, clearing its runtime queue (which also resets the sequence so
//! the next ticket starts at 1), and calling the next ticket up. Ticket
//! status transitions are appends to the assignment log; the consumer
//! fans the resulting events out.

use crate::error::{Error, Result};
use crate::notifier::{EventKind, Notifier, Scope};
use crate::types::{assignment_log_key, CounterId, Ticket, TicketId, TicketStatus};
use frontdesk_core::clock::Clock;
use frontdesk_core::log_store::LogStore;
use frontdesk_core::presence::Presence;
use frontdesk_core::record::Record;
use frontdesk_core::runtime_queue::RuntimeQueue;
use std::sync::Arc;
use std::time::Duration;

/// Counter-facing admin operations.
pub struct CounterAdmin {
    store: Arc<dyn LogStore>,
    runtime_queue: Arc<dyn RuntimeQueue>,
    presence: Arc<dyn Presence>,
    notifier: Arc<Notifier>,
    clock: Arc<dyn Clock>,
    presence_ttl: Duration,
}

impl CounterAdmin {
    /// Build the admin service.
    #[must_use]
    pub fn new(
        store: Arc<dyn LogStore>,
        runtime_queue: Arc<dyn RuntimeQueue>,
        presence: Arc<dyn Presence>,
        notifier: Arc<Notifier>,
        clock: Arc<dyn Clock>,
        presence_ttl: Duration,
    ) -> Self {
        Self {
            store,
            runtime_queue,
            presence,
            notifier,
            clock,
            presence_ttl,
        }
    }

    /// Mark a counter online. The marker expires after the configured TTL,
    /// so frontends re-mark on a heartbeat.
    ///
    /// # Errors
    ///
    /// Returns a presence backend error.
    pub async fn set_online(&self, counter_id: &CounterId) -> Result<()> {
        self.presence
            .mark_online(counter_id.to_string(), self.presence_ttl)
            .await?;
        self.publish_counter_status(counter_id, "ONLINE");
        Ok(())
    }

    /// Mark a counter offline immediately.
    ///
    /// # Errors
    ///
    /// Returns a presence backend error.
    pub async fn set_offline(&self, counter_id: &CounterId) -> Result<()> {
        self.presence.mark_offline(counter_id.to_string()).await?;
        self.publish_counter_status(counter_id, "OFFLINE");
        Ok(())
    }

    /// Clear a counter's runtime queue and reset its ticket sequence.
    ///
    /// # Errors
    ///
    /// Returns runtime-queue or store errors.
    pub async fn clear_queue(&self, counter_id: &CounterId) -> Result<()> {
        self.runtime_queue.clear(counter_id.to_string()).await?;
        self.store.reset_sequence(counter_id.to_string()).await?;
        self.publish_counter_status(counter_id, "CLEARED");
        Ok(())
    }

    /// Pop the next ticket off a counter's runtime queue and call it.
    ///
    /// Returns `None` when the queue is empty. The status transition is
    /// appended to the assignment log; the consumer group turns it into
    /// the `TICKET_CALLED` push.
    ///
    /// # Errors
    ///
    /// Returns runtime-queue or store errors.
    pub async fn call_next(&self, counter_id: &CounterId) -> Result<Option<Ticket>> {
        let Some(item) = self.runtime_queue.pop(counter_id.to_string()).await? else {
            return Ok(None);
        };

        let mut ticket: Ticket = serde_json::from_value(item).map_err(|e| {
            Error::InvalidInput(format!("corrupt runtime queue item on {counter_id}: {e}"))
        })?;
        ticket.status = TicketStatus::Called;
        ticket.call_count += 1;

        self.append_status(&ticket).await?;
        tracing::info!(
            ticket = %ticket.id,
            queue_number = %ticket.queue_number,
            counter = %counter_id,
            call_count = ticket.call_count,
            "Ticket called"
        );
        Ok(Some(ticket))
    }

    /// Append a status transition for a ticket.
    ///
    /// # Errors
    ///
    /// Returns a store error from the append.
    pub async fn update_ticket_status(
        &self,
        counter_id: &CounterId,
        ticket_id: TicketId,
        status: TicketStatus,
    ) -> Result<()> {
        let record = Record::new()
            .with("event", "TICKET_STATUS")
            .with("ticket_id", ticket_id.to_string())
            .with("counter_id", counter_id.as_str())
            .with("status", status.as_str())
            .with("call_count", 0_u32)
            .with("updated_at", self.clock.now().to_rfc3339());
        self.store.append(assignment_log_key(), record).await?;
        Ok(())
    }

    async fn append_status(&self, ticket: &Ticket) -> Result<()> {
        let record = Record::new()
            .with("event", "TICKET_STATUS")
            .with("ticket_id", ticket.id.to_string())
            .with("counter_id", ticket.counter_id.as_str())
            .with("status", ticket.status.as_str())
            .with("call_count", ticket.call_count)
            .with("queue_number", &ticket.queue_number)
            .with("subject_name", &ticket.subject_name)
            .with("updated_at", self.clock.now().to_rfc3339());
        self.store.append(assignment_log_key(), record).await?;
        Ok(())
    }

    fn publish_counter_status(&self, counter_id: &CounterId, state: &str) {
        self.notifier.publish(
            &Scope::Counter(counter_id.to_string()),
            EventKind::CounterStatusChanged,
            serde_json::json!({
                "counter_id": counter_id,
                "state": state,
            }),
        );
    }
}
