//! Consumer-group worker tests: acknowledgment discipline and fan-out.

#![allow(clippy::unwrap_used)] // Panics: tests assert on consumer results

use async_trait::async_trait;
use frontdesk::consumer::{
    AssignmentConsumer, ConsumerOptions, EntryHandler, TicketEventHandler,
};
use frontdesk::notifier::{EventKind, Notifier, Scope};
use frontdesk::types::{
    assignment_log_key, CounterId, PriorityTier, Sex, Ticket, TicketId, TicketStatus,
};
use frontdesk_core::log_store::LogStore;
use frontdesk_core::record::Record;
use frontdesk_core::stream::{ConsumerName, EntryId, GroupName};
use frontdesk_testing::{test_clock, InMemoryLogStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

fn options() -> ConsumerOptions {
    ConsumerOptions {
        key: assignment_log_key(),
        group: GroupName::new("ticket-processors"),
        consumer: ConsumerName::new("consumer-test"),
        batch_size: 10,
        block: Duration::from_millis(20),
        retry_delay: Duration::from_millis(20),
    }
}

fn sample_ticket() -> Ticket {
    use frontdesk_core::clock::Clock;

    Ticket {
        id: TicketId::new(),
        profile_code: None,
        appointment_code: None,
        subject_name: "An Tran".to_string(),
        subject_age: 68,
        subject_sex: Sex::Female,
        counter_id: CounterId::from("c-1"),
        counter_code: "A".to_string(),
        counter_name: "Counter A".to_string(),
        queue_number: "A-001".to_string(),
        sequence: 1,
        assigned_at: test_clock().now(),
        is_on_time: None,
        status: TicketStatus::Waiting,
        call_count: 0,
        priority_score: 436,
        priority_tier: PriorityTier::Low,
    }
}

/// Handler that rejects every entry.
struct FailingHandler;

#[async_trait]
impl EntryHandler for FailingHandler {
    async fn handle(
        &self,
        _id: &EntryId,
        _record: &Record,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Err("handler rejected entry".into())
    }
}

async fn run_consumer_briefly(consumer: AssignmentConsumer, shutdown: watch::Sender<bool>) {
    let handle = consumer.spawn();
    tokio::time::sleep(Duration::from_millis(150)).await;
    shutdown.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn successful_dispatch_is_acknowledged() {
    let store = Arc::new(InMemoryLogStore::new());
    let clock = Arc::new(test_clock());
    let notifier = Arc::new(Notifier::new(clock, 64));
    let mut counter_rx = notifier.subscribe(&Scope::Counter("c-1".to_string()));
    let mut broadcast_rx = notifier.subscribe(&Scope::Broadcast);

    store
        .append(assignment_log_key(), sample_ticket().to_record())
        .await
        .unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer = AssignmentConsumer::new(
        store.clone(),
        Arc::new(TicketEventHandler::new(notifier.clone())),
        options(),
        shutdown_rx,
    );
    run_consumer_briefly(consumer, shutdown_tx).await;

    // Dispatch succeeded, so the entry left the pending set.
    let pending = store
        .pending(&assignment_log_key(), &GroupName::new("ticket-processors"))
        .unwrap();
    assert!(pending.is_empty(), "acked entry must not stay pending");

    // The counter scope got the processed event, and it mirrored to the
    // aggregate broadcast channel.
    let envelope = counter_rx.recv().await.unwrap();
    assert_eq!(envelope.kind, EventKind::TicketProcessed);
    assert_eq!(envelope.data["queue_number"], "A-001");
    let mirrored = broadcast_rx.recv().await.unwrap();
    assert_eq!(mirrored.kind, EventKind::TicketProcessed);
}

#[tokio::test]
async fn failed_dispatch_stays_pending_for_redelivery() {
    let store = Arc::new(InMemoryLogStore::new());

    store
        .append(assignment_log_key(), sample_ticket().to_record())
        .await
        .unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer = AssignmentConsumer::new(
        store.clone(),
        Arc::new(FailingHandler),
        options(),
        shutdown_rx,
    );
    run_consumer_briefly(consumer, shutdown_tx).await;

    let pending = store
        .pending(&assignment_log_key(), &GroupName::new("ticket-processors"))
        .unwrap();
    assert_eq!(pending.len(), 1, "failed entry must remain redeliverable");
}

#[tokio::test]
async fn one_bad_entry_does_not_block_the_rest() {
    let store = Arc::new(InMemoryLogStore::new());
    let clock = Arc::new(test_clock());
    let notifier = Arc::new(Notifier::new(clock, 64));
    let mut counter_rx = notifier.subscribe(&Scope::Counter("c-1".to_string()));

    // A record with an event kind but no decodable payload, then a good one.
    store
        .append(
            assignment_log_key(),
            Record::new().with("event", "TICKET_ISSUED"),
        )
        .await
        .unwrap();
    store
        .append(assignment_log_key(), sample_ticket().to_record())
        .await
        .unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer = AssignmentConsumer::new(
        store.clone(),
        Arc::new(TicketEventHandler::new(notifier.clone())),
        options(),
        shutdown_rx,
    );
    run_consumer_briefly(consumer, shutdown_tx).await;

    // The good entry was processed and acked; the bad one stays pending.
    let envelope = counter_rx.recv().await.unwrap();
    assert_eq!(envelope.kind, EventKind::TicketProcessed);
    let pending = store
        .pending(&assignment_log_key(), &GroupName::new("ticket-processors"))
        .unwrap();
    assert_eq!(pending.len(), 1);
}

#[tokio::test]
async fn unknown_event_kinds_are_acknowledged() {
    let store = Arc::new(InMemoryLogStore::new());
    let clock = Arc::new(test_clock());
    let notifier = Arc::new(Notifier::new(clock, 64));

    store
        .append(
            assignment_log_key(),
            Record::new().with("event", "SOMETHING_ELSE").with("x", "1"),
        )
        .await
        .unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer = AssignmentConsumer::new(
        store.clone(),
        Arc::new(TicketEventHandler::new(notifier)),
        options(),
        shutdown_rx,
    );
    run_consumer_briefly(consumer, shutdown_tx).await;

    let pending = store
        .pending(&assignment_log_key(), &GroupName::new("ticket-processors"))
        .unwrap();
    assert!(pending.is_empty());
}

#[tokio::test]
async fn status_entries_become_called_events() {
    let store = Arc::new(InMemoryLogStore::new());
    let clock = Arc::new(test_clock());
    let notifier = Arc::new(Notifier::new(clock, 64));
    let mut counter_rx = notifier.subscribe(&Scope::Counter("c-1".to_string()));

    let record = Record::new()
        .with("event", "TICKET_STATUS")
        .with("ticket_id", TicketId::new().to_string())
        .with("counter_id", "c-1")
        .with("status", "CALLED")
        .with("call_count", 1_u32)
        .with("queue_number", "A-001");
    store.append(assignment_log_key(), record).await.unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer = AssignmentConsumer::new(
        store.clone(),
        Arc::new(TicketEventHandler::new(notifier.clone())),
        options(),
        shutdown_rx,
    );
    run_consumer_briefly(consumer, shutdown_tx).await;

    let envelope = counter_rx.recv().await.unwrap();
    assert_eq!(envelope.kind, EventKind::TicketCalled);
    assert_eq!(envelope.data["status"], "CALLED");
}
