//! Queue lifecycle integration tests over the in-memory log store.

#![allow(clippy::unwrap_used)] // Panics: tests assert on service results

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use frontdesk::directory::{AssignmentRecord, StaticDirectory, SubjectRecord};
use frontdesk::notifier::Notifier;
use frontdesk::priority::PriorityRules;
use frontdesk::projector::QueueProjector;
use frontdesk::queue::{IntakeFlags, QueueService};
use frontdesk::types::{CompositeKey, CounterId, QueueStatus, Sex};
use frontdesk::Error;
use frontdesk_core::clock::Clock;
use frontdesk_testing::InMemoryLogStore;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Clock that advances one second per reading, so arrival order is
/// reflected in `joined_at` without real sleeps.
struct SteppingClock {
    base: DateTime<Utc>,
    ticks: AtomicI64,
}

impl SteppingClock {
    fn new() -> Self {
        Self {
            base: DateTime::parse_from_rfc3339("2025-01-01T08:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            ticks: AtomicI64::new(0),
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
        self.base + ChronoDuration::seconds(tick)
    }
}

fn subject(code: &str, name: &str, age: u32) -> SubjectRecord {
    SubjectRecord {
        id: format!("subj-{code}"),
        profile_code: code.to_string(),
        name: name.to_string(),
        age,
        sex: Sex::Unknown,
    }
}

fn assignment(key: &str, code: &str, name: &str, age: u32) -> AssignmentRecord {
    AssignmentRecord {
        key: key.parse().unwrap(),
        subject: subject(code, name, age),
        service_name: "Blood Test".to_string(),
        counter_id: None,
        work_session_id: None,
        doctor_id: None,
        technician_id: None,
    }
}

struct Fixture {
    service: QueueService,
    counter: CounterId,
}

fn fixture() -> Fixture {
    let store = Arc::new(InMemoryLogStore::new());
    let clock = Arc::new(SteppingClock::new());
    let directory = Arc::new(
        StaticDirectory::new()
            .with_assignment(assignment("a-svc", "PP-000001", "Subject A", 30))
            .with_assignment(assignment("b-svc", "PP-000002", "Subject B", 30))
            .with_assignment(assignment("c-svc", "PP-000003", "Subject C", 30))
            .with_assignment(assignment("d-svc", "PP-000004", "Subject D", 72)),
    );
    let projector = Arc::new(QueueProjector::new(store.clone(), clock.clone(), 15));
    let notifier = Arc::new(Notifier::new(clock.clone(), 64));
    let service = QueueService::new(
        store,
        projector,
        notifier,
        directory,
        clock,
        PriorityRules::default(),
        Duration::from_millis(200),
    );

    Fixture {
        service,
        counter: CounterId::from("c-1"),
    }
}

fn key(raw: &str) -> CompositeKey {
    raw.parse().unwrap()
}

#[tokio::test]
async fn equal_priority_items_queue_in_arrival_order() {
    let f = fixture();
    for k in ["a-svc", "b-svc", "c-svc"] {
        f.service
            .add_to_queue(&key(k), &f.counter, QueueStatus::Waiting, IntakeFlags::default())
            .await
            .unwrap();
    }

    let items = f.service.list_queue(&f.counter).await.unwrap();
    let order: Vec<&str> = items
        .iter()
        .map(|i| i.assignment.assignment_id.as_str())
        .collect();
    assert_eq!(order, vec!["a", "b", "c"]);
    let positions: Vec<u32> = items.iter().map(|i| i.priority.queue_position).collect();
    assert_eq!(positions, vec![1, 2, 3]);
}

#[tokio::test]
async fn removing_the_middle_item_closes_the_gap() {
    let f = fixture();
    for k in ["a-svc", "b-svc", "c-svc"] {
        f.service
            .add_to_queue(&key(k), &f.counter, QueueStatus::Waiting, IntakeFlags::default())
            .await
            .unwrap();
    }

    f.service
        .remove_from_queue(&f.counter, &key("b-svc"))
        .await
        .unwrap();

    let items = f.service.list_queue(&f.counter).await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].assignment.assignment_id, "a");
    assert_eq!(items[0].priority.queue_position, 1);
    assert_eq!(items[1].assignment.assignment_id, "c");
    assert_eq!(items[1].priority.queue_position, 2);
}

#[tokio::test]
async fn estimated_wait_tracks_position() {
    let f = fixture();
    for k in ["a-svc", "b-svc"] {
        f.service
            .add_to_queue(&key(k), &f.counter, QueueStatus::Waiting, IntakeFlags::default())
            .await
            .unwrap();
    }

    let items = f.service.list_queue(&f.counter).await.unwrap();
    for item in &items {
        assert_eq!(
            item.priority.estimated_wait_minutes,
            item.priority.queue_position * 15
        );
    }
}

#[tokio::test]
async fn return_after_result_jumps_to_the_front() {
    let f = fixture();
    for k in ["a-svc", "b-svc", "c-svc"] {
        f.service
            .add_to_queue(&key(k), &f.counter, QueueStatus::Waiting, IntakeFlags::default())
            .await
            .unwrap();
    }

    let updated = f
        .service
        .update_status(&f.counter, &key("c-svc"), QueueStatus::ReturnAfterResult)
        .await
        .unwrap();
    assert!(updated.priority.priority_score >= 10_000);

    let items = f.service.list_queue(&f.counter).await.unwrap();
    assert_eq!(items[0].assignment.assignment_id, "c");
    assert_eq!(items[0].priority.queue_position, 1);
    assert_eq!(items[1].assignment.assignment_id, "a");
}

#[tokio::test]
async fn status_change_rescores_rather_than_patching() {
    let f = fixture();
    let added = f
        .service
        .add_to_queue(&key("d-svc"), &f.counter, QueueStatus::Waiting, IntakeFlags::default())
        .await
        .unwrap();
    // Elderly 72: 100 + 200 + 72×2.
    assert_eq!(added.priority.priority_score, 444);

    let returned = f
        .service
        .update_status(&f.counter, &key("d-svc"), QueueStatus::ReturnAfterResult)
        .await
        .unwrap();
    assert_eq!(returned.priority.priority_score, 10_444);

    let back = f
        .service
        .update_status(&f.counter, &key("d-svc"), QueueStatus::Waiting)
        .await
        .unwrap();
    assert_eq!(back.priority.priority_score, 444);
}

#[tokio::test]
async fn unknown_assignment_is_not_found() {
    let f = fixture();
    let err = f
        .service
        .add_to_queue(
            &key("nope-svc"),
            &f.counter,
            QueueStatus::Waiting,
            IntakeFlags::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    let err = f
        .service
        .update_status(&f.counter, &key("nope-svc"), QueueStatus::Serving)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn intake_flags_shape_the_score() {
    let f = fixture();
    let item = f
        .service
        .add_to_queue(
            &key("a-svc"),
            &f.counter,
            QueueStatus::Waiting,
            IntakeFlags {
                is_pregnant: true,
                pregnancy_weeks: Some(30),
                is_disabled: false,
            },
        )
        .await
        .unwrap();
    // 100 base + 400 pregnancy + 30×5.
    assert_eq!(item.priority.priority_score, 650);
}

#[tokio::test]
async fn stats_reflect_statuses_and_tiers() {
    let f = fixture();
    for k in ["a-svc", "b-svc", "c-svc"] {
        f.service
            .add_to_queue(&key(k), &f.counter, QueueStatus::Waiting, IntakeFlags::default())
            .await
            .unwrap();
    }
    f.service
        .update_status(&f.counter, &key("a-svc"), QueueStatus::Serving)
        .await
        .unwrap();
    f.service
        .update_status(&f.counter, &key("b-svc"), QueueStatus::ReturnAfterResult)
        .await
        .unwrap();

    let stats = f.service.queue_stats(&f.counter).await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.waiting, 1);
    assert_eq!(stats.serving, 1);
    assert_eq!(stats.return_after_result, 1);
    // One VeryHigh (returned), two Low.
    assert_eq!(stats.tier_counts, [1, 0, 0, 2]);
}

#[tokio::test]
async fn retried_removal_is_idempotent() {
    let f = fixture();
    f.service
        .add_to_queue(&key("a-svc"), &f.counter, QueueStatus::Waiting, IntakeFlags::default())
        .await
        .unwrap();

    f.service
        .remove_from_queue(&f.counter, &key("a-svc"))
        .await
        .unwrap();
    // The retry finds nothing live — surfaced, not corrupting.
    let err = f
        .service
        .remove_from_queue(&f.counter, &key("a-svc"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    assert!(f.service.list_queue(&f.counter).await.unwrap().is_empty());
}
