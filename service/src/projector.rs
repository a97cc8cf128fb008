//! Queue projection: replay, filter, order, recompute.
//!
//! The heart of the read side. [`project`] is a pure function from a log's
//! entries to the ordered queue — unit-testable without any store — and
//! [`QueueProjector`] wraps it with the replay-and-append cycle that keeps
//! position/wait snapshots in the log fresh.
//!
//! The projector is the *only* writer of `queue_position` and
//! `estimated_wait_minutes`. Nothing else computes them.

use crate::error::Result;
use crate::priority;
use crate::types::{counter_queue_key, CounterId, QueueItem};
use frontdesk_core::clock::Clock;
use frontdesk_core::log_store::{LogStore, LogStoreError};
use frontdesk_core::record::{Record, RecordError};
use frontdesk_core::stream::EntryId;
use std::collections::HashMap;
use std::sync::Arc;

/// Decode one log entry back into a queue item.
///
/// The full item rides in the `data` field as JSON; the flat convenience
/// fields next to it exist for log inspection, not for decoding.
///
/// # Errors
///
/// Returns [`RecordError`] when the `data` field is missing or malformed.
pub fn decode_item(record: &Record) -> std::result::Result<QueueItem, RecordError> {
    record.json_field("data")
}

/// Encode a queue item as a log record: the JSON document plus flat
/// convenience fields for anyone eyeballing the raw stream.
///
/// # Errors
///
/// Returns [`LogStoreError::Encoding`] if the item fails to serialize,
/// which would indicate a bug in the type definitions rather than bad data.
pub fn encode_item(item: &QueueItem) -> std::result::Result<Record, LogStoreError> {
    let data =
        serde_json::to_string(item).map_err(|e| LogStoreError::Encoding(e.to_string()))?;
    Ok(Record::new()
        .with("data", data)
        .with("status", item.priority.queue_status.as_str())
        .with("priority_score", item.priority.priority_score)
        .with("priority_tier", item.priority.priority_tier.as_str())
        .with("subject_name", &item.priority.subject_name)
        .with("queue_position", item.priority.queue_position)
        .with("estimated_wait_minutes", item.priority.estimated_wait_minutes)
        .with("removed", item.removed))
}

/// Replay a counter log into its current ordered queue.
///
/// - The latest entry per composite key wins (mutations are re-appends)
/// - Entries marked removed drop out
/// - Survivors sort by the priority comparator
/// - Positions are assigned 1..M and waits as `position × average`
///
/// Entries that fail to decode are skipped: one corrupt append must not
/// take down every read of the queue.
#[must_use]
pub fn project(entries: &[(EntryId, Record)], average_service_minutes: u32) -> Vec<QueueItem> {
    let mut latest: HashMap<String, QueueItem> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for (entry_id, record) in entries {
        match decode_item(record) {
            Ok(mut item) => {
                item.entry_id = Some(entry_id.clone());
                let key = item.assignment.to_string();
                if !latest.contains_key(&key) {
                    order.push(key.clone());
                }
                latest.insert(key, item);
            }
            Err(e) => {
                tracing::warn!(entry = %entry_id, error = %e, "Skipping undecodable queue entry");
            }
        }
    }

    let mut items: Vec<QueueItem> = order
        .into_iter()
        .filter_map(|key| latest.remove(&key))
        .filter(|item| !item.removed)
        .collect();

    items.sort_by(|a, b| priority::compare(&a.priority, &b.priority));

    for (index, item) in items.iter_mut().enumerate() {
        let position = u32::try_from(index + 1).unwrap_or(u32::MAX);
        item.priority.queue_position = position;
        item.priority.estimated_wait_minutes = position.saturating_mul(average_service_minutes);
    }

    items
}

/// Replays counter logs and appends refreshed position snapshots.
pub struct QueueProjector {
    store: Arc<dyn LogStore>,
    clock: Arc<dyn Clock>,
    average_service_minutes: u32,
}

impl QueueProjector {
    /// Build a projector over a log store.
    #[must_use]
    pub fn new(store: Arc<dyn LogStore>, clock: Arc<dyn Clock>, average_service_minutes: u32) -> Self {
        Self {
            store,
            clock,
            average_service_minutes,
        }
    }

    /// Replay a counter's log into its current ordered queue, without
    /// writing anything.
    ///
    /// # Errors
    ///
    /// Returns a store error if the replay read fails.
    pub async fn load(&self, counter_id: &CounterId) -> Result<Vec<QueueItem>> {
        let entries = self.store.range(counter_queue_key(counter_id)).await?;
        Ok(project(&entries, self.average_service_minutes))
    }

    /// Recompute a counter's queue and append one refreshed entry per item.
    ///
    /// Called after every add/status-change/remove so projections never go
    /// stale for more than one round trip.
    ///
    /// # Errors
    ///
    /// Returns a store error if the replay read or any append fails.
    pub async fn refresh(&self, counter_id: &CounterId) -> Result<Vec<QueueItem>> {
        let mut items = self.load(counter_id).await?;
        let now = self.clock.now();
        let key = counter_queue_key(counter_id);

        for item in &mut items {
            item.priority.last_updated_at = now;
            let entry_id = self.store.append(key.clone(), encode_item(item)?).await?;
            item.entry_id = Some(entry_id);
        }

        tracing::debug!(counter = %counter_id, items = items.len(), "Queue positions refreshed");
        Ok(items)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Panics: tests assert on projection results
mod tests {
    use super::*;
    use crate::priority::PriorityRules;
    use crate::types::{CompositeKey, PriorityInfo, PriorityTier, QueueStatus, Sex};
    use chrono::{DateTime, Duration, Utc};

    fn base_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn item(assignment: &str, age: u32, joined_offset_secs: i64) -> QueueItem {
        let mut priority = PriorityInfo {
            subject_id: None,
            subject_name: format!("Subject {assignment}"),
            age,
            sex: Sex::Unknown,
            is_pregnant: false,
            pregnancy_weeks: None,
            is_disabled: false,
            is_elderly: age >= 65,
            is_child: age < 6,
            priority_score: 0,
            priority_tier: PriorityTier::Low,
            queue_status: QueueStatus::Waiting,
            queue_position: 0,
            estimated_wait_minutes: 0,
            joined_at: base_time() + Duration::seconds(joined_offset_secs),
            last_updated_at: base_time(),
        };
        PriorityRules::default().rescore(&mut priority);
        QueueItem {
            priority,
            assignment: assignment.parse::<CompositeKey>().unwrap(),
            service_name: None,
            counter_id: "c-1".into(),
            work_session_id: None,
            doctor_id: None,
            technician_id: None,
            entry_id: None,
            removed: false,
        }
    }

    fn entries(items: &[QueueItem]) -> Vec<(EntryId, Record)> {
        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                (
                    EntryId::new(format!("{i:04}-0")),
                    encode_item(item).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn equal_priority_keeps_arrival_order() {
        let log = entries(&[item("a-1", 30, 0), item("b-1", 30, 10), item("c-1", 30, 20)]);
        let projected = project(&log, 15);

        let order: Vec<&str> = projected
            .iter()
            .map(|i| i.assignment.assignment_id.as_str())
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        let positions: Vec<u32> = projected.iter().map(|i| i.priority.queue_position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
    }

    #[test]
    fn removal_closes_the_gap() {
        let a = item("a-1", 30, 0);
        let b = item("b-1", 30, 10);
        let c = item("c-1", 30, 20);
        let mut log = entries(&[a, b.clone(), c]);

        let mut removed = b;
        removed.removed = true;
        log.push((EntryId::new("0100-0"), encode_item(&removed).unwrap()));

        let projected = project(&log, 15);
        assert_eq!(projected.len(), 2);
        assert_eq!(projected[0].assignment.assignment_id, "a");
        assert_eq!(projected[0].priority.queue_position, 1);
        assert_eq!(projected[1].assignment.assignment_id, "c");
        assert_eq!(projected[1].priority.queue_position, 2);
    }

    #[test]
    fn wait_is_position_times_average() {
        let log = entries(&[item("a-1", 30, 0), item("b-1", 30, 10)]);
        let projected = project(&log, 12);
        assert_eq!(projected[0].priority.estimated_wait_minutes, 12);
        assert_eq!(projected[1].priority.estimated_wait_minutes, 24);
    }

    #[test]
    fn latest_entry_per_key_wins() {
        let waiting = item("a-1", 30, 0);
        let mut serving = waiting.clone();
        serving.priority.queue_status = QueueStatus::Serving;

        let log = entries(&[waiting, serving]);
        let projected = project(&log, 15);
        assert_eq!(projected.len(), 1);
        assert_eq!(projected[0].priority.queue_status, QueueStatus::Serving);
    }

    #[test]
    fn returned_item_jumps_the_queue() {
        let a = item("a-1", 30, 0);
        let mut b = item("b-1", 30, 10);
        b.priority.queue_status = QueueStatus::ReturnAfterResult;
        PriorityRules::default().rescore(&mut b.priority);

        let projected = project(&entries(&[a, b]), 15);
        assert_eq!(projected[0].assignment.assignment_id, "b");
        assert_eq!(projected[0].priority.queue_position, 1);
    }

    #[test]
    fn undecodable_entries_are_skipped() {
        let mut log = entries(&[item("a-1", 30, 0)]);
        log.push((EntryId::new("9999-0"), Record::new().with("data", "{broken")));

        let projected = project(&log, 15);
        assert_eq!(projected.len(), 1);
    }

    #[test]
    fn positions_are_contiguous_after_arbitrary_mutations() {
        use proptest::prelude::*;

        proptest!(|(script in proptest::collection::vec((0usize..6, 0u8..3), 1..40))| {
            // Replay a random script of add/remove/re-add over six subjects
            // and assert the projected positions are always 1..M.
            let mut log: Vec<(EntryId, Record)> = Vec::new();
            let mut seq = 0u32;
            for (subject, op) in script {
                seq += 1;
                let assignment = format!("s{subject}-svc");
                let mut entry = item(&assignment, 30, i64::from(seq));
                match op {
                    0 | 1 => {}
                    _ => entry.removed = true,
                }
                log.push((EntryId::new(format!("{seq:06}-0")), encode_item(&entry).unwrap()));
            }

            let projected = project(&log, 15);
            let positions: Vec<u32> =
                projected.iter().map(|i| i.priority.queue_position).collect();
            let expected: Vec<u32> = (1..=u32::try_from(projected.len()).unwrap()).collect();
            prop_assert_eq!(positions, expected);
            for item in &projected {
                prop_assert_eq!(
                    item.priority.estimated_wait_minutes,
                    item.priority.queue_position * 15
                );
            }
        });
    }
}
