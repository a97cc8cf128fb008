//! Queue lifecycle operations over the per-counter logs.
//!
//! Every mutation is an append: adding a subject appends the initial item,
//! status changes and removals append superseding entries, and the
//! projector then appends refreshed position snapshots. Retried client
//! calls therefore cannot corrupt state — they only add redundant history
//! that projection naturally supersedes.

use crate::directory::{lookup_with_timeout, Directory};
use crate::error::{Error, Result};
use crate::notifier::{EventKind, Notifier, Scope};
use crate::priority::PriorityRules;
use crate::projector::{encode_item, QueueProjector};
use crate::types::{
    counter_queue_key, CompositeKey, CounterId, PriorityInfo, PriorityTier, QueueItem, QueueStats,
    QueueStatus,
};
use frontdesk_core::clock::Clock;
use frontdesk_core::log_store::LogStore;
use std::sync::Arc;
use std::time::Duration;

/// Caller-supplied intake attributes the directory does not own.
///
/// Pregnancy and disability are real input data reported at intake, never
/// derived from other records.
#[derive(Clone, Debug, Default)]
pub struct IntakeFlags {
    /// Subject reports being pregnant.
    pub is_pregnant: bool,
    /// Weeks of pregnancy, when reported.
    pub pregnancy_weeks: Option<u32>,
    /// Subject reports a disability.
    pub is_disabled: bool,
}

/// Queue add/update/remove/list/stats over one log store.
pub struct QueueService {
    store: Arc<dyn LogStore>,
    projector: Arc<QueueProjector>,
    notifier: Arc<Notifier>,
    directory: Arc<dyn Directory>,
    clock: Arc<dyn Clock>,
    rules: PriorityRules,
    lookup_timeout: Duration,
}

impl QueueService {
    /// Build the queue service.
    #[must_use]
    pub fn new(
        store: Arc<dyn LogStore>,
        projector: Arc<QueueProjector>,
        notifier: Arc<Notifier>,
        directory: Arc<dyn Directory>,
        clock: Arc<dyn Clock>,
        rules: PriorityRules,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            store,
            projector,
            notifier,
            directory,
            clock,
            rules,
            lookup_timeout,
        }
    }

    /// Add a service-assignment line item to a counter's queue.
    ///
    /// Resolves the item's subject through the directory, scores it,
    /// appends the initial entry, and re-projects the queue.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`]: the composite key resolves to nothing
    /// - Store errors from the append or re-projection
    pub async fn add_to_queue(
        &self,
        key: &CompositeKey,
        counter_id: &CounterId,
        status: QueueStatus,
        flags: IntakeFlags,
    ) -> Result<QueueItem> {
        let assignment = lookup_with_timeout(
            "assignment",
            self.lookup_timeout,
            self.directory.assignment(key),
        )
        .await
        .ok_or_else(|| Error::NotFound(format!("service assignment {key}")))?;

        let now = self.clock.now();
        let mut priority = PriorityInfo {
            subject_id: Some(assignment.subject.id.clone()),
            subject_name: assignment.subject.name.clone(),
            age: assignment.subject.age,
            sex: assignment.subject.sex,
            is_pregnant: flags.is_pregnant,
            pregnancy_weeks: flags.pregnancy_weeks,
            is_disabled: flags.is_disabled,
            is_elderly: assignment.subject.age >= 65,
            is_child: assignment.subject.age < 6,
            priority_score: 0,
            priority_tier: PriorityTier::Low,
            queue_status: status,
            queue_position: 0,
            estimated_wait_minutes: 0,
            joined_at: now,
            last_updated_at: now,
        };
        self.rules.rescore(&mut priority);

        let mut item = QueueItem {
            priority,
            assignment: key.clone(),
            service_name: Some(assignment.service_name),
            counter_id: counter_id.clone(),
            work_session_id: assignment.work_session_id,
            doctor_id: assignment.doctor_id,
            technician_id: assignment.technician_id,
            entry_id: None,
            removed: false,
        };

        let entry_id = self
            .store
            .append(counter_queue_key(counter_id), encode_item(&item)?)
            .await?;
        item.entry_id = Some(entry_id);

        self.republish(counter_id, EventKind::QueueItemAdded, &item)
            .await?;
        Ok(item)
    }

    /// Change a queue item's status, re-scoring and re-projecting.
    ///
    /// The score is always recomputed from scratch — a status change (most
    /// importantly to `ReturnAfterResult`) can move the item across the
    /// whole ordering.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`]: no live item for the key on this counter
    /// - Store errors from the append or re-projection
    pub async fn update_status(
        &self,
        counter_id: &CounterId,
        key: &CompositeKey,
        new_status: QueueStatus,
    ) -> Result<QueueItem> {
        let mut item = self.find_item(counter_id, key).await?;

        item.priority.queue_status = new_status;
        item.priority.last_updated_at = self.clock.now();
        self.rules.rescore(&mut item.priority);

        let entry_id = self
            .store
            .append(counter_queue_key(counter_id), encode_item(&item)?)
            .await?;
        item.entry_id = Some(entry_id);

        self.republish(counter_id, EventKind::QueueItemStatusChanged, &item)
            .await?;
        Ok(item)
    }

    /// Remove a queue item by appending its tombstone.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`]: no live item for the key on this counter
    /// - Store errors from the append or re-projection
    pub async fn remove_from_queue(
        &self,
        counter_id: &CounterId,
        key: &CompositeKey,
    ) -> Result<()> {
        let mut item = self.find_item(counter_id, key).await?;
        item.removed = true;
        item.priority.last_updated_at = self.clock.now();

        self.store
            .append(counter_queue_key(counter_id), encode_item(&item)?)
            .await?;

        self.republish(counter_id, EventKind::QueueItemRemoved, &item)
            .await?;
        Ok(())
    }

    /// The counter's current ordered queue.
    ///
    /// # Errors
    ///
    /// Returns store errors from the replay read.
    pub async fn list_queue(&self, counter_id: &CounterId) -> Result<Vec<QueueItem>> {
        self.projector.load(counter_id).await
    }

    /// Per-counter statistics from one projection pass.
    ///
    /// # Errors
    ///
    /// Returns store errors from the replay read.
    pub async fn queue_stats(&self, counter_id: &CounterId) -> Result<QueueStats> {
        let items = self.projector.load(counter_id).await?;
        let mut stats = QueueStats {
            total: items.len(),
            ..QueueStats::default()
        };

        let mut wait_sum: u64 = 0;
        for item in &items {
            match item.priority.queue_status {
                QueueStatus::Waiting => stats.waiting += 1,
                QueueStatus::Preparing => stats.preparing += 1,
                QueueStatus::Serving => stats.serving += 1,
                QueueStatus::ReturnAfterResult => stats.return_after_result += 1,
                QueueStatus::Missing => {}
            }
            let tier_index = match item.priority.priority_tier {
                PriorityTier::VeryHigh => 0,
                PriorityTier::High => 1,
                PriorityTier::Normal => 2,
                PriorityTier::Low => 3,
            };
            stats.tier_counts[tier_index] += 1;
            wait_sum += u64::from(item.priority.estimated_wait_minutes);
        }

        if let Ok(count) = u64::try_from(items.len()) {
            if count > 0 {
                stats.average_wait_minutes = u32::try_from(wait_sum / count).unwrap_or(u32::MAX);
            }
        }
        Ok(stats)
    }

    async fn find_item(&self, counter_id: &CounterId, key: &CompositeKey) -> Result<QueueItem> {
        self.projector
            .load(counter_id)
            .await?
            .into_iter()
            .find(|item| &item.assignment == key)
            .ok_or_else(|| {
                Error::NotFound(format!("queue item {key} on counter {counter_id}"))
            })
    }

    /// Re-project the queue and push the mutation event plus the refreshed
    /// positions to the counter's scope.
    async fn republish(
        &self,
        counter_id: &CounterId,
        kind: EventKind,
        item: &QueueItem,
    ) -> Result<()> {
        let refreshed = self.projector.refresh(counter_id).await?;

        let scope = Scope::Counter(counter_id.to_string());
        self.notifier.publish(
            &scope,
            kind,
            serde_json::to_value(item).unwrap_or_default(),
        );

        let positions: Vec<serde_json::Value> = refreshed
            .iter()
            .map(|i| {
                serde_json::json!({
                    "assignment": i.assignment.to_string(),
                    "subject_name": i.priority.subject_name,
                    "queue_position": i.priority.queue_position,
                    "estimated_wait_minutes": i.priority.estimated_wait_minutes,
                })
            })
            .collect();
        self.notifier.publish(
            &scope,
            EventKind::QueuePositionsRefreshed,
            serde_json::Value::Array(positions),
        );

        // Doctor/technician screens follow their own scopes.
        if let Some(doctor_id) = &item.doctor_id {
            self.notifier.publish(
                &Scope::Doctor(doctor_id.clone()),
                kind,
                serde_json::to_value(item).unwrap_or_default(),
            );
        }
        if let Some(technician_id) = &item.technician_id {
            self.notifier.publish(
                &Scope::Technician(technician_id.clone()),
                kind,
                serde_json::to_value(item).unwrap_or_default(),
            );
        }
        Ok(())
    }
}
