//! Priority scoring and queue ordering.
//!
//! A pure module: attributes in, score and tier out. Every consumer that
//! orders a queue uses [`compare`] — there is exactly one comparator in the
//! system, because two subtly different orderings would silently break the
//! position invariants downstream.

use crate::types::{PriorityInfo, PriorityTier, QueueStatus};
use std::cmp::Ordering;

/// Scoring rule constants.
///
/// The return-after-result bonus is deliberately far above every achievable
/// combination of the other bonuses, so that status alone guarantees the
/// front of the queue.
#[derive(Clone, Debug)]
pub struct PriorityRules {
    /// Score every subject starts with.
    pub base: i64,
    /// Flat bonus for age ≥ 65.
    pub elderly_bonus: i64,
    /// Added per year of age for elderly subjects.
    pub elderly_age_multiplier: i64,
    /// Flat bonus for age < 6.
    pub child_bonus: i64,
    /// Added per year under 6 for child subjects.
    pub child_age_multiplier: i64,
    /// Flat bonus for pregnancy with known weeks.
    pub pregnancy_bonus: i64,
    /// Added per week of pregnancy.
    pub pregnancy_week_multiplier: i64,
    /// Flat bonus for disability.
    pub disabled_bonus: i64,
    /// Bonus for `ReturnAfterResult` status.
    pub return_after_result_bonus: i64,
}

impl Default for PriorityRules {
    fn default() -> Self {
        Self {
            base: 100,
            elderly_bonus: 200,
            elderly_age_multiplier: 2,
            child_bonus: 300,
            child_age_multiplier: 10,
            pregnancy_bonus: 400,
            pregnancy_week_multiplier: 5,
            disabled_bonus: 500,
            return_after_result_bonus: 10_000,
        }
    }
}

impl PriorityRules {
    /// Compute the priority score for a subject's attributes and current
    /// queue status.
    #[must_use]
    pub fn score(&self, info: &PriorityInfo) -> i64 {
        let mut score = self.base;

        if info.is_elderly && info.age >= 65 {
            score += self.elderly_bonus + i64::from(info.age) * self.elderly_age_multiplier;
        }

        if info.is_child && info.age < 6 {
            score += self.child_bonus
                + i64::from(6 - info.age) * self.child_age_multiplier;
        }

        if info.is_pregnant {
            if let Some(weeks) = info.pregnancy_weeks {
                score += self.pregnancy_bonus + i64::from(weeks) * self.pregnancy_week_multiplier;
            }
        }

        if info.is_disabled {
            score += self.disabled_bonus;
        }

        if info.queue_status == QueueStatus::ReturnAfterResult {
            score += self.return_after_result_bonus;
        }

        score
    }

    /// Recompute `priority_score` and `priority_tier` on an info whose
    /// attributes or status changed. The score is always rederived from
    /// scratch, never adjusted incrementally.
    pub fn rescore(&self, info: &mut PriorityInfo) {
        info.priority_score = self.score(info);
        info.priority_tier = tier(info.priority_score);
    }
}

/// Map a score to its display tier.
#[must_use]
pub const fn tier(score: i64) -> PriorityTier {
    if score >= 10_000 {
        PriorityTier::VeryHigh
    } else if score >= 1_000 {
        PriorityTier::High
    } else if score >= 500 {
        PriorityTier::Normal
    } else {
        PriorityTier::Low
    }
}

/// The queue ordering: `Less` means `a` is served before `b`.
///
/// `ReturnAfterResult` always sorts first; otherwise higher score first;
/// equal scores fall back to arrival order (earlier `joined_at` first).
#[must_use]
pub fn compare(a: &PriorityInfo, b: &PriorityInfo) -> Ordering {
    let a_returned = a.queue_status == QueueStatus::ReturnAfterResult;
    let b_returned = b.queue_status == QueueStatus::ReturnAfterResult;
    match (a_returned, b_returned) {
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        _ => {}
    }

    b.priority_score
        .cmp(&a.priority_score)
        .then_with(|| a.joined_at.cmp(&b.joined_at))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Panics: tests assert on fixed inputs
mod tests {
    use super::*;
    use crate::types::Sex;
    use chrono::{DateTime, Duration, Utc};
    use proptest::prelude::*;

    fn base_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn subject(age: u32) -> PriorityInfo {
        let mut info = PriorityInfo {
            subject_id: None,
            subject_name: "Test Subject".to_string(),
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
            joined_at: base_time(),
            last_updated_at: base_time(),
        };
        PriorityRules::default().rescore(&mut info);
        info
    }

    #[test]
    fn plain_adult_scores_base_only() {
        let info = subject(35);
        assert_eq!(info.priority_score, 100);
        assert_eq!(info.priority_tier, PriorityTier::Low);
    }

    #[test]
    fn elderly_bonus_grows_with_age() {
        // 100 base + 200 elderly + 70×2
        assert_eq!(subject(70).priority_score, 440);
        assert!(subject(80).priority_score > subject(70).priority_score);
    }

    #[test]
    fn child_bonus_grows_as_age_shrinks() {
        // 100 base + 300 child + (6−2)×10
        assert_eq!(subject(2).priority_score, 440);
        assert!(subject(1).priority_score > subject(5).priority_score);
    }

    #[test]
    fn pregnancy_needs_known_weeks() {
        let mut info = subject(30);
        info.is_pregnant = true;
        PriorityRules::default().rescore(&mut info);
        assert_eq!(info.priority_score, 100);

        info.pregnancy_weeks = Some(28);
        PriorityRules::default().rescore(&mut info);
        // 100 base + 400 + 28×5
        assert_eq!(info.priority_score, 640);
        assert_eq!(info.priority_tier, PriorityTier::Normal);
    }

    #[test]
    fn disabled_outranks_elderly_seventy() {
        // Elderly 70: +200 + 140 = 440. Disabled: +500 = 600.
        let elderly = subject(70);
        let mut disabled = subject(40);
        disabled.is_disabled = true;
        PriorityRules::default().rescore(&mut disabled);

        assert!(disabled.priority_score > elderly.priority_score);
        assert_eq!(compare(&disabled, &elderly), Ordering::Less);
    }

    #[test]
    fn return_after_result_hits_very_high_tier() {
        let mut info = subject(35);
        info.queue_status = QueueStatus::ReturnAfterResult;
        PriorityRules::default().rescore(&mut info);
        assert!(info.priority_score >= 10_000);
        assert_eq!(info.priority_tier, PriorityTier::VeryHigh);
    }

    #[test]
    fn equal_scores_fall_back_to_arrival_order() {
        let first = subject(35);
        let mut second = subject(35);
        second.joined_at = base_time() + Duration::minutes(5);

        assert_eq!(first.priority_score, second.priority_score);
        assert_eq!(compare(&first, &second), Ordering::Less);
        assert_eq!(compare(&second, &first), Ordering::Greater);
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(tier(10_000), PriorityTier::VeryHigh);
        assert_eq!(tier(9_999), PriorityTier::High);
        assert_eq!(tier(1_000), PriorityTier::High);
        assert_eq!(tier(999), PriorityTier::Normal);
        assert_eq!(tier(500), PriorityTier::Normal);
        assert_eq!(tier(499), PriorityTier::Low);
    }

    proptest! {
        /// ReturnAfterResult outranks every other status regardless of the
        /// opponent's attributes.
        #[test]
        fn returned_subject_always_sorts_first(
            age in 0u32..110,
            disabled in any::<bool>(),
            weeks in proptest::option::of(1u32..42),
        ) {
            let mut returned = subject(30);
            returned.queue_status = QueueStatus::ReturnAfterResult;
            PriorityRules::default().rescore(&mut returned);

            let mut other = subject(age);
            other.is_disabled = disabled;
            other.is_pregnant = weeks.is_some();
            other.pregnancy_weeks = weeks;
            PriorityRules::default().rescore(&mut other);

            prop_assert_eq!(compare(&returned, &other), Ordering::Less);
        }

        /// The comparator is antisymmetric on distinct inputs.
        #[test]
        fn comparator_is_antisymmetric(age_a in 0u32..110, age_b in 0u32..110, offset in 1i64..600) {
            let a = subject(age_a);
            let mut b = subject(age_b);
            b.joined_at = base_time() + Duration::seconds(offset);

            let forward = compare(&a, &b);
            let backward = compare(&b, &a);
            prop_assert_eq!(forward, backward.reverse());
        }
    }
}
