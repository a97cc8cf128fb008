//! Ticket issuance at the front door.
//!
//! Resolves who is standing at the kiosk (profile code, appointment code,
//! or a scanned code), scores them, picks a counter, pulls an atomic
//! per-counter sequence number, and hands back a ticket. Everything that
//! is not needed for the response — the assignment-log append, the runtime
//! enqueue, the live notification — runs as a background effect, so a slow
//! Redis or an offline dashboard never delays the requester.

use crate::directory::{lookup_with_timeout, AppointmentRecord, Directory};
use crate::effects::EffectQueue;
use crate::error::{Error, Result};
use crate::notifier::{EventKind, Notifier, Scope};
use crate::priority::PriorityRules;
use crate::queue::IntakeFlags;
use crate::selector::CounterSelector;
use crate::types::{
    assignment_log_key, PriorityInfo, PriorityTier, QueueStatus, Sex, Ticket, TicketId,
    TicketStatus,
};
use chrono::{DateTime, Utc};
use frontdesk_core::clock::Clock;
use frontdesk_core::log_store::LogStore;
use frontdesk_core::runtime_queue::RuntimeQueue;
use std::sync::Arc;
use std::time::Duration;

/// A take-a-number request from a reception kiosk.
#[derive(Clone, Debug, Default)]
pub struct IssueRequest {
    /// Explicit profile code.
    pub profile_code: Option<String>,
    /// Explicit appointment code.
    pub appointment_code: Option<String>,
    /// Raw scanned code (QR or barcode payload).
    pub scanned_code: Option<String>,
    /// Caller-supplied name, used when no identity resolves.
    pub subject_name: Option<String>,
    /// Caller-supplied age, used when no identity resolves.
    pub subject_age: Option<u32>,
    /// Caller-supplied sex.
    pub subject_sex: Option<Sex>,
    /// Intake flags (pregnancy, disability) reported at the kiosk.
    pub flags: IntakeFlags,
}

/// Identity parsed out of a scanned code.
#[derive(Clone, Debug, PartialEq, Eq)]
enum ScannedIdentity {
    Profile(String),
    Appointment(String),
}

/// Parse a scanned code: structured JSON payload first, then the fixed
/// `PP-######` / `AP-######` shapes.
fn parse_scanned_code(raw: &str) -> Option<ScannedIdentity> {
    if let Ok(payload) = serde_json::from_str::<serde_json::Value>(raw) {
        for key in ["profile_code", "profileCode"] {
            if let Some(code) = payload.get(key).and_then(|v| v.as_str()) {
                return Some(ScannedIdentity::Profile(code.to_string()));
            }
        }
        for key in ["appointment_code", "appointmentCode"] {
            if let Some(code) = payload.get(key).and_then(|v| v.as_str()) {
                return Some(ScannedIdentity::Appointment(code.to_string()));
            }
        }
        return None;
    }

    let fixed_format = |prefix: &str| {
        raw.strip_prefix(prefix)
            .filter(|digits| digits.len() == 6 && digits.bytes().all(|b| b.is_ascii_digit()))
            .map(|_| raw.to_string())
    };
    if let Some(code) = fixed_format("PP-") {
        return Some(ScannedIdentity::Profile(code));
    }
    if let Some(code) = fixed_format("AP-") {
        return Some(ScannedIdentity::Appointment(code));
    }
    None
}

/// Resolved identity: either a directory hit or the caller's fallback data.
struct ResolvedSubject {
    name: String,
    age: u32,
    sex: Sex,
    profile_code: Option<String>,
}

/// Issues tickets and dispatches their side effects.
pub struct TicketIssuer {
    directory: Arc<dyn Directory>,
    selector: Arc<CounterSelector>,
    store: Arc<dyn LogStore>,
    runtime_queue: Arc<dyn RuntimeQueue>,
    notifier: Arc<Notifier>,
    effects: EffectQueue,
    clock: Arc<dyn Clock>,
    rules: PriorityRules,
    lookup_timeout: Duration,
    on_time_tolerance_minutes: i64,
}

impl TicketIssuer {
    /// Build an issuer.
    #[must_use]
    #[allow(clippy::too_many_arguments)] // Wiring point for the whole issuance path
    pub fn new(
        directory: Arc<dyn Directory>,
        selector: Arc<CounterSelector>,
        store: Arc<dyn LogStore>,
        runtime_queue: Arc<dyn RuntimeQueue>,
        notifier: Arc<Notifier>,
        effects: EffectQueue,
        clock: Arc<dyn Clock>,
        rules: PriorityRules,
        lookup_timeout: Duration,
        on_time_tolerance_minutes: i64,
    ) -> Self {
        Self {
            directory,
            selector,
            store,
            runtime_queue,
            notifier,
            effects,
            clock,
            rules,
            lookup_timeout,
            on_time_tolerance_minutes,
        }
    }

    /// Issue a ticket.
    ///
    /// Identity resolution order: profile code, appointment code, scanned
    /// code, caller-supplied fallback. Each external lookup is raced
    /// against the configured timeout and degrades to "unknown" — a slow
    /// directory can never hang issuance.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`]: a scanned code that parses to nothing
    ///   and no usable fallback identity
    /// - [`Error::Unavailable`]: no counter online and under capacity
    /// - Store errors from the sequence allocation
    pub async fn issue(&self, mut request: IssueRequest) -> Result<Ticket> {
        // A scanned code fills whichever explicit slot is still empty.
        if request.profile_code.is_none() && request.appointment_code.is_none() {
            if let Some(raw) = request.scanned_code.as_deref() {
                match parse_scanned_code(raw) {
                    Some(ScannedIdentity::Profile(code)) => request.profile_code = Some(code),
                    Some(ScannedIdentity::Appointment(code)) => {
                        request.appointment_code = Some(code);
                    }
                    None => {
                        return Err(Error::InvalidInput(format!(
                            "unrecognized scanned code: {raw}"
                        )))
                    }
                }
            }
        }

        // Profile code wins when both are present, matching the lookup
        // order at the kiosk; the appointment path also drives the
        // on-time computation.
        let appointment = if request.profile_code.is_some() {
            None
        } else {
            self.resolve_appointment(&request).await
        };
        let subject = self.resolve_subject(&request, appointment.as_ref()).await?;

        let now = self.clock.now();
        let is_on_time = appointment
            .as_ref()
            .map(|a| self.check_in_on_time(now, a.starts_at));

        let mut priority = PriorityInfo {
            subject_id: None,
            subject_name: subject.name.clone(),
            age: subject.age,
            sex: subject.sex,
            is_pregnant: request.flags.is_pregnant,
            pregnancy_weeks: request.flags.pregnancy_weeks,
            is_disabled: request.flags.is_disabled,
            is_elderly: subject.age >= 65,
            is_child: subject.age < 6,
            priority_score: 0,
            priority_tier: PriorityTier::Low,
            queue_status: QueueStatus::Waiting,
            queue_position: 0,
            estimated_wait_minutes: 0,
            joined_at: now,
            last_updated_at: now,
        };
        self.rules.rescore(&mut priority);

        let counter = self.selector.select().await?;

        // The one await on the log store in the critical path: sequence
        // numbers must come from the store's atomic counter, or two front
        // doors issuing at once would collide.
        let sequence = self
            .store
            .next_sequence(counter.counter_id.to_string())
            .await?;

        let ticket = Ticket {
            id: TicketId::new(),
            profile_code: subject.profile_code.clone(),
            appointment_code: appointment
                .as_ref()
                .map(|a| a.appointment_code.clone())
                .or_else(|| request.appointment_code.clone()),
            subject_name: subject.name,
            subject_age: subject.age,
            subject_sex: subject.sex,
            counter_id: counter.counter_id.clone(),
            counter_code: counter.counter_code.clone(),
            counter_name: counter.counter_name.clone(),
            queue_number: Ticket::queue_number_for(&counter.counter_code, sequence),
            sequence,
            assigned_at: now,
            is_on_time,
            status: TicketStatus::Waiting,
            call_count: 0,
            priority_score: priority.priority_score,
            priority_tier: priority.priority_tier,
        };

        self.dispatch_side_effects(&ticket);

        tracing::info!(
            ticket = %ticket.id,
            queue_number = %ticket.queue_number,
            counter = %ticket.counter_id,
            score = ticket.priority_score,
            "Ticket issued"
        );
        Ok(ticket)
    }

    async fn resolve_appointment(&self, request: &IssueRequest) -> Option<AppointmentRecord> {
        let code = request.appointment_code.as_deref()?;
        lookup_with_timeout(
            "appointment",
            self.lookup_timeout,
            self.directory.appointment_by_code(code),
        )
        .await
    }

    async fn resolve_subject(
        &self,
        request: &IssueRequest,
        appointment: Option<&AppointmentRecord>,
    ) -> Result<ResolvedSubject> {
        if let Some(code) = request.profile_code.as_deref() {
            if let Some(subject) = lookup_with_timeout(
                "subject",
                self.lookup_timeout,
                self.directory.subject_by_profile_code(code),
            )
            .await
            {
                return Ok(ResolvedSubject {
                    name: subject.name,
                    age: subject.age,
                    sex: subject.sex,
                    profile_code: Some(subject.profile_code),
                });
            }
        }

        if let Some(appointment) = appointment {
            let subject = &appointment.subject;
            return Ok(ResolvedSubject {
                name: subject.name.clone(),
                age: subject.age,
                sex: subject.sex,
                profile_code: Some(subject.profile_code.clone()),
            });
        }

        // Nothing resolved: fall back to what the requester told the kiosk.
        let name = request
            .subject_name
            .clone()
            .ok_or_else(|| Error::InvalidInput("subject name required".to_string()))?;
        let age = request
            .subject_age
            .ok_or_else(|| Error::InvalidInput("subject age required".to_string()))?;
        Ok(ResolvedSubject {
            name,
            age,
            sex: request.subject_sex.unwrap_or_default(),
            profile_code: request.profile_code.clone(),
        })
    }

    fn check_in_on_time(&self, check_in: DateTime<Utc>, starts_at: DateTime<Utc>) -> bool {
        let delta = (check_in - starts_at).num_minutes().abs();
        delta <= self.on_time_tolerance_minutes
    }

    /// Log append, runtime enqueue and notification are independent
    /// best-effort operations: issuance success never waits on them.
    fn dispatch_side_effects(&self, ticket: &Ticket) {
        let store = self.store.clone();
        let record = ticket.to_record();
        self.effects.dispatch("assignment-log-append", async move {
            store.append(assignment_log_key(), record).await.map(|_| ())
        });

        let runtime_queue = self.runtime_queue.clone();
        let counter_id = ticket.counter_id.to_string();
        let item = serde_json::to_value(ticket).unwrap_or_default();
        self.effects.dispatch("runtime-enqueue", async move {
            runtime_queue.push(counter_id, item).await
        });

        let notifier = self.notifier.clone();
        let scope = Scope::Counter(ticket.counter_id.to_string());
        let data = serde_json::to_value(ticket).unwrap_or_default();
        self.effects.dispatch("issue-notification", async move {
            notifier.publish(&scope, EventKind::TicketIssued, data);
            Ok::<(), std::convert::Infallible>(())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scanned_profile_pattern_parses() {
        assert_eq!(
            parse_scanned_code("PP-123456"),
            Some(ScannedIdentity::Profile("PP-123456".to_string()))
        );
    }

    #[test]
    fn scanned_appointment_pattern_parses() {
        assert_eq!(
            parse_scanned_code("AP-000042"),
            Some(ScannedIdentity::Appointment("AP-000042".to_string()))
        );
    }

    #[test]
    fn malformed_patterns_are_rejected() {
        assert_eq!(parse_scanned_code("PP-12345"), None);
        assert_eq!(parse_scanned_code("PP-12345X"), None);
        assert_eq!(parse_scanned_code("XX-123456"), None);
        assert_eq!(parse_scanned_code("garbage"), None);
    }

    #[test]
    fn structured_payload_takes_precedence() {
        assert_eq!(
            parse_scanned_code(r#"{"profileCode":"PP-999999"}"#),
            Some(ScannedIdentity::Profile("PP-999999".to_string()))
        );
        assert_eq!(
            parse_scanned_code(r#"{"appointment_code":"AP-111111"}"#),
            Some(ScannedIdentity::Appointment("AP-111111".to_string()))
        );
    }

    #[test]
    fn structured_payload_without_codes_is_rejected() {
        assert_eq!(parse_scanned_code(r#"{"invoice":"abc"}"#), None);
    }
}
