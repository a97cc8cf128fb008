//! Domain types for the queue-routing service.
//!
//! This module contains the value objects and entities shared by every
//! component: subjects waiting in a queue, the tickets handed to them, and
//! the transient view of a counter's load.

use chrono::{DateTime, Utc};
use frontdesk_core::stream::{EntryId, StreamKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a ticket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketId(Uuid);

impl TicketId {
    /// Creates a new random `TicketId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TicketId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TicketId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Identifier of a service counter (assigned by the counter directory).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CounterId(String);

impl CounterId {
    /// Create a `CounterId` from a directory-issued identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CounterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CounterId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CounterId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Composite key addressing one service-assignment line item:
/// `<assignment id>-<service id>`.
///
/// The two ids must not themselves contain `-`; the directory issues both
/// as alphanumeric identifiers.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompositeKey {
    /// Service-assignment record id.
    pub assignment_id: String,
    /// Service id within the assignment.
    pub service_id: String,
}

/// Error type for composite-key parsing.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid composite key: {0}")]
pub struct ParseCompositeKeyError(String);

impl CompositeKey {
    /// Build a key from its two halves.
    #[must_use]
    pub fn new(assignment_id: impl Into<String>, service_id: impl Into<String>) -> Self {
        Self {
            assignment_id: assignment_id.into(),
            service_id: service_id.into(),
        }
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.assignment_id, self.service_id)
    }
}

impl FromStr for CompositeKey {
    type Err = ParseCompositeKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('-') {
            Some((assignment, service)) if !assignment.is_empty() && !service.is_empty() => {
                Ok(Self::new(assignment, service))
            }
            _ => Err(ParseCompositeKeyError(s.to_string())),
        }
    }
}

// ============================================================================
// Enumerations
// ============================================================================

/// Where a queue item is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueStatus {
    /// Waiting to be served.
    Waiting,
    /// Being prepared (pre-service steps).
    Preparing,
    /// Currently at the counter/booth.
    Serving,
    /// Called but did not show up.
    Missing,
    /// Came back after an intermediate result; outranks everything.
    ReturnAfterResult,
}

impl QueueStatus {
    /// Protocol string for the flat record encoding.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::Preparing => "PREPARING",
            Self::Serving => "SERVING",
            Self::Missing => "MISSING",
            Self::ReturnAfterResult => "RETURN_AFTER_RESULT",
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WAITING" => Ok(Self::Waiting),
            "PREPARING" => Ok(Self::Preparing),
            "SERVING" => Ok(Self::Serving),
            "MISSING" => Ok(Self::Missing),
            "RETURN_AFTER_RESULT" => Ok(Self::ReturnAfterResult),
            other => Err(format!("unknown queue status: {other}")),
        }
    }
}

/// Lifecycle of an issued ticket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TicketStatus {
    /// In the counter's queue.
    Waiting,
    /// Called to the counter.
    Called,
    /// At the counter.
    Serving,
    /// Done.
    Completed,
    /// Skipped after repeated calls.
    Skipped,
}

impl TicketStatus {
    /// Protocol string for the flat record encoding.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::Called => "CALLED",
            Self::Serving => "SERVING",
            Self::Completed => "COMPLETED",
            Self::Skipped => "SKIPPED",
        }
    }

    /// Whether the ticket has reached a terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WAITING" => Ok(Self::Waiting),
            "CALLED" => Ok(Self::Called),
            "SERVING" => Ok(Self::Serving),
            "COMPLETED" => Ok(Self::Completed),
            "SKIPPED" => Ok(Self::Skipped),
            other => Err(format!("unknown ticket status: {other}")),
        }
    }
}

/// Coarse display bucket derived from the priority score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriorityTier {
    /// Score ≥ 10000 (return-after-result).
    VeryHigh,
    /// Score ≥ 1000.
    High,
    /// Score ≥ 500.
    Normal,
    /// Everything else.
    Low,
}

impl PriorityTier {
    /// Protocol string for the flat record encoding.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::VeryHigh => "VERY_HIGH",
            Self::High => "HIGH",
            Self::Normal => "NORMAL",
            Self::Low => "LOW",
        }
    }
}

impl fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subject sex as reported at intake.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Sex {
    /// Male.
    Male,
    /// Female.
    Female,
    /// Not reported.
    #[default]
    Unknown,
}

impl Sex {
    /// Protocol string for the flat record encoding.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Male => "MALE",
            Self::Female => "FEMALE",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sex {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MALE" => Ok(Self::Male),
            "FEMALE" => Ok(Self::Female),
            "UNKNOWN" => Ok(Self::Unknown),
            other => Err(format!("unknown sex: {other}")),
        }
    }
}

// ============================================================================
// Queue entities
// ============================================================================

/// Priority-relevant attributes of one waiting subject, plus the computed
/// score and the fields the projector recomputes.
///
/// `priority_score` is derived from the immutable subject attributes plus
/// `queue_status`; it is recomputed (never patched in place) whenever the
/// status changes. `queue_position` and `estimated_wait_minutes` are owned
/// by the projector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriorityInfo {
    /// Subject profile id, when known.
    pub subject_id: Option<String>,
    /// Subject display name.
    pub subject_name: String,
    /// Age in years.
    pub age: u32,
    /// Reported sex.
    pub sex: Sex,
    /// Caller-supplied pregnancy flag.
    pub is_pregnant: bool,
    /// Weeks of pregnancy, when known.
    pub pregnancy_weeks: Option<u32>,
    /// Caller-supplied disability flag.
    pub is_disabled: bool,
    /// Derived: age ≥ 65.
    pub is_elderly: bool,
    /// Derived: age < 6.
    pub is_child: bool,
    /// Computed priority score.
    pub priority_score: i64,
    /// Computed display tier.
    pub priority_tier: PriorityTier,
    /// Lifecycle status.
    pub queue_status: QueueStatus,
    /// 1-based position, recomputed by the projector.
    pub queue_position: u32,
    /// Estimated wait, recomputed by the projector.
    pub estimated_wait_minutes: u32,
    /// When the subject joined the queue.
    pub joined_at: DateTime<Utc>,
    /// Last mutation time.
    pub last_updated_at: DateTime<Utc>,
}

/// One item in a counter's queue: priority info plus linkage to the
/// service assignment it belongs to.
///
/// Items are never deleted from the log; removal appends a new entry with
/// `removed: true` for the same composite key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Priority attributes and computed ordering fields.
    pub priority: PriorityInfo,
    /// The service-assignment line item this queue entry serves.
    pub assignment: CompositeKey,
    /// Service name for display.
    pub service_name: Option<String>,
    /// Counter/booth the item is queued at.
    pub counter_id: CounterId,
    /// Work session the assignment runs under, when scheduled.
    pub work_session_id: Option<String>,
    /// Assigned doctor, when any.
    pub doctor_id: Option<String>,
    /// Assigned technician, when any.
    pub technician_id: Option<String>,
    /// Log entry id of the append that produced this state.
    pub entry_id: Option<EntryId>,
    /// Tombstone flag: the item left the queue.
    pub removed: bool,
}

/// Per-counter queue statistics derived from one projection pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Items currently in the queue.
    pub total: usize,
    /// Items in `Waiting`.
    pub waiting: usize,
    /// Items in `Preparing`.
    pub preparing: usize,
    /// Items in `Serving`.
    pub serving: usize,
    /// Items in `ReturnAfterResult`.
    pub return_after_result: usize,
    /// Mean estimated wait across items, in minutes.
    pub average_wait_minutes: u32,
    /// Items per display tier: `[very_high, high, normal, low]`.
    pub tier_counts: [usize; 4],
}

// ============================================================================
// Tickets
// ============================================================================

/// A ticket issued to a requester at the front door.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    /// Ticket id.
    pub id: TicketId,
    /// Profile code the requester identified with, if any.
    pub profile_code: Option<String>,
    /// Appointment code the requester identified with, if any.
    pub appointment_code: Option<String>,
    /// Subject display name.
    pub subject_name: String,
    /// Subject age in years.
    pub subject_age: u32,
    /// Subject sex.
    pub subject_sex: Sex,
    /// Assigned counter.
    pub counter_id: CounterId,
    /// Assigned counter's short code.
    pub counter_code: String,
    /// Assigned counter's display name.
    pub counter_name: String,
    /// Human-readable queue number, `<counterCode>-<seq>`.
    pub queue_number: String,
    /// Store-issued per-counter sequence.
    pub sequence: u64,
    /// Issuance time.
    pub assigned_at: DateTime<Utc>,
    /// Whether check-in fell inside the appointment tolerance window.
    /// Only computed when an appointment exists.
    pub is_on_time: Option<bool>,
    /// Lifecycle status.
    pub status: TicketStatus,
    /// How many times the ticket has been called.
    pub call_count: u32,
    /// Priority score at issuance.
    pub priority_score: i64,
    /// Priority tier at issuance.
    pub priority_tier: PriorityTier,
}

impl Ticket {
    /// Build the display queue number from a counter code and sequence.
    #[must_use]
    pub fn queue_number_for(counter_code: &str, sequence: u64) -> String {
        format!("{counter_code}-{sequence:03}")
    }

    /// Flatten the ticket into an assignment-log record.
    ///
    /// Absent codes are written as empty strings; `is_on_time` is written
    /// only when it was computed (an appointment existed).
    #[must_use]
    pub fn to_record(&self) -> frontdesk_core::record::Record {
        use frontdesk_core::record::Record;

        let mut record = Record::new()
            .with("event", "TICKET_ISSUED")
            .with("ticket_id", self.id.to_string())
            .with("profile_code", self.profile_code.as_deref().unwrap_or(""))
            .with(
                "appointment_code",
                self.appointment_code.as_deref().unwrap_or(""),
            )
            .with("subject_name", &self.subject_name)
            .with("subject_age", self.subject_age)
            .with("subject_sex", self.subject_sex.as_str())
            .with("counter_id", self.counter_id.as_str())
            .with("counter_code", &self.counter_code)
            .with("counter_name", &self.counter_name)
            .with("queue_number", &self.queue_number)
            .with("sequence", self.sequence)
            .with("assigned_at", self.assigned_at.to_rfc3339())
            .with("status", self.status.as_str())
            .with("call_count", self.call_count)
            .with("priority_score", self.priority_score)
            .with("priority_tier", self.priority_tier.as_str());
        if let Some(on_time) = self.is_on_time {
            record.set("is_on_time", on_time);
        }
        record
    }

    /// Decode a ticket from an assignment-log record.
    ///
    /// # Errors
    ///
    /// Returns [`frontdesk_core::record::RecordError`] when a required
    /// field is missing or fails to parse.
    pub fn from_record(
        record: &frontdesk_core::record::Record,
    ) -> Result<Self, frontdesk_core::record::RecordError> {
        use frontdesk_core::record::RecordError;

        let invalid = |field: &str, value: &str| RecordError::InvalidField {
            field: field.to_string(),
            value: value.to_string(),
        };

        let id_raw = record.str_field("ticket_id")?;
        let id = id_raw
            .parse::<TicketId>()
            .map_err(|_| invalid("ticket_id", id_raw))?;

        let sex_raw = record.str_field("subject_sex")?;
        let subject_sex = sex_raw
            .parse::<Sex>()
            .map_err(|_| invalid("subject_sex", sex_raw))?;

        let assigned_raw = record.str_field("assigned_at")?;
        let assigned_at = DateTime::parse_from_rfc3339(assigned_raw)
            .map_err(|_| invalid("assigned_at", assigned_raw))?
            .with_timezone(&Utc);

        let status_raw = record.str_field("status")?;
        let status = status_raw
            .parse::<TicketStatus>()
            .map_err(|_| invalid("status", status_raw))?;

        let tier_raw = record.str_field("priority_tier")?;
        let priority_tier = match tier_raw {
            "VERY_HIGH" => PriorityTier::VeryHigh,
            "HIGH" => PriorityTier::High,
            "NORMAL" => PriorityTier::Normal,
            "LOW" => PriorityTier::Low,
            other => return Err(invalid("priority_tier", other)),
        };

        let non_empty =
            |value: Option<&str>| value.filter(|s| !s.is_empty()).map(ToString::to_string);

        let subject_age_u64 = record.u64_field("subject_age")?;
        let call_count_u64 = record.u64_field("call_count")?;

        Ok(Self {
            id,
            profile_code: non_empty(record.get("profile_code")),
            appointment_code: non_empty(record.get("appointment_code")),
            subject_name: record.str_field("subject_name")?.to_string(),
            subject_age: u32::try_from(subject_age_u64)
                .map_err(|_| invalid("subject_age", &subject_age_u64.to_string()))?,
            subject_sex,
            counter_id: CounterId::from(record.str_field("counter_id")?),
            counter_code: record.str_field("counter_code")?.to_string(),
            counter_name: record.str_field("counter_name")?.to_string(),
            queue_number: record.str_field("queue_number")?.to_string(),
            sequence: record.u64_field("sequence")?,
            assigned_at,
            is_on_time: match record.get("is_on_time") {
                Some(_) => Some(record.bool_field("is_on_time")?),
                None => None,
            },
            status,
            call_count: u32::try_from(call_count_u64)
                .map_err(|_| invalid("call_count", &call_count_u64.to_string()))?,
            priority_score: record.i64_field("priority_score")?,
            priority_tier,
        })
    }
}

// ============================================================================
// Counters
// ============================================================================

/// Transient view of one counter's load, recomputed per selection request
/// from presence and backlog signals. Never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CounterStatus {
    /// Counter id.
    pub counter_id: CounterId,
    /// Short code used in queue numbers.
    pub counter_code: String,
    /// Display name.
    pub counter_name: String,
    /// Physical location, when the directory records one.
    pub location: Option<String>,
    /// Online (presence marker alive) AND backlog below the max.
    pub is_available: bool,
    /// Whether the presence marker is alive.
    pub is_online: bool,
    /// Current runtime-queue backlog.
    pub current_queue_length: usize,
    /// Average minutes to process one ticket at this counter.
    pub average_processing_minutes: u32,
    /// Last time this counter was handed a ticket.
    pub last_assigned_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Stream keys
// ============================================================================

/// Log key for one counter's queue.
#[must_use]
pub fn counter_queue_key(counter_id: &CounterId) -> StreamKey {
    StreamKey::new(format!("counter:{counter_id}:queue"))
}

/// The global ticket-assignment log drained by the consumer group.
#[must_use]
pub fn assignment_log_key() -> StreamKey {
    StreamKey::new("queue:tickets")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Panics: tests assert on parse results
mod tests {
    use super::*;

    #[test]
    fn composite_key_roundtrip() {
        let key: CompositeKey = "rx42-svc7".parse().unwrap();
        assert_eq!(key.assignment_id, "rx42");
        assert_eq!(key.service_id, "svc7");
        assert_eq!(key.to_string(), "rx42-svc7");
    }

    #[test]
    fn composite_key_rejects_missing_half() {
        assert!("rx42".parse::<CompositeKey>().is_err());
        assert!("-svc7".parse::<CompositeKey>().is_err());
        assert!("rx42-".parse::<CompositeKey>().is_err());
    }

    #[test]
    fn statuses_roundtrip_through_protocol_strings() {
        for status in [
            QueueStatus::Waiting,
            QueueStatus::Preparing,
            QueueStatus::Serving,
            QueueStatus::Missing,
            QueueStatus::ReturnAfterResult,
        ] {
            assert_eq!(status.as_str().parse::<QueueStatus>().unwrap(), status);
        }
        for status in [
            TicketStatus::Waiting,
            TicketStatus::Called,
            TicketStatus::Serving,
            TicketStatus::Completed,
            TicketStatus::Skipped,
        ] {
            assert_eq!(status.as_str().parse::<TicketStatus>().unwrap(), status);
        }
    }

    #[test]
    fn queue_number_is_zero_padded() {
        assert_eq!(Ticket::queue_number_for("A", 7), "A-007");
        assert_eq!(Ticket::queue_number_for("B", 1042), "B-1042");
    }

    #[test]
    fn terminal_ticket_statuses() {
        assert!(TicketStatus::Completed.is_terminal());
        assert!(TicketStatus::Skipped.is_terminal());
        assert!(!TicketStatus::Called.is_terminal());
    }

    #[test]
    fn stream_keys() {
        let key = counter_queue_key(&CounterId::from("c-17"));
        assert_eq!(key.as_str(), "counter:c-17:queue");
        assert_eq!(assignment_log_key().as_str(), "queue:tickets");
    }

    #[test]
    fn ticket_record_roundtrip() {
        let ticket = Ticket {
            id: TicketId::new(),
            profile_code: Some("PP-123456".to_string()),
            appointment_code: None,
            subject_name: "An Tran".to_string(),
            subject_age: 68,
            subject_sex: Sex::Female,
            counter_id: CounterId::from("c-1"),
            counter_code: "A".to_string(),
            counter_name: "Counter A".to_string(),
            queue_number: "A-007".to_string(),
            sequence: 7,
            assigned_at: DateTime::parse_from_rfc3339("2025-01-01T08:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            is_on_time: Some(true),
            status: TicketStatus::Waiting,
            call_count: 0,
            priority_score: 436,
            priority_tier: PriorityTier::Low,
        };

        let record = ticket.to_record();
        assert_eq!(record.get("event"), Some("TICKET_ISSUED"));
        // Numbers and booleans ride as strings on the wire.
        assert_eq!(record.get("sequence"), Some("7"));
        assert_eq!(record.get("is_on_time"), Some("true"));
        assert_eq!(record.get("appointment_code"), Some(""));

        let decoded = Ticket::from_record(&record).unwrap();
        assert_eq!(decoded, ticket);
    }

    #[test]
    fn ticket_from_record_rejects_missing_fields() {
        use frontdesk_core::record::Record;
        let record = Record::new().with("event", "TICKET_ISSUED");
        assert!(Ticket::from_record(&record).is_err());
    }
}
