//! Read-only external lookups.
//!
//! The directory is the boundary to the systems that own patients,
//! appointments, counters and service assignments. The core never writes
//! through it and never trusts its latency: every call on the issuance path
//! goes through [`lookup_with_timeout`], which degrades a slow or failing
//! lookup to "unknown" instead of failing the request.

use crate::types::{CompositeKey, CounterId, Sex};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Errors from the directory backend.
#[derive(Error, Debug)]
#[error("Directory error: {0}")]
pub struct DirectoryError(pub String);

/// A subject profile as the directory records it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubjectRecord {
    /// Profile id.
    pub id: String,
    /// Profile code (the `PP-######` form subjects identify with).
    pub profile_code: String,
    /// Display name.
    pub name: String,
    /// Age in years.
    pub age: u32,
    /// Reported sex.
    pub sex: Sex,
}

/// An appointment as the directory records it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppointmentRecord {
    /// Appointment code (the `AP-######` form).
    pub appointment_code: String,
    /// The booked subject.
    pub subject: SubjectRecord,
    /// Scheduled start.
    pub starts_at: DateTime<Utc>,
    /// Booked service name.
    pub service_name: String,
    /// Assigned doctor id, when any.
    pub doctor_id: Option<String>,
}

/// A counter as the directory records it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CounterRecord {
    /// Counter id.
    pub id: CounterId,
    /// Short code used in queue numbers.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Physical location, when recorded.
    pub location: Option<String>,
    /// Backlog cap; `None` falls back to the configured default.
    pub max_queue_length: Option<usize>,
    /// Average minutes per ticket; `None` falls back to the configured
    /// default.
    pub average_processing_minutes: Option<u32>,
}

/// A service-assignment line item as the directory records it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    /// The composite key addressing this line item.
    pub key: CompositeKey,
    /// The subject the assignment serves.
    pub subject: SubjectRecord,
    /// Service name for display.
    pub service_name: String,
    /// Booth/counter the directory pre-assigned, when any.
    pub counter_id: Option<CounterId>,
    /// Work session the assignment runs under, when scheduled.
    pub work_session_id: Option<String>,
    /// Assigned doctor, when any.
    pub doctor_id: Option<String>,
    /// Assigned technician, when any.
    pub technician_id: Option<String>,
}

/// Read-only lookups against the external systems of record.
///
/// Implementations are black boxes with their own storage; the service
/// only ever reads.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Look up a subject by profile code.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] on backend failure; `Ok(None)` when the
    /// code is unknown.
    async fn subject_by_profile_code(
        &self,
        code: &str,
    ) -> Result<Option<SubjectRecord>, DirectoryError>;

    /// Look up an appointment by code.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] on backend failure; `Ok(None)` when the
    /// code is unknown.
    async fn appointment_by_code(
        &self,
        code: &str,
    ) -> Result<Option<AppointmentRecord>, DirectoryError>;

    /// The full counter directory.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] on backend failure.
    async fn counters(&self) -> Result<Vec<CounterRecord>, DirectoryError>;

    /// Look up one service-assignment line item.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] on backend failure; `Ok(None)` when the
    /// key is unknown.
    async fn assignment(
        &self,
        key: &CompositeKey,
    ) -> Result<Option<AssignmentRecord>, DirectoryError>;
}

/// Seed document for a [`StaticDirectory`], loadable from a JSON file
/// synced out of the upstream systems.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DirectorySeed {
    /// Subject profiles.
    #[serde(default)]
    pub subjects: Vec<SubjectRecord>,
    /// Appointments.
    #[serde(default)]
    pub appointments: Vec<AppointmentRecord>,
    /// Counter directory.
    #[serde(default)]
    pub counters: Vec<CounterRecord>,
    /// Service assignments.
    #[serde(default)]
    pub assignments: Vec<AssignmentRecord>,
}

/// Directory backed by fixed in-memory records.
///
/// Serves two purposes: the test double for every lookup-dependent
/// component, and a file-seeded stand-in deployment mode when the upstream
/// directory is reachable only through batch exports.
#[derive(Default)]
pub struct StaticDirectory {
    subjects: std::collections::HashMap<String, SubjectRecord>,
    appointments: std::collections::HashMap<String, AppointmentRecord>,
    counters: Vec<CounterRecord>,
    assignments: std::collections::HashMap<String, AssignmentRecord>,
}

impl StaticDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a directory from a seed document.
    #[must_use]
    pub fn from_seed(seed: DirectorySeed) -> Self {
        let mut directory = Self::new();
        for subject in seed.subjects {
            directory = directory.with_subject(subject);
        }
        for appointment in seed.appointments {
            directory = directory.with_appointment(appointment);
        }
        for counter in seed.counters {
            directory = directory.with_counter(counter);
        }
        for assignment in seed.assignments {
            directory = directory.with_assignment(assignment);
        }
        directory
    }

    /// Add a subject, keyed by its profile code.
    #[must_use]
    pub fn with_subject(mut self, subject: SubjectRecord) -> Self {
        self.subjects.insert(subject.profile_code.clone(), subject);
        self
    }

    /// Add an appointment, keyed by its code.
    #[must_use]
    pub fn with_appointment(mut self, appointment: AppointmentRecord) -> Self {
        self.appointments
            .insert(appointment.appointment_code.clone(), appointment);
        self
    }

    /// Add a counter.
    #[must_use]
    pub fn with_counter(mut self, counter: CounterRecord) -> Self {
        self.counters.push(counter);
        self
    }

    /// Add a service assignment.
    #[must_use]
    pub fn with_assignment(mut self, assignment: AssignmentRecord) -> Self {
        self.assignments
            .insert(assignment.key.to_string(), assignment);
        self
    }
}

#[async_trait]
impl Directory for StaticDirectory {
    async fn subject_by_profile_code(
        &self,
        code: &str,
    ) -> Result<Option<SubjectRecord>, DirectoryError> {
        Ok(self.subjects.get(code).cloned())
    }

    async fn appointment_by_code(
        &self,
        code: &str,
    ) -> Result<Option<AppointmentRecord>, DirectoryError> {
        Ok(self.appointments.get(code).cloned())
    }

    async fn counters(&self) -> Result<Vec<CounterRecord>, DirectoryError> {
        Ok(self.counters.clone())
    }

    async fn assignment(
        &self,
        key: &CompositeKey,
    ) -> Result<Option<AssignmentRecord>, DirectoryError> {
        Ok(self.assignments.get(&key.to_string()).cloned())
    }
}

/// Race a directory lookup against a timeout, flattening both the timeout
/// and backend errors to `None`.
///
/// The issuance path must have a bounded worst-case latency; a lookup that
/// can't answer in time degrades to "unknown identity" rather than blocking
/// or failing the whole request.
pub async fn lookup_with_timeout<T, F>(label: &str, timeout: Duration, lookup: F) -> Option<T>
where
    F: Future<Output = Result<Option<T>, DirectoryError>>,
{
    match tokio::time::timeout(timeout, lookup).await {
        Ok(Ok(found)) => found,
        Ok(Err(e)) => {
            tracing::warn!(lookup = label, error = %e, "Directory lookup failed, continuing without it");
            None
        }
        Err(_) => {
            tracing::warn!(lookup = label, timeout = ?timeout, "Directory lookup timed out, continuing without it");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn timeout_flattens_to_none() {
        let result: Option<u32> = lookup_with_timeout(
            "hanging",
            Duration::from_millis(10),
            std::future::pending(),
        )
        .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn backend_error_flattens_to_none() {
        let result: Option<u32> = lookup_with_timeout("failing", Duration::from_millis(50), async {
            Err(DirectoryError("down".into()))
        })
        .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn fast_hit_passes_through() {
        let result = lookup_with_timeout("fast", Duration::from_millis(50), async {
            Ok(Some(7_u32))
        })
        .await;
        assert_eq!(result, Some(7));
    }
}
