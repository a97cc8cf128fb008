//! Mock directory implementations for tests.

use crate::directory::{
    AppointmentRecord, AssignmentRecord, CounterRecord, Directory, DirectoryError, SubjectRecord,
};
use crate::types::CompositeKey;
use async_trait::async_trait;

/// Directory whose lookups never resolve. Exercises the timeout path.
#[derive(Default)]
pub struct HangingDirectory;

#[async_trait]
impl Directory for HangingDirectory {
    async fn subject_by_profile_code(
        &self,
        _code: &str,
    ) -> Result<Option<SubjectRecord>, DirectoryError> {
        std::future::pending().await
    }

    async fn appointment_by_code(
        &self,
        _code: &str,
    ) -> Result<Option<AppointmentRecord>, DirectoryError> {
        std::future::pending().await
    }

    async fn counters(&self) -> Result<Vec<CounterRecord>, DirectoryError> {
        std::future::pending().await
    }

    async fn assignment(
        &self,
        _key: &CompositeKey,
    ) -> Result<Option<AssignmentRecord>, DirectoryError> {
        std::future::pending().await
    }
}
