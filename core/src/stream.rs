//! Log stream identification types.
//!
//! This module defines strong types for naming append-only logs
//! (`StreamKey`), addressing individual entries (`EntryId`), and naming
//! consumer groups and their member consumers (`GroupName`, `ConsumerName`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for `StreamKey` parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid stream key: {0}")]
pub struct ParseStreamKeyError(String);

/// The name of one append-only log in the log store.
///
/// Each queue owns exactly one log. For example:
/// - `"counter:c-17:queue"` — the per-counter queue log
/// - `"queue:tickets"` — the global ticket-assignment log
///
/// # Design
///
/// `StreamKey` is a newtype wrapper around `String` that provides:
/// - Type safety (can't accidentally use a regular string)
/// - Clear intent in function signatures
/// - Serialization support for storage
///
/// # Validation
///
/// - `FromStr::from_str()`: Validates input (rejects empty strings)
/// - `From::from()` and `new()`: No validation (for internal use with
///   trusted input)
///
/// # Examples
///
/// ```
/// use frontdesk_core::stream::StreamKey;
///
/// let key = StreamKey::new("counter:c-17:queue");
/// assert_eq!(key.as_str(), "counter:c-17:queue");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamKey(String);

impl StreamKey {
    /// Create a new `StreamKey` from a string.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the stream key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert the `StreamKey` into its inner `String`.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StreamKey {
    type Err = ParseStreamKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseStreamKeyError(
                "Stream key cannot be empty".to_string(),
            ));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for StreamKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for StreamKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for StreamKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of one entry within a log.
///
/// Entry ids are assigned by the log store on append and are strictly
/// increasing within a key (Redis Streams shape: `"<millis>-<seq>"`).
/// The id is treated as opaque by everything except the store itself;
/// ordering is the store's concern.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(String);

impl EntryId {
    /// Create a new `EntryId` from a store-assigned identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the entry id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for EntryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EntryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Name of a consumer group: a shared cursor over one log key.
///
/// Every entry appended after the group's start position is delivered to
/// exactly one member of the group, which makes horizontal scale-out of a
/// consumer safe — run the same group name on every replica and the store
/// partitions delivery for free.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupName(String);

impl GroupName {
    /// Create a new `GroupName`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the group name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for GroupName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Name of one consumer within a group.
///
/// Usually derived from the process identity (host, pid) so redeliveries
/// after a crash can be attributed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConsumerName(String);

impl ConsumerName {
    /// Create a new `ConsumerName`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the consumer name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConsumerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ConsumerName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
