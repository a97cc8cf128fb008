//! Flat field/value records — the wire format of every log entry.
//!
//! The log store protocol only moves flat string pairs: booleans and numbers
//! are encoded as strings on write and decoded by field-name convention on
//! read. `Record` owns that convention in one place so no consumer hand-rolls
//! `"true"`-string comparisons.
//!
//! # Example
//!
//! ```
//! use frontdesk_core::record::Record;
//!
//! let record = Record::new()
//!     .with("event", "TICKET_ISSUED")
//!     .with("sequence", 42_u64)
//!     .with("is_on_time", true);
//!
//! assert_eq!(record.str_field("event").unwrap(), "TICKET_ISSUED");
//! assert_eq!(record.u64_field("sequence").unwrap(), 42);
//! assert!(record.bool_field("is_on_time").unwrap());
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while decoding a record's fields.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// The named field is not present on the record.
    #[error("Missing field: {0}")]
    MissingField(String),

    /// The field is present but its value does not decode as the
    /// requested type.
    #[error("Invalid value for field {field}: {value:?}")]
    InvalidField {
        /// Field name.
        field: String,
        /// The raw value that failed to decode.
        value: String,
    },
}

/// A flat, ordered list of string field/value pairs.
///
/// Insertion order is preserved because the log store returns fields in the
/// order they were appended. Later values for the same field shadow earlier
/// ones on read (`get` scans from the back), matching re-append semantics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record(Vec<(String, String)>);

impl Record {
    /// Create an empty record.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a field. Values are converted through [`FieldValue`], so
    /// strings, integers and booleans all encode with the same call.
    pub fn set(&mut self, field: impl Into<String>, value: impl FieldValue) {
        self.0.push((field.into(), value.encode()));
    }

    /// Builder-style [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl FieldValue) -> Self {
        self.set(field, value);
        self
    }

    /// Look up the latest value of a field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.as_str())
    }

    /// Look up a field, failing with [`RecordError::MissingField`].
    ///
    /// # Errors
    ///
    /// Returns `RecordError::MissingField` when the field is absent.
    pub fn str_field(&self, field: &str) -> Result<&str, RecordError> {
        self.get(field)
            .ok_or_else(|| RecordError::MissingField(field.to_string()))
    }

    /// Decode a field as `i64`.
    ///
    /// # Errors
    ///
    /// Returns `MissingField` when absent, `InvalidField` when the value is
    /// not an integer.
    pub fn i64_field(&self, field: &str) -> Result<i64, RecordError> {
        let raw = self.str_field(field)?;
        raw.parse().map_err(|_| RecordError::InvalidField {
            field: field.to_string(),
            value: raw.to_string(),
        })
    }

    /// Decode a field as `u64`.
    ///
    /// # Errors
    ///
    /// Returns `MissingField` when absent, `InvalidField` when the value is
    /// not a non-negative integer.
    pub fn u64_field(&self, field: &str) -> Result<u64, RecordError> {
        let raw = self.str_field(field)?;
        raw.parse().map_err(|_| RecordError::InvalidField {
            field: field.to_string(),
            value: raw.to_string(),
        })
    }

    /// Decode a field as `bool` (encoded as `"true"` / `"false"`).
    ///
    /// # Errors
    ///
    /// Returns `MissingField` when absent, `InvalidField` for anything other
    /// than the two literal encodings.
    pub fn bool_field(&self, field: &str) -> Result<bool, RecordError> {
        match self.str_field(field)? {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(RecordError::InvalidField {
                field: field.to_string(),
                value: other.to_string(),
            }),
        }
    }

    /// Decode a field holding a JSON document.
    ///
    /// Structured payloads (the full queue item, notification data) ride in
    /// a single `data` field as JSON text; everything else stays flat.
    ///
    /// # Errors
    ///
    /// Returns `MissingField` when absent, `InvalidField` when the value is
    /// not valid JSON for `T`.
    pub fn json_field<T: DeserializeOwned>(&self, field: &str) -> Result<T, RecordError> {
        let raw = self.str_field(field)?;
        serde_json::from_str(raw).map_err(|_| RecordError::InvalidField {
            field: field.to_string(),
            value: raw.to_string(),
        })
    }

    /// Iterate over all field/value pairs in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(f, v)| (f.as_str(), v.as_str()))
    }

    /// Number of field/value pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the record carries no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<(String, String)>> for Record {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }
}

impl FromIterator<(String, String)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Conversion of a typed value into its string encoding.
///
/// The protocol carries only strings, so every value type used in a record
/// declares how it flattens. Implemented for the handful of types the
/// system actually writes.
pub trait FieldValue {
    /// Encode the value as the protocol string.
    fn encode(self) -> String;
}

impl FieldValue for String {
    fn encode(self) -> String {
        self
    }
}

impl FieldValue for &String {
    fn encode(self) -> String {
        self.clone()
    }
}

impl FieldValue for &str {
    fn encode(self) -> String {
        self.to_string()
    }
}

impl FieldValue for bool {
    fn encode(self) -> String {
        if self { "true" } else { "false" }.to_string()
    }
}

impl FieldValue for i64 {
    fn encode(self) -> String {
        self.to_string()
    }
}

impl FieldValue for u64 {
    fn encode(self) -> String {
        self.to_string()
    }
}

impl FieldValue for u32 {
    fn encode(self) -> String {
        self.to_string()
    }
}

impl FieldValue for u8 {
    fn encode(self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Panics: tests assert on decode results
mod tests {
    use super::*;

    #[test]
    fn set_and_get_roundtrip() {
        let mut record = Record::new();
        record.set("patient_name", "An Tran");
        record.set("age", 72_i64);
        record.set("is_pregnant", false);

        assert_eq!(record.get("patient_name"), Some("An Tran"));
        assert_eq!(record.i64_field("age").unwrap(), 72);
        assert!(!record.bool_field("is_pregnant").unwrap());
    }

    #[test]
    fn later_value_shadows_earlier() {
        let record = Record::new().with("status", "WAITING").with("status", "SERVING");
        assert_eq!(record.get("status"), Some("SERVING"));
    }

    #[test]
    fn missing_field_is_reported_by_name() {
        let record = Record::new();
        let err = record.str_field("sequence").unwrap_err();
        assert_eq!(err, RecordError::MissingField("sequence".to_string()));
    }

    #[test]
    fn invalid_number_is_invalid_field() {
        let record = Record::new().with("sequence", "not-a-number");
        let err = record.u64_field("sequence").unwrap_err();
        assert!(matches!(err, RecordError::InvalidField { .. }));
    }

    #[test]
    fn bool_rejects_non_literal_values() {
        let record = Record::new().with("removed", "1");
        assert!(record.bool_field("removed").is_err());
    }

    #[test]
    fn json_field_decodes_documents() {
        #[derive(serde::Deserialize)]
        struct Payload {
            id: String,
        }

        let record = Record::new().with("data", r#"{"id":"abc"}"#);
        let payload: Payload = record.json_field("data").unwrap();
        assert_eq!(payload.id, "abc");
    }

    #[test]
    fn fields_preserve_insertion_order() {
        let record = Record::new().with("a", "1").with("b", "2");
        let fields: Vec<_> = record.fields().collect();
        assert_eq!(fields, vec![("a", "1"), ("b", "2")]);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn numbers_roundtrip_through_string_encoding(value in any::<i64>()) {
                let record = Record::new().with("n", value);
                prop_assert_eq!(record.i64_field("n").unwrap(), value);
            }

            #[test]
            fn bools_roundtrip_through_string_encoding(value in any::<bool>()) {
                let record = Record::new().with("b", value);
                prop_assert_eq!(record.bool_field("b").unwrap(), value);
            }
        }
    }
}
