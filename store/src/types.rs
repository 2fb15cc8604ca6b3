//! Record identifiers, object metadata, and the shared record types that
//! cross the gateway / store / normalizer boundaries.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Timestamp format used for the `request-time` metadata field.
///
/// Common Log Format, e.g. `02/Jan/2026:15:04:05 +0000`.
pub const REQUEST_TIME_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Metadata keys attached to stored objects.
pub const META_TABLE: &str = "table";
pub const META_REQUEST_TIME: &str = "request-time";
pub const META_CONTENT_TYPE: &str = "content-type";
pub const META_SOURCE_ID: &str = "source-id";
pub const META_REASON: &str = "reason";

/// Unique identifier assigned to a request at accept time.
///
/// This is the only correlation key returned to the caller and it never
/// changes once assigned.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        RecordId(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(RecordId(Uuid::parse_str(s)?))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_hyphenated())
    }
}

/// String-keyed metadata stored out of band next to an object body.
///
/// Matches the object-store model where metadata travels separately from the
/// payload. Keys are sorted so the serialized form is stable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectMeta {
    fields: BTreeMap<String, String>,
}

impl ObjectMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn table(&self) -> Option<&str> {
        self.get(META_TABLE)
    }

    /// Parse the `request-time` field, if present and well-formed.
    pub fn request_time(&self) -> Option<DateTime<FixedOffset>> {
        let raw = self.get(META_REQUEST_TIME)?;
        parse_request_time(raw).ok()
    }
}

/// Render a timestamp for the `request-time` metadata field.
pub fn format_request_time(time: &DateTime<Utc>) -> String {
    time.format(REQUEST_TIME_FORMAT).to_string()
}

/// Parse a `request-time` metadata value.
pub fn parse_request_time(raw: &str) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
    DateTime::parse_from_str(raw, REQUEST_TIME_FORMAT)
}

/// Message published to the delivery queue after a durable landing write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LandingNotice {
    pub id: RecordId,
    pub table: String,
}

/// A normalized, columnar-query-friendly document.
///
/// Never mutated after creation. Reprocessing the same landing record
/// produces an identical document at the same key, keyed by provenance
/// (`source`) rather than by a new identity.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NormalizedDocument {
    pub table: String,
    /// Arrival timestamp the partition key derives from.
    pub arrived_at: DateTime<FixedOffset>,
    /// Provenance reference back to the originating landing record.
    pub source: RecordId,
    /// Flattened field mapping. BTreeMap keeps key order stable so the
    /// serialized body is byte-identical across reprocessing.
    pub fields: BTreeMap<String, serde_json::Value>,
}
