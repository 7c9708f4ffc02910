//! Records and error records.

use serde::{Deserialize, Serialize};

/// ISO-8601 UTC timestamp string (e.g. `"2026-02-21T00:00:00Z"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Iso8601Timestamp(pub String);

/// One unit of data moving through the stage chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Identifier assigned by the source, unique within the pipeline run.
    pub id: String,
    /// Record payload.
    pub value: serde_json::Value,
}

impl Record {
    /// Create a record from an id and a JSON payload.
    #[must_use]
    pub fn new(id: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            value,
        }
    }
}

/// A record a stage could not process, with the failure reason.
///
/// Error records are grouped by originating stage identifier at the engine
/// and store boundaries; the record itself carries only the failure context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// The record as it looked when the stage rejected it.
    pub record: Record,
    /// Human-readable reason the stage gave.
    pub error_message: String,
    /// When the rejection happened.
    pub failed_at: Iso8601Timestamp,
}
