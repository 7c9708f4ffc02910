//! Delivery guarantee selection.

use serde::{Deserialize, Serialize};

/// How the runtime orders offset commits relative to target writes.
///
/// The choice trades duplicates for loss when a batch fails mid-flight:
/// committing before the first target write means a crash re-reads nothing
/// (records may be lost), committing after all stages means a crash re-reads
/// the batch (records may be written twice).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryGuarantee {
    /// Commit the offset before the first target processes the batch.
    AtMostOnce,
    /// Commit the offset after every stage has processed the batch.
    AtLeastOnce,
}

impl DeliveryGuarantee {
    /// Wire-format string for storage and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AtMostOnce => "at_most_once",
            Self::AtLeastOnce => "at_least_once",
        }
    }
}

impl std::fmt::Display for DeliveryGuarantee {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
