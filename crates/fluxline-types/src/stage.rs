//! Stage identity and classification.

use serde::{Deserialize, Serialize};

/// Opaque stage instance identifier, unique within one pipeline chain.
///
/// Orders lexicographically so per-stage maps iterate deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageId(String);

impl StageId {
    /// Create a new stage identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<S: Into<String>> From<S> for StageId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

/// Role a stage plays in the chain.
///
/// The commit protocol keys off [`StageType::Target`]: under at-most-once
/// delivery the offset commits immediately before the first target runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageType {
    /// Produces records from an external system (first stage in a chain).
    Source,
    /// Transforms, filters, or enriches records in flight.
    Processor,
    /// Writes records to an external system.
    Target,
}

impl StageType {
    /// Wire-format string for storage and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Processor => "processor",
            Self::Target => "target",
        }
    }
}

impl std::fmt::Display for StageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_id_from_and_display() {
        let sid = StageId::from("json-parser-01");
        assert_eq!(sid.as_str(), "json-parser-01");
        assert_eq!(sid.to_string(), "json-parser-01");
    }

    #[test]
    fn stage_id_orders_lexicographically() {
        let mut ids = vec![StageId::new("c"), StageId::new("a"), StageId::new("b")];
        ids.sort();
        let strs: Vec<&str> = ids.iter().map(StageId::as_str).collect();
        assert_eq!(strs, ["a", "b", "c"]);
    }

    #[test]
    fn stage_type_as_str() {
        assert_eq!(StageType::Source.as_str(), "source");
        assert_eq!(StageType::Processor.as_str(), "processor");
        assert_eq!(StageType::Target.as_str(), "target");
    }

    #[test]
    fn stage_type_serde_roundtrip() {
        let json = serde_json::to_string(&StageType::Target).unwrap();
        assert_eq!(json, "\"target\"");
        let back: StageType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, StageType::Target);
    }
}
