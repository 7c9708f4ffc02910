//! Pipeline identity.

use serde::{Deserialize, Serialize};

/// Opaque pipeline identifier.
///
/// Scopes everything the runtime persists: offsets, snapshots, and error
/// records are all keyed by pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineId(String);

impl PipelineId {
    /// Create a new pipeline identifier.
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

impl std::fmt::Display for PipelineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<S: Into<String>> From<S> for PipelineId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_id_display_and_as_str() {
        let pid = PipelineId::new("orders-sync");
        assert_eq!(pid.as_str(), "orders-sync");
        assert_eq!(pid.to_string(), "orders-sync");
    }

    #[test]
    fn pipeline_id_eq_and_hash() {
        use std::collections::HashSet;
        let a = PipelineId::new("p1");
        let b = PipelineId::new("p1");
        assert_eq!(a, b);
        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn pipeline_id_serde_transparent() {
        let pid = PipelineId::new("test");
        let json = serde_json::to_string(&pid).unwrap();
        assert_eq!(json, "\"test\"");
    }
}
