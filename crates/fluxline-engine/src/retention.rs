//! Bounded in-memory retention of recent error records.

use std::collections::{BTreeMap, HashMap, VecDeque};

use fluxline_types::record::ErrorRecord;
use fluxline_types::stage::StageId;

/// Per-stage retention cap.
pub const DEFAULT_RETENTION_CAPACITY: usize = 100;

/// FIFO cache of the most recent error records per stage.
///
/// Absorbing a batch appends in insertion order and evicts oldest-first once
/// a stage exceeds the capacity, so the cache always holds each stage's most
/// recent records. Only the execution thread mutates it; readers get
/// point-in-time clones.
#[derive(Debug)]
pub struct ErrorRetentionCache {
    capacity: usize,
    by_stage: HashMap<StageId, VecDeque<ErrorRecord>>,
}

impl ErrorRetentionCache {
    /// Cache with the default per-stage capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_RETENTION_CAPACITY)
    }

    /// Cache with an explicit per-stage capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            by_stage: HashMap::new(),
        }
    }

    /// Absorb one batch's error records.
    pub fn absorb(&mut self, errors: &BTreeMap<StageId, Vec<ErrorRecord>>) {
        for (stage, records) in errors {
            if records.is_empty() {
                continue;
            }
            let queue = self.by_stage.entry(stage.clone()).or_default();
            queue.extend(records.iter().cloned());
            while queue.len() > self.capacity {
                queue.pop_front();
            }
        }
    }

    /// Point-in-time copy of a stage's retained records, oldest first.
    ///
    /// Empty for stages that never produced errors.
    #[must_use]
    pub fn recent(&self, stage: &StageId) -> Vec<ErrorRecord> {
        self.by_stage
            .get(stage)
            .map(|queue| queue.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of records currently retained for a stage.
    #[must_use]
    pub fn len(&self, stage: &StageId) -> usize {
        self.by_stage.get(stage).map_or(0, VecDeque::len)
    }

    /// True when no stage has retained records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_stage.values().all(VecDeque::is_empty)
    }
}

impl Default for ErrorRetentionCache {
    fn default() -> Self {
        Self::new()
    }
}
