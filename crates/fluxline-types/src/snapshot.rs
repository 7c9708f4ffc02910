//! Batch snapshot output.

use crate::record::Record;
use crate::stage::StageId;
use serde::{Deserialize, Serialize};

/// The records one stage emitted while a capture batch ran.
///
/// A snapshot is an ordered `Vec<StageOutput>`, one entry per stage in chain
/// order, so operators can see how a batch mutated at every hop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutput {
    /// Stage that emitted (or passed through) these records.
    pub stage: StageId,
    /// Records in flight immediately after the stage ran.
    pub records: Vec<Record>,
}

impl StageOutput {
    /// Create a stage output entry.
    #[must_use]
    pub fn new(stage: StageId, records: Vec<Record>) -> Self {
        Self { stage, records }
    }
}
