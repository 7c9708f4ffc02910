//! The unit of work one loop iteration drives through the chain.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use fluxline_state::backend::OffsetTracker;
use fluxline_types::record::{ErrorRecord, Iso8601Timestamp, Record};
use fluxline_types::snapshot::StageOutput;
use fluxline_types::stage::StageId;

/// One batch moving through the stage chain.
///
/// Carries the in-flight records, the offset view for this iteration, the
/// per-stage error sink, and (for capture batches) the per-stage output
/// trail. Stages receive `&mut Batch` and use the stage-facing API; the
/// runner owns construction and teardown.
pub struct Batch {
    tracker: Arc<dyn OffsetTracker>,
    previous_offset: Option<String>,
    batch_size: usize,
    records: Vec<Record>,
    input_records: u64,
    errors: BTreeMap<StageId, Vec<ErrorRecord>>,
    /// `Some` only for capture batches.
    stage_outputs: Option<Vec<StageOutput>>,
}

impl Batch {
    /// Build a batch for one loop iteration.
    ///
    /// Captures the tracker's committed offset as this batch's
    /// `previous_offset`; `capture` turns on the per-stage output trail.
    pub(crate) fn new(tracker: Arc<dyn OffsetTracker>, batch_size: usize, capture: bool) -> Self {
        let previous_offset = tracker.offset();
        Self {
            tracker,
            previous_offset,
            batch_size,
            records: Vec::new(),
            input_records: 0,
            errors: BTreeMap::new(),
            stage_outputs: capture.then(Vec::new),
        }
    }

    /// Offset the pipeline had durably committed when this batch started.
    ///
    /// `None` means the source starts from the beginning.
    #[must_use]
    pub fn previous_offset(&self) -> Option<&str> {
        self.previous_offset.as_deref()
    }

    /// Maximum number of records the source should contribute.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Records currently in flight.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Source API: contribute records, counted as batch input.
    pub fn fill(&mut self, records: Vec<Record>) {
        self.input_records += records.len() as u64;
        self.records.extend(records);
    }

    /// Processor API: take the in-flight records for transformation.
    ///
    /// Pair with [`set_records`](Self::set_records) to put the survivors
    /// back; records routed to [`send_to_error`](Self::send_to_error) leave
    /// the flow.
    #[must_use]
    pub fn take_records(&mut self) -> Vec<Record> {
        std::mem::take(&mut self.records)
    }

    /// Processor API: replace the in-flight records.
    pub fn set_records(&mut self, records: Vec<Record>) {
        self.records = records;
    }

    /// Stage the offset this batch will have consumed up to.
    ///
    /// Durable only once the runner commits at the point the delivery
    /// guarantee dictates.
    pub fn set_new_offset(&self, offset: Option<String>) {
        self.tracker.set_offset(offset);
    }

    /// Route a record this stage rejected to the error sink.
    pub fn send_to_error(&mut self, stage: &StageId, record: Record, reason: impl Into<String>) {
        let error = ErrorRecord {
            record,
            error_message: reason.into(),
            failed_at: Iso8601Timestamp(Utc::now().to_rfc3339()),
        };
        self.errors.entry(stage.clone()).or_default().push(error);
    }

    /// Records the source contributed.
    #[must_use]
    pub fn input_records(&self) -> u64 {
        self.input_records
    }

    /// Records still in flight.
    #[must_use]
    pub fn output_records(&self) -> u64 {
        self.records.len() as u64
    }

    /// Total records routed to the error sink, across all stages.
    #[must_use]
    pub fn error_records(&self) -> u64 {
        self.errors.values().map(Vec::len).sum::<usize>() as u64
    }

    /// Append the current in-flight records as `stage`'s output.
    ///
    /// No-op unless this is a capture batch.
    pub(crate) fn record_stage_output(&mut self, stage: &StageId) {
        if let Some(outputs) = &mut self.stage_outputs {
            outputs.push(StageOutput::new(stage.clone(), self.records.clone()));
        }
    }

    /// Take the capture trail (empty for non-capture batches).
    pub(crate) fn take_stage_outputs(&mut self) -> Vec<StageOutput> {
        self.stage_outputs.take().unwrap_or_default()
    }

    /// Consume the batch, yielding the error sink grouped by stage.
    pub(crate) fn into_error_records(self) -> BTreeMap<StageId, Vec<ErrorRecord>> {
        self.errors
    }
}
