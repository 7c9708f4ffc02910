//! Storage contract definitions.
//!
//! The batch runner drives three collaborators: an [`OffsetTracker`] for the
//! source position, a [`SnapshotStore`] for captured batch output, and an
//! [`ErrorRecordStore`] for rejected records. Model types live in
//! [`fluxline_types`].

use std::collections::BTreeMap;

use fluxline_types::pipeline::PipelineId;
use fluxline_types::record::ErrorRecord;
use fluxline_types::snapshot::StageOutput;
use fluxline_types::stage::StageId;

use crate::error;

/// Source-offset bookkeeping for one pipeline.
///
/// The runner stages an offset while a batch is in flight and commits it at
/// the point the delivery guarantee dictates. A committed `None` marks the
/// source as exhausted. Implementations must be `Send + Sync` for use behind
/// `Arc<dyn OffsetTracker>`.
pub trait OffsetTracker: Send + Sync {
    /// True once a `None` offset has been committed (source exhausted).
    fn is_finished(&self) -> bool;

    /// Last durably committed offset.
    fn offset(&self) -> Option<String>;

    /// Stage the offset the in-flight batch will have consumed up to.
    ///
    /// The staged value is in-memory only until
    /// [`commit_offset`](Self::commit_offset) runs.
    fn set_offset(&self, offset: Option<String>);

    /// Durably persist the staged offset.
    ///
    /// After a successful commit the staged value becomes the committed
    /// value, the staged slot clears, and [`is_finished`](Self::is_finished)
    /// reflects whether the committed value was `None`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure;
    /// the committed/staged state is left untouched.
    fn commit_offset(&self) -> error::Result<()>;
}

/// Durable store for the single batch snapshot a pipeline may hold.
///
/// Storing replaces any previous snapshot; a pipeline holds at most one.
pub trait SnapshotStore: Send + Sync {
    /// Whether a snapshot is stored for `pipeline`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn exists(&self, pipeline: &PipelineId) -> error::Result<bool>;

    /// Retrieve the stored snapshot, in chain order.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::SnapshotMissing`](crate::error::StateError::SnapshotMissing)
    /// when no snapshot is stored, or another
    /// [`StateError`](crate::error::StateError) on storage failure.
    fn retrieve(&self, pipeline: &PipelineId) -> error::Result<Vec<StageOutput>>;

    /// Store `snapshot`, replacing any previous one for `pipeline`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn store(&self, pipeline: &PipelineId, snapshot: &[StageOutput]) -> error::Result<()>;
}

/// Durable append-only store for batch error records.
pub trait ErrorRecordStore: Send + Sync {
    /// Append one batch's error records, grouped by originating stage.
    /// Returns the count inserted.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn store(
        &self,
        pipeline: &PipelineId,
        errors: &BTreeMap<StageId, Vec<ErrorRecord>>,
    ) -> error::Result<u64>;
}
