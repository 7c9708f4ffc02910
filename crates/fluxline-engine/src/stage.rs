//! Stage seam the runner drives.

use fluxline_types::error::StageError;
use fluxline_types::stage::{StageId, StageType};

use crate::batch::Batch;

/// One stage in a pipeline chain.
///
/// The runner calls [`process`](Stage::process) once per batch, in chain
/// order. Sources fill the batch with records, processors transform or
/// reject them, targets write them out. A returned error fails the whole
/// batch; per-record problems should flow to the batch's error sink via
/// [`Batch::send_to_error`] instead.
pub trait Stage: Send {
    /// Stage instance identifier, unique within the chain.
    fn id(&self) -> &StageId;

    /// Role this stage plays; the commit protocol keys off
    /// [`StageType::Target`].
    fn stage_type(&self) -> StageType;

    /// Process one batch.
    ///
    /// # Errors
    ///
    /// Returns a [`StageError`] when the stage cannot process the batch at
    /// all; the runner wraps it with this stage's identifier and fails the
    /// run.
    fn process(&mut self, batch: &mut Batch) -> Result<(), StageError>;
}
