//! Engine error model.

use fluxline_state::StateError;
use fluxline_types::error::StageError;
use fluxline_types::stage::StageId;

/// Categorized failure from driving a batch through the chain.
///
/// `Stage` attributes a failure to the stage that raised it. `State` wraps
/// collaborator failures (offset, snapshot, or error-record storage), which
/// are always fatal to the run.
#[derive(Debug)]
pub enum PipelineError {
    /// A stage failed to process the batch.
    Stage {
        /// Stage that raised the error.
        stage: StageId,
        /// The stage's typed error.
        source: StageError,
    },
    /// `capture_next_batch` was called with a zero batch size.
    InvalidCaptureSize(usize),
    /// Offset, snapshot, or error-record storage failed.
    State(StateError),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stage { stage, source } => write!(f, "stage {stage} failed: {source}"),
            Self::InvalidCaptureSize(size) => {
                write!(f, "capture batch size must be greater than zero, got {size}")
            }
            Self::State(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<StateError> for PipelineError {
    fn from(e: StateError) -> Self {
        Self::State(e)
    }
}

impl PipelineError {
    /// Returns the failing stage's identifier if this is a `Stage` variant.
    pub fn stage_id(&self) -> Option<&StageId> {
        match self {
            Self::Stage { stage, .. } => Some(stage),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_display_names_stage() {
        let err = PipelineError::Stage {
            stage: StageId::new("jdbc-writer"),
            source: StageError::connection("JDBC_00", "connection refused"),
        };
        let msg = err.to_string();
        assert!(msg.contains("jdbc-writer"), "got: {msg}");
        assert!(msg.contains("connection refused"), "got: {msg}");
        assert_eq!(err.stage_id().unwrap().as_str(), "jdbc-writer");
    }

    #[test]
    fn test_invalid_capture_size_display() {
        let err = PipelineError::InvalidCaptureSize(0);
        assert_eq!(
            err.to_string(),
            "capture batch size must be greater than zero, got 0"
        );
        assert!(err.stage_id().is_none());
    }

    #[test]
    fn test_state_error_converts() {
        let err: PipelineError = StateError::LockPoisoned.into();
        assert!(matches!(err, PipelineError::State(_)));
        assert!(err.to_string().contains("lock poisoned"));
    }
}
