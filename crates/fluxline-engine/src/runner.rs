//! The batch execution loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use fluxline_state::backend::{ErrorRecordStore, OffsetTracker, SnapshotStore};
use fluxline_types::delivery::DeliveryGuarantee;
use fluxline_types::pipeline::PipelineId;
use fluxline_types::record::ErrorRecord;
use fluxline_types::snapshot::StageOutput;
use fluxline_types::stage::{StageId, StageType};

use crate::batch::Batch;
use crate::capture::CaptureCell;
use crate::errors::PipelineError;
use crate::metrics::RunnerMetrics;
use crate::retention::ErrorRetentionCache;
use crate::stage::Stage;

/// Offsets of the batch the execution thread last touched.
///
/// `source` is where that batch started, `new_source` where the pipeline
/// had committed to once the batch finished.
#[derive(Debug, Clone, Default)]
struct OffsetView {
    source: Option<String>,
    new_source: Option<String>,
}

/// Drives batches through a stage chain until the source exhausts or a stop
/// is requested.
///
/// Exactly one execution thread calls [`run`](BatchRunner::run); control
/// threads may concurrently call [`stop`](BatchRunner::stop),
/// [`capture_next_batch`](BatchRunner::capture_next_batch), and the
/// read-side accessors, so the runner is usually shared as
/// `Arc<BatchRunner>`.
pub struct BatchRunner {
    pipeline: PipelineId,
    delivery: DeliveryGuarantee,
    batch_size: usize,
    offset_tracker: Arc<dyn OffsetTracker>,
    snapshot_store: Arc<dyn SnapshotStore>,
    error_store: Arc<dyn ErrorRecordStore>,
    metrics: RunnerMetrics,
    stop: AtomicBool,
    capture: CaptureCell,
    offsets: Mutex<OffsetView>,
    retention: Mutex<ErrorRetentionCache>,
}

impl BatchRunner {
    /// Build a runner for one pipeline.
    #[must_use]
    pub fn new(
        pipeline: PipelineId,
        delivery: DeliveryGuarantee,
        batch_size: usize,
        offset_tracker: Arc<dyn OffsetTracker>,
        snapshot_store: Arc<dyn SnapshotStore>,
        error_store: Arc<dyn ErrorRecordStore>,
    ) -> Self {
        Self {
            pipeline,
            delivery,
            batch_size,
            offset_tracker,
            snapshot_store,
            error_store,
            metrics: RunnerMetrics::new(),
            stop: AtomicBool::new(false),
            capture: CaptureCell::new(),
            offsets: Mutex::new(OffsetView::default()),
            retention: Mutex::new(ErrorRetentionCache::new()),
        }
    }

    /// Run batches until the source exhausts, a stop is requested, or a
    /// batch fails.
    ///
    /// The stop flag is checked only between batches: an in-flight batch
    /// always completes.
    ///
    /// # Errors
    ///
    /// Returns the first [`PipelineError`] a batch raises; the loop does not
    /// retry.
    pub fn run(&self, stages: &mut [Box<dyn Stage>]) -> Result<(), PipelineError> {
        tracing::info!(
            pipeline = self.pipeline.as_str(),
            delivery = self.delivery.as_str(),
            batch_size = self.batch_size,
            "Starting batch execution loop"
        );

        while !self.offset_tracker.is_finished() && !self.stop.load(Ordering::Acquire) {
            if let Err(err) = self.run_batch(stages) {
                tracing::error!(
                    pipeline = self.pipeline.as_str(),
                    error = %err,
                    "Batch failed, stopping pipeline"
                );
                return Err(err);
            }
        }

        tracing::info!(
            pipeline = self.pipeline.as_str(),
            stopped = self.was_stopped(),
            "Batch execution loop finished"
        );
        Ok(())
    }

    /// Drive one batch through the chain.
    fn run_batch(&self, stages: &mut [Box<dyn Stage>]) -> Result<(), PipelineError> {
        // Consume the capture cell exactly once, at the top: whatever is
        // armed here defines the whole iteration.
        let capture_size = self.capture.armed();
        let mut batch = match capture_size {
            Some(size) => Batch::new(Arc::clone(&self.offset_tracker), size, true),
            None => Batch::new(Arc::clone(&self.offset_tracker), self.batch_size, false),
        };

        let start = Instant::now();
        self.offset_view().source = batch.previous_offset().map(str::to_string);

        let mut committed = false;
        for stage in stages.iter_mut() {
            if self.delivery == DeliveryGuarantee::AtMostOnce
                && stage.stage_type() == StageType::Target
                && !committed
            {
                self.offset_tracker.commit_offset()?;
                committed = true;
            }
            stage
                .process(&mut batch)
                .map_err(|source| PipelineError::Stage {
                    stage: stage.id().clone(),
                    source,
                })?;
            batch.record_stage_output(stage.id());
        }

        if self.delivery == DeliveryGuarantee::AtLeastOnce {
            self.offset_tracker.commit_offset()?;
        }

        let input = batch.input_records();
        let output = batch.output_records();
        let errors = batch.error_records();
        self.metrics.observe_batch(start.elapsed(), input, output, errors);

        self.offset_view().new_source = self.offset_tracker.offset();

        if let Some(size) = capture_size {
            let snapshot = batch.take_stage_outputs();
            self.snapshot_store.store(&self.pipeline, &snapshot)?;
            // Idle only after the snapshot is durable; a failure above
            // leaves the cell armed for the next batch.
            self.capture.disarm(size);
            tracing::info!(
                pipeline = self.pipeline.as_str(),
                capture_size = size,
                stages = snapshot.len(),
                "Stored batch snapshot"
            );
        }

        let error_records = batch.into_error_records();
        if !error_records.is_empty() {
            let stored = self.error_store.store(&self.pipeline, &error_records)?;
            tracing::info!(
                pipeline = self.pipeline.as_str(),
                error_records = stored,
                "Persisted batch error records"
            );
            self.retention_cache().absorb(&error_records);
        }

        tracing::debug!(
            pipeline = self.pipeline.as_str(),
            input_records = input,
            output_records = output,
            error_records = errors,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Batch completed"
        );
        Ok(())
    }

    /// Request a stop. Monotonic: once set it is never cleared, and the
    /// in-flight batch still completes.
    pub fn stop(&self) {
        tracing::info!(
            pipeline = self.pipeline.as_str(),
            "Stop requested, finishing in-flight batch"
        );
        self.stop.store(true, Ordering::Release);
    }

    /// Whether a stop has been requested.
    pub fn was_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Arm a one-shot snapshot capture of the next batch, limited to
    /// `batch_size` records. Re-arming overwrites a pending arm.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidCaptureSize`] for a zero size,
    /// leaving any pending arm untouched.
    pub fn capture_next_batch(&self, batch_size: usize) -> Result<(), PipelineError> {
        if batch_size == 0 {
            return Err(PipelineError::InvalidCaptureSize(batch_size));
        }
        self.capture.arm(batch_size);
        tracing::info!(
            pipeline = self.pipeline.as_str(),
            capture_size = batch_size,
            "Armed snapshot capture for the next batch"
        );
        Ok(())
    }

    /// The stored snapshot, as a list of batches (empty or one entry).
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::State`] if the snapshot store fails.
    pub fn batches_output(&self) -> Result<Vec<Vec<StageOutput>>, PipelineError> {
        let mut batches = Vec::new();
        if self.snapshot_store.exists(&self.pipeline)? {
            batches.push(self.snapshot_store.retrieve(&self.pipeline)?);
        }
        Ok(batches)
    }

    /// Point-in-time copy of a stage's recently retained error records.
    pub fn error_history(&self, stage: &StageId) -> Vec<ErrorRecord> {
        self.retention_cache().recent(stage)
    }

    /// Offset the most recent batch started from.
    pub fn source_offset(&self) -> Option<String> {
        self.offset_view().source.clone()
    }

    /// Offset committed once the most recent batch finished.
    pub fn new_source_offset(&self) -> Option<String> {
        self.offset_view().new_source.clone()
    }

    /// The tracker's current committed offset.
    pub fn committed_offset(&self) -> Option<String> {
        self.offset_tracker.offset()
    }

    /// The offset tracker backing this runner, for hosts that need to
    /// inspect or reuse it.
    pub fn offset_tracker(&self) -> &Arc<dyn OffsetTracker> {
        &self.offset_tracker
    }

    /// This runner's metric instruments.
    pub fn metrics(&self) -> &RunnerMetrics {
        &self.metrics
    }

    /// Lock the offset view, recovering from poisoning: it holds plain
    /// strings a panicked writer cannot leave logically torn.
    fn offset_view(&self) -> MutexGuard<'_, OffsetView> {
        self.offsets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock the retention cache (same poisoning stance as the offset view).
    fn retention_cache(&self) -> MutexGuard<'_, ErrorRetentionCache> {
        self.retention.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
