//! Per-batch pipeline metrics.

use std::time::Duration;

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};

/// Histogram buckets for batch processing time, 1 ms to 60 s.
const BATCH_PROCESSING_BUCKETS: &[f64] = &[
    1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1_000.0, 2_500.0, 5_000.0, 10_000.0,
    30_000.0, 60_000.0,
];

/// The five batch instruments, registered on an owned registry.
///
/// One instance per [`BatchRunner`](crate::runner::BatchRunner); all five
/// update exactly once per completed batch. Instruments are public so hosts
/// and tests can read them directly; [`registry`](RunnerMetrics::registry)
/// hands the whole family to an exporter.
#[derive(Clone)]
pub struct RunnerMetrics {
    registry: Registry,
    /// Wall-clock batch processing time, in milliseconds.
    pub batch_processing: Histogram,
    /// Batches completed.
    pub batch_count: IntCounter,
    /// Records contributed by the source, summed across batches.
    pub batch_input_records: IntCounter,
    /// Records still in flight at batch end, summed across batches.
    pub batch_output_records: IntCounter,
    /// Records routed to the error sink, summed across batches.
    pub batch_error_records: IntCounter,
}

impl RunnerMetrics {
    /// Build the instrument family on a fresh registry.
    ///
    /// # Panics
    ///
    /// Panics if instrument registration fails, which cannot happen with
    /// the fixed, distinct metric names used here.
    #[must_use]
    pub fn new() -> Self {
        let registry = Registry::new();

        let batch_processing = Histogram::with_opts(
            HistogramOpts::new(
                "pipeline_batch_processing_ms",
                "Wall-clock time spent processing one batch, in milliseconds",
            )
            .buckets(BATCH_PROCESSING_BUCKETS.to_vec()),
        )
        .expect("valid histogram opts");
        registry
            .register(Box::new(batch_processing.clone()))
            .expect("register pipeline_batch_processing_ms");

        let batch_count = IntCounter::new("pipeline_batch_count_total", "Batches completed")
            .expect("valid counter opts");
        registry
            .register(Box::new(batch_count.clone()))
            .expect("register pipeline_batch_count_total");

        let batch_input_records = IntCounter::new(
            "pipeline_batch_input_records_total",
            "Records read into batches by the source",
        )
        .expect("valid counter opts");
        registry
            .register(Box::new(batch_input_records.clone()))
            .expect("register pipeline_batch_input_records_total");

        let batch_output_records = IntCounter::new(
            "pipeline_batch_output_records_total",
            "Records still in flight at batch end",
        )
        .expect("valid counter opts");
        registry
            .register(Box::new(batch_output_records.clone()))
            .expect("register pipeline_batch_output_records_total");

        let batch_error_records = IntCounter::new(
            "pipeline_batch_error_records_total",
            "Records routed to the error sink",
        )
        .expect("valid counter opts");
        registry
            .register(Box::new(batch_error_records.clone()))
            .expect("register pipeline_batch_error_records_total");

        Self {
            registry,
            batch_processing,
            batch_count,
            batch_input_records,
            batch_output_records,
            batch_error_records,
        }
    }

    /// Record one completed batch across all five instruments.
    pub fn observe_batch(&self, elapsed: Duration, input: u64, output: u64, errors: u64) {
        self.batch_processing.observe(elapsed.as_secs_f64() * 1_000.0);
        self.batch_count.inc();
        self.batch_input_records.inc_by(input);
        self.batch_output_records.inc_by(output);
        self.batch_error_records.inc_by(errors);
    }

    /// The registry holding all five instruments.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render the registry in the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns a [`prometheus::Error`] if encoding fails.
    pub fn encode_text(&self) -> prometheus::Result<String> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

impl Default for RunnerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
