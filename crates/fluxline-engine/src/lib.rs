//! Batch execution core for the fluxline pipeline runtime.
//!
//! A pipeline is an ordered chain of stages (source, processors, targets).
//! [`BatchRunner`] repeatedly builds a [`Batch`], pushes it through the
//! chain, and coordinates offset commits under the configured
//! [`DeliveryGuarantee`](fluxline_types::delivery::DeliveryGuarantee),
//! one-shot snapshot capture, bounded error-record retention, and per-batch
//! metrics.

pub mod batch;
pub(crate) mod capture;
pub mod errors;
pub mod metrics;
pub mod retention;
pub mod runner;
pub mod stage;

// Re-export public API for convenience
pub use batch::Batch;
pub use errors::PipelineError;
pub use metrics::RunnerMetrics;
pub use retention::ErrorRetentionCache;
pub use runner::BatchRunner;
pub use stage::Stage;
