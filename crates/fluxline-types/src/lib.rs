//! Shared data model for the fluxline batch runtime.
//!
//! Pure data types used by the engine and state crates: records, error
//! records, stage and pipeline identifiers, delivery guarantees, and batch
//! snapshot output. Kept free of runtime dependencies so stage and host
//! crates can share them without circular dependencies.

pub mod delivery;
pub mod error;
pub mod pipeline;
pub mod record;
pub mod snapshot;
pub mod stage;
