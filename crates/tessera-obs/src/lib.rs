//! Observation extraction for Tessera worlds.
//!
//! An [`ObsSpec`] lists what to observe: one [`ObsEntry`] per field, each
//! with a region, a transform and optional pooling. [`ObsPlan::compile`]
//! resolves the list against a topology once, fixing the output length,
//! and the plan then fills caller-owned buffers every tick.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod metadata;
pub mod plan;
pub mod pool;
pub mod spec;

pub use metadata::ObsMetadata;
pub use plan::ObsPlan;
pub use spec::{ObsEntry, ObsRegion, ObsSpec, ObsTransform, PoolConfig, PoolKernel};
