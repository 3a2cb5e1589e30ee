//! Simulation worlds and batched stepping for Tessera.
//!
//! - [`WorldConfig`]: one-shot builder for a world.
//! - [`World`]: one simulation instance, stepped a tick at a time.
//! - [`BatchedWorld`]: N worlds stepped and observed in one call.
//! - [`BatchedEnv`]: episodic reward/terminate/auto-reset layer over a
//!   [`BatchedWorld`], customised through [`EnvHooks`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod batched;
pub mod config;
pub mod env;
pub mod metrics;
mod store;
pub mod world;

pub use batched::{BatchError, BatchedWorld};
pub use config::{ConfigError, WorldConfig};
pub use env::{
    BatchedEnv, EnvConfig, EnvError, EnvHooks, EnvStats, ObsBatch, ResetPolicy, ResetSeeds,
    StepOutput,
};
pub use metrics::StepMetrics;
pub use world::{StagedTick, World, WorldError};
