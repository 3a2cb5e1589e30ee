//! The propagator contract for Tessera simulations.
//!
//! A [`Propagator`] declares what it reads (current tick and previous
//! tick) and what it writes, and is invoked once per tick through a
//! [`StepContext`]. [`validate_pipeline`] checks a propagator list against
//! a world's fields once, up front. [`FnPropagator`] adapts a plain closure
//! to the contract, optionally serialized behind a [`HostLock`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod closure;
pub mod context;
pub mod pipeline;
pub mod propagator;

pub use closure::{FnPropagator, HostLock};
pub use context::StepContext;
pub use pipeline::{validate_pipeline, PipelineError, ReadResolutionPlan, ReadSource, WriteConflict};
pub use propagator::{Propagator, WriteMode};
