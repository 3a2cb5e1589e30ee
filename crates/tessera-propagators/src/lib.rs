//! Reference propagators for Tessera.
//!
//! - [`GraphDiffusion`]: explicit-Euler diffusion and decay over any
//!   topology, driven by the sentinel-padded adjacency table.
//! - [`IdentityCopy`]: carries a field forward unchanged.
//! - [`NoiseInjection`]: adds Gaussian noise drawn from the world RNG.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod graph_diffusion;
pub mod identity_copy;
pub mod noise_injection;

pub use graph_diffusion::{GraphDiffusion, GraphDiffusionBuilder};
pub use identity_copy::IdentityCopy;
pub use noise_injection::NoiseInjection;

use tessera_core::{FieldId, PropagatorError};

fn unreadable(field: FieldId) -> PropagatorError {
    PropagatorError::ExecutionFailed {
        reason: format!("field {field} not readable"),
    }
}

fn unwritable(field: FieldId) -> PropagatorError {
    PropagatorError::ExecutionFailed {
        reason: format!("field {field} not writable"),
    }
}
