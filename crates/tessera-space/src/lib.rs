//! Spatial topologies for Tessera simulations.
//!
//! A [`Space`] defines cells, their canonical rank order, and their
//! neighbourhoods. [`Adjacency`] bakes a space into flat, sentinel-padded
//! neighbour and degree tables so numeric kernels and observation plans
//! never need per-topology code.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod adjacency;
pub mod compliance;
pub mod edge;
pub mod error;
pub mod fcc12;
mod grid;
pub mod hex2d;
pub mod kind;
pub mod line1d;
pub mod product;
pub mod region;
pub mod ring1d;
pub mod space;
pub mod square4;

pub use adjacency::{Adjacency, BfsScratch};
pub use edge::EdgeBehavior;
pub use error::SpaceError;
pub use fcc12::Fcc12;
pub use hex2d::Hex2D;
pub use kind::SpaceKind;
pub use line1d::Line1D;
pub use product::ProductSpace;
pub use region::{RegionPlan, RegionSpec};
pub use ring1d::Ring1D;
pub use space::Space;
pub use square4::Square4;
