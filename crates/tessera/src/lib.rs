//! Tessera: a discrete-time, multi-world field simulation substrate for
//! reinforcement learning.
//!
//! This facade re-exports the public API of every Tessera sub-crate so that a
//! single dependency is enough for most users.
//!
//! # Quick start
//!
//! ```rust
//! use tessera::prelude::*;
//!
//! // Fills its output with the current tick number.
//! struct Clock(FieldId);
//!
//! impl Propagator for Clock {
//!     fn name(&self) -> &str { "clock" }
//!     fn reads(&self) -> FieldSet { FieldSet::empty() }
//!     fn writes(&self) -> Vec<(FieldId, WriteMode)> { vec![(self.0, WriteMode::Full)] }
//!     fn step(&self, ctx: &mut StepContext<'_>) -> Result<(), PropagatorError> {
//!         let tick = ctx.tick_id().0 as f32;
//!         if let Some(out) = ctx.writes().write(self.0) {
//!             out.fill(tick);
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let mut config = WorldConfig::new();
//! config
//!     .set_space(SpaceKind::Square4 { rows: 8, cols: 8, edge: EdgeBehavior::Absorb })
//!     .unwrap();
//! let clock = config
//!     .add_field(FieldDef::scalar("clock", FieldMutability::PerTick))
//!     .unwrap();
//! config.add_propagator(Clock(clock)).unwrap();
//!
//! let mut world = World::new(config).unwrap();
//! world.step(&[]).unwrap();
//! world.step(&[]).unwrap();
//! assert_eq!(world.current_tick(), TickId(2));
//! assert!(world.read(clock).unwrap().iter().all(|&v| v == 2.0));
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `tessera-core` | IDs, field definitions, commands, errors, access traits |
//! | [`space`] | `tessera-space` | Topologies, adjacency tables, regions |
//! | [`propagator`] | `tessera-propagator` | Propagator trait, step context, pipeline validation |
//! | [`propagators`] | `tessera-propagators` | Diffusion, identity copy, noise injection |
//! | [`obs`] | `tessera-obs` | Observation specs and compiled plans |
//! | [`engine`] | `tessera-engine` | Worlds, batched stepping, the episodic environment |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits and IDs (`tessera-core`).
pub use tessera_core as types;

/// Topologies and adjacency (`tessera-space`).
///
/// [`space::SpaceKind`] describes a topology; [`space::Adjacency`] is the
/// rank-indexed neighbour table built from it.
pub use tessera_space as space;

/// The propagator trait and pipeline validation (`tessera-propagator`).
pub use tessera_propagator as propagator;

/// Reference propagators (`tessera-propagators`).
pub use tessera_propagators as propagators;

/// Observation specs and extraction (`tessera-obs`).
///
/// Compile an [`obs::ObsSpec`] against a space into an [`obs::ObsPlan`],
/// then fill flat `f32` buffers and validity masks from any snapshot.
pub use tessera_obs as obs;

/// Worlds and batched execution (`tessera-engine`).
///
/// [`engine::World`] steps one world; [`engine::BatchedWorld`] steps many in
/// lockstep; [`engine::BatchedEnv`] adds episodes and auto-reset on top.
pub use tessera_engine as engine;

/// Common imports for typical Tessera usage.
///
/// ```rust
/// use tessera::prelude::*;
/// ```
pub mod prelude {
    pub use tessera_core::{
        BoundaryBehavior, Command, Coord, FieldDef, FieldId, FieldMutability, FieldReader,
        FieldSet, FieldType, FieldWriter, SnapshotAccess, TickId,
    };

    pub use tessera_core::{ObsError, PropagatorError, StepError};

    pub use tessera_space::{Adjacency, EdgeBehavior, RegionSpec, Space, SpaceKind};

    pub use tessera_propagator::{Propagator, StepContext, WriteMode};

    pub use tessera_obs::{ObsEntry, ObsPlan, ObsRegion, ObsSpec, ObsTransform};

    pub use tessera_engine::{
        BatchedEnv, BatchedWorld, EnvConfig, EnvHooks, ResetPolicy, ResetSeeds, StepMetrics,
        World, WorldConfig,
    };
}
