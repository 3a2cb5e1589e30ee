//! N worlds stepped and observed in one call.
//!
//! [`BatchedWorld`] owns N [`World`]s that share one topology and one
//! compiled [`ObsPlan`]. [`step_and_observe`](BatchedWorld::step_and_observe)
//! stages every world in parallel, commits them only if all succeeded, and
//! fills a single contiguous observation buffer where world `i` owns the
//! slice at `i * output_len`.
//!
//! Worlds never share mutable state, so the parallel phases need no
//! synchronization beyond rayon's join at the end of each phase.

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

use tessera_core::{Command, FieldId, ObsError, StepError, TickId};
use tessera_obs::{ObsMetadata, ObsPlan, ObsSpec};

use crate::config::{ConfigError, WorldConfig};
use crate::world::{World, WorldError};

/// Errors from a batched operation.
#[derive(Debug, Error)]
pub enum BatchError {
    /// A world failed to stage its tick; no world was committed.
    #[error("world {world_index}: step failed: {error}")]
    Step {
        /// Index of the first world that failed.
        world_index: usize,
        /// What went wrong.
        #[source]
        error: StepError,
    },
    /// A world could not be built.
    #[error("world {world_index}: {error}")]
    Config {
        /// Index of the offending config.
        world_index: usize,
        /// What went wrong.
        #[source]
        error: ConfigError,
    },
    /// A world refused an operation.
    #[error("world {world_index}: {error}")]
    World {
        /// Index of the world.
        world_index: usize,
        /// What went wrong.
        #[source]
        error: WorldError,
    },
    /// Observation compilation or extraction failed.
    #[error("observation failed: {0}")]
    Observe(#[from] ObsError),
    /// World index out of range.
    #[error("world index {world_index} out of range (num_worlds={num_worlds})")]
    InvalidIndex {
        /// The requested index.
        world_index: usize,
        /// Number of worlds.
        num_worlds: usize,
    },
    /// An argument is inconsistent with the batch.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// What is wrong.
        reason: String,
    },
    /// The batch has been destroyed.
    #[error("use after destroy")]
    Destroyed,
}

fn invalid(reason: String) -> BatchError {
    BatchError::InvalidArgument { reason }
}

/// N worlds with a shared observation layout.
#[derive(Debug)]
pub struct BatchedWorld {
    worlds: Vec<World>,
    plan: ObsPlan,
    destroyed: bool,
}

impl BatchedWorld {
    /// Build one world per config and compile `spec` against their shared
    /// topology.
    ///
    /// # Errors
    ///
    /// [`BatchError::InvalidArgument`] for an empty config list, topologies
    /// that differ, agent-relative entries, or observed fields that are
    /// missing, non-scalar or declared differently across worlds.
    /// [`BatchError::Config`] if a world fails to build.
    pub fn new(configs: Vec<WorldConfig>, spec: &ObsSpec) -> Result<Self, BatchError> {
        if configs.is_empty() {
            return Err(invalid("a batch needs at least one world config".into()));
        }
        let worlds = configs
            .into_iter()
            .enumerate()
            .map(|(world_index, config)| {
                World::new(config).map_err(|error| BatchError::Config { world_index, error })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let reference = worlds[0].space();
        for (i, world) in worlds.iter().enumerate().skip(1) {
            if !reference.topology_eq(world.space()) {
                return Err(invalid(format!(
                    "world 0 and world {i} have different topologies; a batch shares one"
                )));
            }
        }

        let plan = ObsPlan::compile(spec, reference)?;
        if plan.is_agent_relative() {
            return Err(invalid(
                "agent-relative regions have no centre in a batched observation".into(),
            ));
        }
        if plan.output_len() == 0 {
            return Err(invalid("observation spec produces no output".into()));
        }
        for field in plan.field_ids() {
            check_field_schema(&worlds, field)?;
        }

        info!(
            worlds = worlds.len(),
            output_len = plan.output_len(),
            "batched world created"
        );
        Ok(Self {
            worlds,
            plan,
            destroyed: false,
        })
    }

    /// Step every world once and observe the results.
    ///
    /// `commands[i]` goes to world `i`. `output` and `mask` must be exactly
    /// `num_worlds() * output_len()` long. Argument checks happen before
    /// any world is touched. If any world fails to stage, every world is
    /// left at its previous tick and the first failure is returned.
    ///
    /// Returns the post-step tick of every world.
    pub fn step_and_observe(
        &mut self,
        commands: &[Vec<Command>],
        output: &mut [f32],
        mask: &mut [u8],
    ) -> Result<Vec<TickId>, BatchError> {
        self.check_alive()?;
        let n = self.worlds.len();
        if commands.len() != n {
            return Err(invalid(format!(
                "commands has {} entries, expected {n}",
                commands.len()
            )));
        }
        self.check_buffers(output, mask)?;

        let staged: Vec<_> = self
            .worlds
            .par_iter_mut()
            .zip(commands.par_iter())
            .map(|(world, cmds)| world.stage(cmds))
            .collect();

        let mut ready = Vec::with_capacity(n);
        let mut failure = None;
        for (i, result) in staged.into_iter().enumerate() {
            match result {
                Ok(tick) => ready.push((i, tick)),
                Err(error) => {
                    failure.get_or_insert((i, error));
                }
            }
        }
        if let Some((world_index, error)) = failure {
            for (i, tick) in ready {
                self.worlds[i].abandon(tick);
            }
            debug!(world_index, "batch step abandoned");
            return Err(BatchError::Step { world_index, error });
        }

        let ticks: Vec<TickId> = self
            .worlds
            .par_iter_mut()
            .zip(ready.into_par_iter())
            .map(|(world, (_, tick))| {
                world.commit(tick);
                world.current_tick()
            })
            .collect();

        self.observe_into(output, mask)?;
        Ok(ticks)
    }

    /// Observe every world without stepping.
    ///
    /// Two calls with no step in between write identical buffers.
    pub fn observe_all(
        &self,
        output: &mut [f32],
        mask: &mut [u8],
    ) -> Result<Vec<ObsMetadata>, BatchError> {
        self.check_alive()?;
        self.check_buffers(output, mask)?;
        self.observe_into(output, mask)
    }

    fn observe_into(
        &self,
        output: &mut [f32],
        mask: &mut [u8],
    ) -> Result<Vec<ObsMetadata>, BatchError> {
        let per = self.plan.output_len();
        output
            .par_chunks_mut(per)
            .zip(mask.par_chunks_mut(per))
            .zip(self.worlds.par_iter())
            .map(|((out, m), world)| self.plan.execute(world, out, m))
            .collect::<Result<Vec<_>, _>>()
            .map_err(BatchError::from)
    }

    /// Reset world `i` to tick 0 with `seed`. Other worlds are untouched.
    pub fn reset_world(&mut self, i: usize, seed: u64) -> Result<(), BatchError> {
        self.check_alive()?;
        let num_worlds = self.worlds.len();
        let world = self.worlds.get_mut(i).ok_or(BatchError::InvalidIndex {
            world_index: i,
            num_worlds,
        })?;
        world.reset(seed).map_err(|error| BatchError::World {
            world_index: i,
            error,
        })?;
        debug!(world_index = i, seed, "world reset");
        Ok(())
    }

    /// Reset world `i` with `seeds[i]`, for every world.
    pub fn reset_all(&mut self, seeds: &[u64]) -> Result<(), BatchError> {
        self.check_alive()?;
        let n = self.worlds.len();
        if seeds.len() != n {
            return Err(invalid(format!("seeds has {} entries, expected {n}", seeds.len())));
        }
        for (i, &seed) in seeds.iter().enumerate() {
            self.reset_world(i, seed)?;
        }
        Ok(())
    }

    /// Step each listed world `ticks` times with no commands, in parallel.
    ///
    /// Used for warmup after a reset. Unlike
    /// [`step_and_observe`](Self::step_and_observe) this is not atomic: a
    /// failing world stops at its last good tick and the others carry on.
    pub fn advance_worlds(&mut self, indices: &[usize], ticks: u32) -> Result<(), BatchError> {
        self.check_alive()?;
        let num_worlds = self.worlds.len();
        if let Some(&world_index) = indices.iter().find(|&&i| i >= num_worlds) {
            return Err(BatchError::InvalidIndex {
                world_index,
                num_worlds,
            });
        }
        if ticks == 0 {
            return Ok(());
        }
        let results: Vec<Result<(), BatchError>> = self
            .worlds
            .par_iter_mut()
            .enumerate()
            .filter(|(i, _)| indices.contains(i))
            .map(|(world_index, world)| {
                (0..ticks).try_for_each(|_| {
                    world
                        .step(&[])
                        .map(drop)
                        .map_err(|error| BatchError::Step { world_index, error })
                })
            })
            .collect();
        results.into_iter().collect()
    }

    /// Destroy every world. Idempotent.
    pub fn destroy(&mut self) {
        if !self.destroyed {
            self.destroyed = true;
            for world in &mut self.worlds {
                world.destroy();
            }
            debug!(worlds = self.worlds.len(), "batched world destroyed");
        }
    }

    /// Whether [`destroy`](Self::destroy) has been called.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Number of worlds.
    pub fn num_worlds(&self) -> usize {
        self.worlds.len()
    }

    /// Observation floats per world.
    pub fn output_len(&self) -> usize {
        self.plan.output_len()
    }

    /// Mask bytes per world.
    pub fn mask_len(&self) -> usize {
        self.plan.mask_len()
    }

    /// The shared observation plan.
    pub fn plan(&self) -> &ObsPlan {
        &self.plan
    }

    /// World `i`, for inspection.
    pub fn world(&self, i: usize) -> Option<&World> {
        self.worlds.get(i)
    }

    /// Current tick of every world.
    pub fn tick_ids(&self) -> Vec<TickId> {
        self.worlds.iter().map(World::current_tick).collect()
    }

    fn check_alive(&self) -> Result<(), BatchError> {
        if self.destroyed {
            Err(BatchError::Destroyed)
        } else {
            Ok(())
        }
    }

    fn check_buffers(&self, output: &[f32], mask: &[u8]) -> Result<(), BatchError> {
        let expected = self.worlds.len() * self.plan.output_len();
        if output.len() != expected {
            return Err(ObsError::BufferLength {
                buffer: "output",
                expected,
                got: output.len(),
            }
            .into());
        }
        if mask.len() != expected {
            return Err(ObsError::BufferLength {
                buffer: "mask",
                expected,
                got: mask.len(),
            }
            .into());
        }
        Ok(())
    }
}

fn check_field_schema(worlds: &[World], field: FieldId) -> Result<(), BatchError> {
    let describe = |w: &World| {
        w.field_defs()
            .get(field.0 as usize)
            .map(|d| (d.field_type, d.buffer_len(w.adjacency().cell_count())))
    };
    let reference = describe(&worlds[0]);
    match reference {
        None => return Err(invalid(format!("observed field {field} is not registered"))),
        Some((ty, _)) if ty.components() != 1 => {
            return Err(invalid(format!("observed field {field} is not scalar")))
        }
        Some(_) => {}
    }
    for (i, world) in worlds.iter().enumerate().skip(1) {
        if describe(world) != reference {
            return Err(invalid(format!(
                "world {i} declares field {field} differently from world 0"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{FieldDef, FieldMutability};
    use tessera_obs::ObsEntry;
    use tessera_space::{EdgeBehavior, RegionSpec, SpaceKind};
    use tessera_test_utils::ConstPropagator;

    fn config(len: u32, value: f32) -> WorldConfig {
        let mut cfg = WorldConfig::new();
        cfg.set_space(SpaceKind::Line1D {
            len,
            edge: EdgeBehavior::Absorb,
        })
        .unwrap();
        let f = cfg
            .add_field(FieldDef::scalar("energy", FieldMutability::PerTick))
            .unwrap();
        cfg.add_propagator(ConstPropagator::new("const", f, value)).unwrap();
        cfg
    }

    fn spec() -> ObsSpec {
        ObsSpec::new(vec![ObsEntry::new(FieldId(0), RegionSpec::All)])
    }

    #[test]
    fn empty_batch_rejected() {
        assert!(matches!(
            BatchedWorld::new(vec![], &spec()),
            Err(BatchError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn mismatched_topology_rejected() {
        let err = BatchedWorld::new(vec![config(10, 1.0), config(12, 1.0)], &spec()).unwrap_err();
        assert!(err.to_string().contains("different topologies"));
    }

    #[test]
    fn unregistered_field_rejected() {
        let spec = ObsSpec::new(vec![ObsEntry::new(FieldId(3), RegionSpec::All)]);
        assert!(matches!(
            BatchedWorld::new(vec![config(10, 1.0)], &spec),
            Err(BatchError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn command_count_mismatch_names_both_counts() {
        let mut batch = BatchedWorld::new(vec![config(10, 1.0), config(10, 2.0)], &spec()).unwrap();
        let mut out = vec![0.0; 20];
        let mut mask = vec![0; 20];
        let err = batch
            .step_and_observe(&[vec![], vec![], vec![]], &mut out, &mut mask)
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid argument: commands has 3 entries, expected 2");
        assert_eq!(batch.tick_ids(), vec![TickId(0), TickId(0)]);
    }

    #[test]
    fn slices_are_per_world() {
        let mut batch = BatchedWorld::new(vec![config(4, 1.0), config(4, 2.0)], &spec()).unwrap();
        let mut out = vec![0.0; 8];
        let mut mask = vec![0; 8];
        let ticks = batch.step_and_observe(&[vec![], vec![]], &mut out, &mut mask).unwrap();
        assert_eq!(ticks, vec![TickId(1), TickId(1)]);
        assert_eq!(out, vec![1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0]);
        assert!(mask.iter().all(|&m| m == 1));
    }

    #[test]
    fn wrong_buffer_length_rejected_before_stepping() {
        let mut batch = BatchedWorld::new(vec![config(4, 1.0)], &spec()).unwrap();
        let mut out = vec![0.0; 5];
        let mut mask = vec![0; 4];
        assert!(matches!(
            batch.step_and_observe(&[vec![]], &mut out, &mut mask),
            Err(BatchError::Observe(ObsError::BufferLength { buffer: "output", .. }))
        ));
        assert_eq!(batch.tick_ids(), vec![TickId(0)]);
    }

    #[test]
    fn destroy_is_idempotent() {
        let mut batch = BatchedWorld::new(vec![config(4, 1.0)], &spec()).unwrap();
        batch.destroy();
        batch.destroy();
        let mut out = vec![0.0; 4];
        let mut mask = vec![0; 4];
        assert!(matches!(batch.observe_all(&mut out, &mut mask), Err(BatchError::Destroyed)));
        assert!(matches!(batch.reset_world(0, 1), Err(BatchError::Destroyed)));
    }

    #[test]
    fn reset_world_index_checked() {
        let mut batch = BatchedWorld::new(vec![config(4, 1.0)], &spec()).unwrap();
        assert!(matches!(
            batch.reset_world(1, 0),
            Err(BatchError::InvalidIndex {
                world_index: 1,
                num_worlds: 1
            })
        ));
    }
}
