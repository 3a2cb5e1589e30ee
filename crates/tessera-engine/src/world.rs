//! A single simulation instance.
//!
//! A [`World`] advances one tick per [`step`](World::step):
//!
//! 1. Commands are validated against the field list and topology. A bad
//!    command rejects the whole call before any propagator runs.
//! 2. Propagators run once each, in registration order. Each sees the
//!    committed state (or an earlier writer's output, for declared
//!    current-tick reads) and writes only its declared outputs.
//! 3. Commands are applied on top of the propagator output, in order.
//! 4. The staged buffers become the new committed state.
//!
//! A failing propagator or a broken write contract rolls the tick back:
//! nothing is committed and the RNG does not advance. Too many rollbacks
//! in a row disable ticking until [`reset`](World::reset).
//!
//! Steps 1 to 3 are [`stage`](World::stage) and step 4 is
//! [`commit`](World::commit), so a batch can stage every world before
//! committing any.

use std::fmt;
use std::time::Instant;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tracing::{debug, info, warn};

use tessera_core::{
    Command, FieldId, FieldMutability, PropagatorError, SnapshotAccess, StepError, TickId,
};
use tessera_propagator::{validate_pipeline, Propagator, ReadResolutionPlan, StepContext};
use tessera_space::{Adjacency, Space};

use crate::config::{ConfigError, ConfigState, WorldConfig};
use crate::metrics::StepMetrics;
use crate::store::{ContractWriter, FieldStore, OverlayReader, PreviousReader};

/// Errors from reading or resetting a world.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum WorldError {
    /// The world has been destroyed.
    #[error("use after destroy")]
    Destroyed,
    /// No such field.
    #[error("unknown field {0}")]
    UnknownField(FieldId),
}

#[derive(Clone, Copy, Debug, Default)]
struct Counters {
    queue_full_rejections: u64,
    tick_disabled_rejections: u64,
    rollback_events: u64,
    tick_disabled_transitions: u64,
}

/// Output of a successful [`World::stage`], waiting to be committed.
///
/// Dropping it, or passing it to [`World::abandon`], discards the tick.
#[must_use = "a staged tick does nothing until committed"]
pub struct StagedTick {
    tick: TickId,
    buffers: Vec<Option<Vec<f32>>>,
    rng: ChaCha8Rng,
    started: Instant,
    command_processing_us: u64,
    propagator_us: Vec<(String, u64)>,
    commands_applied: usize,
}

impl StagedTick {
    /// The tick this will become once committed.
    pub fn tick_id(&self) -> TickId {
        self.tick
    }
}

impl fmt::Debug for StagedTick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedTick")
            .field("tick", &self.tick)
            .field("commands_applied", &self.commands_applied)
            .finish_non_exhaustive()
    }
}

/// One simulation instance.
pub struct World {
    space: Box<dyn Space>,
    adjacency: Adjacency,
    propagators: Vec<Box<dyn Propagator>>,
    plan: ReadResolutionPlan,
    store: FieldStore,
    dt: f64,
    seed: u64,
    rng: ChaCha8Rng,
    tick: TickId,
    max_consecutive_rollbacks: u32,
    max_commands_per_tick: Option<usize>,
    consecutive_rollbacks: u32,
    tick_disabled: bool,
    counters: Counters,
    last_metrics: StepMetrics,
    destroyed: bool,
}

impl World {
    /// Build a world from `config`.
    pub fn new(mut config: WorldConfig) -> Result<Self, ConfigError> {
        config.build()
    }

    pub(crate) fn from_state(state: ConfigState) -> Result<Self, ConfigError> {
        let space = state.check()?;
        let plan = validate_pipeline(&state.propagators, &state.fields, space, state.dt)?;
        let adjacency = Adjacency::build(space)?;
        let cell_count = space.cell_count();
        let ConfigState {
            space,
            fields,
            initial,
            propagators,
            dt,
            seed,
            max_consecutive_rollbacks,
            max_commands_per_tick,
            ..
        } = state;
        let space = space.ok_or(ConfigError::NoSpace)?;
        info!(
            cells = cell_count,
            fields = fields.len(),
            propagators = propagators.len(),
            dt,
            seed,
            "world created"
        );
        Ok(Self {
            space,
            adjacency,
            propagators,
            plan,
            store: FieldStore::new(fields, cell_count, initial),
            dt,
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            tick: TickId(0),
            max_consecutive_rollbacks,
            max_commands_per_tick,
            consecutive_rollbacks: 0,
            tick_disabled: false,
            counters: Counters::default(),
            last_metrics: StepMetrics::default(),
            destroyed: false,
        })
    }

    /// Advance one tick, applying `commands` after the propagators.
    pub fn step(&mut self, commands: &[Command]) -> Result<StepMetrics, StepError> {
        let staged = self.stage(commands)?;
        Ok(self.commit(staged))
    }

    /// Run a tick without committing it.
    ///
    /// On failure the world is unchanged apart from its rollback
    /// bookkeeping.
    pub fn stage(&mut self, commands: &[Command]) -> Result<StagedTick, StepError> {
        if self.destroyed {
            return Err(StepError::Destroyed);
        }
        if self.tick_disabled {
            self.counters.tick_disabled_rejections += 1;
            self.refresh_counters();
            return Err(StepError::TickDisabled {
                consecutive_rollbacks: self.consecutive_rollbacks,
            });
        }
        let started = Instant::now();

        let cmd_start = Instant::now();
        let commands = match self.max_commands_per_tick {
            Some(limit) if commands.len() > limit => {
                let dropped = commands.len() - limit;
                self.counters.queue_full_rejections += dropped as u64;
                debug!(dropped, limit, "commands over per-tick limit dropped");
                &commands[..limit]
            }
            _ => commands,
        };
        let targets = self.resolve_commands(commands)?;
        let mut command_processing_us = cmd_start.elapsed().as_micros() as u64;

        let next = self.tick.next();
        let mut rng = self.rng.clone();
        let mut buffers: Vec<Option<Vec<f32>>> = vec![None; self.store.len()];
        let mut propagator_us = Vec::with_capacity(self.propagators.len());
        let mut failure = None;
        for (i, prop) in self.propagators.iter().enumerate() {
            let prop_start = Instant::now();
            let (Some(routes), Some(modes)) =
                (self.plan.routes_for(i), self.plan.write_modes_for(i))
            else {
                continue;
            };
            let overlay = OverlayReader::new(&self.store, &buffers, routes);
            let previous = PreviousReader::new(&self.store, prop.reads_previous());
            let mut writer = ContractWriter::new(modes, &self.store, &buffers);
            let result = {
                let mut ctx = StepContext::new(
                    &overlay,
                    &previous,
                    &mut writer,
                    self.space.as_ref(),
                    &self.adjacency,
                    &mut rng,
                    next,
                    self.dt,
                );
                prop.step(&mut ctx)
            };
            if let Err(e) = check_output(prop.name(), result, &writer, &self.store) {
                failure = Some(e);
                break;
            }
            writer.stage_into(&mut buffers);
            propagator_us.push((prop.name().to_string(), prop_start.elapsed().as_micros() as u64));
        }
        if let Some(error) = failure {
            return Err(self.rollback(error));
        }

        let apply_start = Instant::now();
        let committed = &self.store;
        for (cmd, &(rank, components)) in commands.iter().zip(&targets) {
            let buf = buffers[cmd.field_id.0 as usize].get_or_insert_with(|| {
                committed
                    .current(cmd.field_id)
                    .unwrap_or_default()
                    .to_vec()
            });
            buf[rank * components] = cmd.value;
        }
        command_processing_us += apply_start.elapsed().as_micros() as u64;

        Ok(StagedTick {
            tick: next,
            buffers,
            rng,
            started,
            command_processing_us,
            propagator_us,
            commands_applied: commands.len(),
        })
    }

    /// Make a staged tick the current state.
    pub fn commit(&mut self, staged: StagedTick) -> StepMetrics {
        debug_assert_eq!(staged.tick, self.tick.next(), "staged tick belongs to another state");
        self.store.commit(staged.buffers, staged.tick);
        self.rng = staged.rng;
        self.tick = staged.tick;
        self.consecutive_rollbacks = 0;

        let metrics = StepMetrics {
            total_us: staged.started.elapsed().as_micros() as u64,
            command_processing_us: staged.command_processing_us,
            propagator_us: staged.propagator_us,
            commands_applied: staged.commands_applied,
            ..StepMetrics::default()
        };
        self.last_metrics = metrics;
        self.refresh_counters();
        self.last_metrics.clone()
    }

    /// Discard a staged tick. The world stays where it was.
    pub fn abandon(&mut self, staged: StagedTick) {
        debug!(tick = %staged.tick, "staged tick abandoned");
    }

    /// Return to tick 0 with `seed`: buffers zeroed (Static initializers
    /// reapplied), RNG reseeded, rollback state cleared. Topology and
    /// propagators are kept.
    pub fn reset(&mut self, seed: u64) -> Result<(), WorldError> {
        if self.destroyed {
            return Err(WorldError::Destroyed);
        }
        self.store.reinitialize();
        self.seed = seed;
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self.tick = TickId(0);
        self.consecutive_rollbacks = 0;
        self.tick_disabled = false;
        debug!(seed, "world reset");
        Ok(())
    }

    /// Committed contents of `field`.
    pub fn read(&self, field: FieldId) -> Result<&[f32], WorldError> {
        if self.destroyed {
            return Err(WorldError::Destroyed);
        }
        self.store.current(field).ok_or(WorldError::UnknownField(field))
    }

    /// Contents of `field` as of the tick before the current one.
    pub fn read_previous(&self, field: FieldId) -> Result<&[f32], WorldError> {
        if self.destroyed {
            return Err(WorldError::Destroyed);
        }
        self.store.previous(field).ok_or(WorldError::UnknownField(field))
    }

    /// Tick at which `field` was last written (0 if never).
    pub fn last_write_tick(&self, field: FieldId) -> Result<TickId, WorldError> {
        if self.destroyed {
            return Err(WorldError::Destroyed);
        }
        self.store.last_write(field).ok_or(WorldError::UnknownField(field))
    }

    /// Release all buffers. Idempotent; every other call fails afterwards.
    pub fn destroy(&mut self) {
        if !self.destroyed {
            self.destroyed = true;
            self.store.release();
            debug!(tick = %self.tick, "world destroyed");
        }
    }

    /// Whether [`destroy`](Self::destroy) has been called.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// The topology.
    pub fn space(&self) -> &dyn Space {
        self.space.as_ref()
    }

    /// Neighbour tables of the topology.
    pub fn adjacency(&self) -> &Adjacency {
        &self.adjacency
    }

    /// Registered field declarations, indexed by [`FieldId`].
    pub fn field_defs(&self) -> &[tessera_core::FieldDef] {
        self.store.defs()
    }

    /// Last committed tick.
    pub fn current_tick(&self) -> TickId {
        self.tick
    }

    /// Seed of the last construction or reset.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Timestep.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Whether ticking is disabled by consecutive rollbacks.
    pub fn is_tick_disabled(&self) -> bool {
        self.tick_disabled
    }

    /// Rollbacks since the last committed tick.
    pub fn consecutive_rollbacks(&self) -> u32 {
        self.consecutive_rollbacks
    }

    /// Metrics of the last committed tick, with up-to-date counters.
    pub fn last_metrics(&self) -> &StepMetrics {
        &self.last_metrics
    }

    /// `(rank, components)` for each command, or the first bad one.
    fn resolve_commands(&self, commands: &[Command]) -> Result<Vec<(usize, usize)>, StepError> {
        commands
            .iter()
            .enumerate()
            .map(|(index, cmd)| {
                let reject = |reason: String| StepError::InvalidCommand { index, reason };
                let def = self
                    .store
                    .def(cmd.field_id)
                    .ok_or_else(|| reject(format!("field {} does not exist", cmd.field_id)))?;
                if def.mutability == FieldMutability::Static {
                    return Err(reject(format!("field '{}' is Static", def.name)));
                }
                if !cmd.value.is_finite() {
                    return Err(reject(format!("value {} is not finite", cmd.value)));
                }
                let rank = self
                    .adjacency
                    .rank_of(&cmd.coord)
                    .ok_or_else(|| {
                        reject(format!("coordinate {:?} is not a cell", cmd.coord.as_slice()))
                    })?;
                Ok((rank, def.field_type.components()))
            })
            .collect()
    }

    fn rollback(&mut self, error: StepError) -> StepError {
        self.consecutive_rollbacks += 1;
        self.counters.rollback_events += 1;
        debug!(
            tick = %self.tick.next(),
            consecutive = self.consecutive_rollbacks,
            %error,
            "tick rolled back"
        );
        if self.consecutive_rollbacks >= self.max_consecutive_rollbacks {
            self.tick_disabled = true;
            self.counters.tick_disabled_transitions += 1;
            warn!(
                consecutive = self.consecutive_rollbacks,
                "ticking disabled after consecutive rollbacks"
            );
        }
        self.refresh_counters();
        error
    }

    fn refresh_counters(&mut self) {
        let c = self.counters;
        let m = &mut self.last_metrics;
        m.queue_full_rejections = c.queue_full_rejections;
        m.tick_disabled_rejections = c.tick_disabled_rejections;
        m.rollback_events = c.rollback_events;
        m.tick_disabled_transitions = c.tick_disabled_transitions;
        m.worker_stall_events = 0;
    }
}

/// Turn a propagator's result and its writer's record into a verdict.
fn check_output(
    name: &str,
    result: Result<(), PropagatorError>,
    writer: &ContractWriter,
    store: &FieldStore,
) -> Result<(), StepError> {
    result.map_err(|reason| StepError::PropagatorFailed {
        name: name.to_string(),
        reason,
    })?;
    if let Some(field) = writer.undeclared() {
        return Err(StepError::ContractViolation {
            propagator: name.to_string(),
            reason: format!("wrote undeclared field {field}"),
        });
    }
    if let Some(field) = writer.untouched_full() {
        return Err(StepError::ContractViolation {
            propagator: name.to_string(),
            reason: format!("did not write its Full output {field}"),
        });
    }
    if let Some((field_id, element)) = writer.first_nan() {
        let components = store.def(field_id).map_or(1, |d| d.field_type.components());
        return Err(StepError::PropagatorFailed {
            name: name.to_string(),
            reason: PropagatorError::NanDetected {
                field_id,
                cell_index: Some(element / components),
            },
        });
    }
    Ok(())
}

impl SnapshotAccess for World {
    fn read_field(&self, field: FieldId) -> Option<&[f32]> {
        if self.destroyed {
            return None;
        }
        self.store.current(field)
    }

    fn tick_id(&self) -> TickId {
        self.tick
    }

    fn last_write_tick(&self, field: FieldId) -> Option<TickId> {
        self.store.last_write(field)
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("tick", &self.tick)
            .field("cells", &self.adjacency.cell_count())
            .field("fields", &self.store.len())
            .field("propagators", &self.propagators.len())
            .field("seed", &self.seed)
            .field("tick_disabled", &self.tick_disabled)
            .field("destroyed", &self.destroyed)
            .finish()
    }
}
