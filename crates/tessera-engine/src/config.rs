//! One-shot world builder and its error type.
//!
//! [`WorldConfig`] collects a topology, field declarations, propagators and
//! scalar settings. Building a [`World`] from it consumes the collected
//! state: afterwards, and after [`dispose`](WorldConfig::dispose), every
//! method fails with [`ConfigError::Consumed`].

use std::fmt;

use thiserror::Error;
use tracing::debug;

use tessera_core::{FieldDef, FieldId, FieldMutability, FieldSet, FieldType, PropagatorError};
use tessera_propagator::pipeline::validate_timestep;
use tessera_propagator::{FnPropagator, PipelineError, Propagator, StepContext, WriteMode};
use tessera_space::{Space, SpaceError, SpaceKind};

use crate::world::World;

/// Rollbacks in a row before ticking is disabled, unless configured.
pub const DEFAULT_MAX_CONSECUTIVE_ROLLBACKS: u32 = 3;

/// Errors from [`WorldConfig`] and world construction.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config already produced a world or was disposed.
    #[error("configuration already consumed or disposed")]
    Consumed,
    /// No topology was set.
    #[error("no space set")]
    NoSpace,
    /// No fields were registered.
    #[error("no fields registered")]
    NoFields,
    /// The topology parameters are malformed.
    #[error("invalid space: {0}")]
    Space(#[from] SpaceError),
    /// `dt` is NaN, infinite, zero or negative.
    #[error("dt must be finite and positive, got {value}")]
    InvalidDt {
        /// The rejected value.
        value: f64,
    },
    /// A field declaration or initializer is malformed.
    #[error("invalid field: {reason}")]
    InvalidField {
        /// What is wrong with it.
        reason: String,
    },
    /// The propagator pipeline failed validation.
    #[error("pipeline validation failed: {0}")]
    Pipeline(#[from] PipelineError),
    /// A propagator could not be constructed.
    #[error("propagator construction failed: {0}")]
    Propagator(String),
    /// `max_consecutive_rollbacks` must be at least 1.
    #[error("max_consecutive_rollbacks must be at least 1")]
    InvalidRollbackLimit,
}

impl From<String> for ConfigError {
    fn from(reason: String) -> Self {
        Self::Propagator(reason)
    }
}

/// Everything a world is built from.
pub(crate) struct ConfigState {
    pub(crate) space: Option<Box<dyn Space>>,
    pub(crate) fields: Vec<FieldDef>,
    pub(crate) initial: Vec<(FieldId, Vec<f32>)>,
    pub(crate) propagators: Vec<Box<dyn Propagator>>,
    pub(crate) dt: f64,
    pub(crate) seed: u64,
    pub(crate) max_consecutive_rollbacks: u32,
    pub(crate) max_commands_per_tick: Option<usize>,
}

impl Default for ConfigState {
    fn default() -> Self {
        Self {
            space: None,
            fields: Vec::new(),
            initial: Vec::new(),
            propagators: Vec::new(),
            dt: 1.0,
            seed: 0,
            max_consecutive_rollbacks: DEFAULT_MAX_CONSECUTIVE_ROLLBACKS,
            max_commands_per_tick: None,
        }
    }
}

impl ConfigState {
    /// Check every registered propagator against `space` at `dt`.
    fn check_timesteps(&self, space: &dyn Space, dt: f64) -> Result<(), ConfigError> {
        for prop in &self.propagators {
            validate_timestep(prop.as_ref(), space, dt)?;
        }
        Ok(())
    }

    /// Structural checks that do not need the pipeline validator.
    pub(crate) fn check(&self) -> Result<&dyn Space, ConfigError> {
        let space = self.space.as_deref().ok_or(ConfigError::NoSpace)?;
        if self.fields.is_empty() {
            return Err(ConfigError::NoFields);
        }
        for (field, values) in &self.initial {
            let def = &self.fields[field.0 as usize];
            let expected = def.buffer_len(space.cell_count());
            if values.len() != expected {
                return Err(ConfigError::InvalidField {
                    reason: format!(
                        "initial values for '{}' have {} elements, expected {expected}",
                        def.name,
                        values.len()
                    ),
                });
            }
        }
        Ok(space)
    }
}

/// Builder for a [`World`].
///
/// ```
/// use tessera_core::{FieldDef, FieldMutability};
/// use tessera_engine::WorldConfig;
/// use tessera_space::{EdgeBehavior, SpaceKind};
/// use tessera_test_utils::ConstPropagator;
///
/// let mut cfg = WorldConfig::new();
/// cfg.set_space(SpaceKind::Line1D { len: 10, edge: EdgeBehavior::Absorb })?;
/// let heat = cfg.add_field(FieldDef::scalar("heat", FieldMutability::PerTick))?;
/// cfg.add_propagator(ConstPropagator::new("fill", heat, 7.0))?;
/// let mut world = cfg.build()?;
///
/// world.step(&[])?;
/// assert_eq!(world.read(heat)?, &[7.0; 10]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Default)]
pub struct WorldConfig {
    state: Option<ConfigState>,
}

impl WorldConfig {
    /// An empty configuration with default `dt` (1.0) and seed (0).
    pub fn new() -> Self {
        Self {
            state: Some(ConfigState::default()),
        }
    }

    fn state(&mut self) -> Result<&mut ConfigState, ConfigError> {
        self.state.as_mut().ok_or(ConfigError::Consumed)
    }

    /// Whether the config can still be used.
    pub fn is_consumed(&self) -> bool {
        self.state.is_none()
    }

    /// Set the topology from a descriptor.
    pub fn set_space(&mut self, kind: SpaceKind) -> Result<&mut Self, ConfigError> {
        self.state()?;
        let space = kind.build()?;
        self.set_custom_space(space)
    }

    /// Set an already-constructed topology.
    ///
    /// Propagators registered earlier are checked against it at the
    /// current `dt`; on failure the previous topology stays in place.
    pub fn set_custom_space(&mut self, space: Box<dyn Space>) -> Result<&mut Self, ConfigError> {
        let state = self.state()?;
        state.check_timesteps(space.as_ref(), state.dt)?;
        state.space = Some(space);
        Ok(self)
    }

    /// Register a field. IDs are handed out in registration order.
    pub fn add_field(&mut self, def: FieldDef) -> Result<FieldId, ConfigError> {
        let state = self.state()?;
        check_field(&def)?;
        let id = FieldId(state.fields.len() as u32);
        state.fields.push(def);
        Ok(id)
    }

    /// Set the timestep.
    ///
    /// With a space set, every registered propagator is checked at the new
    /// `dt`; on failure the previous `dt` stays in place.
    pub fn set_dt(&mut self, dt: f64) -> Result<&mut Self, ConfigError> {
        let state = self.state()?;
        if !dt.is_finite() || dt <= 0.0 {
            return Err(ConfigError::InvalidDt { value: dt });
        }
        if let Some(space) = state.space.as_deref() {
            state.check_timesteps(space, dt)?;
        }
        state.dt = dt;
        Ok(self)
    }

    /// Set the RNG seed.
    pub fn set_seed(&mut self, seed: u64) -> Result<&mut Self, ConfigError> {
        self.state()?.seed = seed;
        Ok(self)
    }

    /// Register a closure-backed propagator.
    pub fn register_propagator<F>(
        &mut self,
        name: impl Into<String>,
        reads: FieldSet,
        reads_previous: FieldSet,
        writes: Vec<(FieldId, WriteMode)>,
        update: F,
    ) -> Result<&mut Self, ConfigError>
    where
        F: Fn(&mut StepContext<'_>) -> Result<(), PropagatorError> + Send + Sync + 'static,
    {
        self.add_propagator(FnPropagator::new(name, reads, reads_previous, writes, update))
    }

    /// Register a propagator. Pipeline order is registration order.
    ///
    /// When a space is set, the propagator's timestep limit and own
    /// validation run now at the current `dt` (1.0 unless set), so an
    /// unstable configuration fails here rather than at
    /// [`build`](Self::build).
    pub fn add_propagator(&mut self, prop: impl Propagator) -> Result<&mut Self, ConfigError> {
        let state = self.state()?;
        if let Some(space) = state.space.as_deref() {
            validate_timestep(&prop, space, state.dt)?;
        }
        state.propagators.push(Box::new(prop));
        Ok(self)
    }

    /// Rollbacks in a row before ticking is disabled.
    pub fn set_max_consecutive_rollbacks(&mut self, limit: u32) -> Result<&mut Self, ConfigError> {
        let state = self.state()?;
        if limit == 0 {
            return Err(ConfigError::InvalidRollbackLimit);
        }
        state.max_consecutive_rollbacks = limit;
        Ok(self)
    }

    /// Drop commands beyond `limit` in a single step.
    pub fn set_max_commands_per_tick(&mut self, limit: usize) -> Result<&mut Self, ConfigError> {
        self.state()?.max_commands_per_tick = Some(limit);
        Ok(self)
    }

    /// Initial contents for a Static field, reapplied on every reset.
    pub fn set_initial(
        &mut self,
        field: FieldId,
        values: Vec<f32>,
    ) -> Result<&mut Self, ConfigError> {
        let state = self.state()?;
        let def = state
            .fields
            .get(field.0 as usize)
            .ok_or_else(|| ConfigError::InvalidField {
                reason: format!("field {field} is not registered"),
            })?;
        if def.mutability != FieldMutability::Static {
            return Err(ConfigError::InvalidField {
                reason: format!(
                    "'{}' is not Static; only Static fields take initial values",
                    def.name
                ),
            });
        }
        state.initial.retain(|(f, _)| *f != field);
        state.initial.push((field, values));
        Ok(self)
    }

    /// Release the config without building. Idempotent.
    pub fn dispose(&mut self) {
        if self.state.take().is_some() {
            debug!("world config disposed");
        }
    }

    /// Build a world, consuming the collected state.
    ///
    /// The state is consumed even if validation fails.
    pub fn build(&mut self) -> Result<World, ConfigError> {
        let state = self.state.take().ok_or(ConfigError::Consumed)?;
        World::from_state(state)
    }
}

impl fmt::Debug for WorldConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            None => f.write_str("WorldConfig(consumed)"),
            Some(s) => f
                .debug_struct("WorldConfig")
                .field("has_space", &s.space.is_some())
                .field("fields", &s.fields.len())
                .field("propagators", &s.propagators.len())
                .field("dt", &s.dt)
                .field("seed", &s.seed)
                .finish(),
        }
    }
}

fn check_field(def: &FieldDef) -> Result<(), ConfigError> {
    let invalid = |reason: String| Err(ConfigError::InvalidField { reason });
    match def.field_type {
        FieldType::Vector { dims: 0 } => {
            return invalid(format!("'{}': vector field needs at least one component", def.name))
        }
        FieldType::Categorical { n_values: 0 } => {
            return invalid(format!("'{}': categorical field needs at least one value", def.name))
        }
        _ => {}
    }
    if let Some((lo, hi)) = def.bounds {
        if !lo.is_finite() || !hi.is_finite() || lo > hi {
            return invalid(format!(
                "'{}': bounds ({lo}, {hi}) are not an ordered finite range",
                def.name
            ));
        }
    }
    Ok(())
}
