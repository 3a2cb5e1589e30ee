//! The [`Propagator`] trait and [`WriteMode`].

use crate::context::StepContext;
use tessera_core::{FieldId, FieldSet, PropagatorError};
use tessera_space::Space;

/// How a propagator's output buffer is initialised before `step`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteMode {
    /// Zeroed buffer; the propagator is the field's only writer this tick
    /// and must fill every cell.
    Full,
    /// Buffer seeded with the field's latest value (the previous tick, or
    /// an earlier Incremental writer this tick). Several propagators may
    /// contribute to the same field in this mode.
    Incremental,
}

/// A per-tick update unit.
///
/// # Contract
///
/// - `step` is deterministic: equal inputs (including the RNG state in the
///   context) give equal outputs.
/// - `step` takes `&self`; persistent state lives in fields.
/// - `reads`, `reads_previous`, `writes` and `max_dt` are queried once when
///   the world is built.
/// - A propagator that touches a field outside `writes`, or that never
///   requests a buffer it declared as [`WriteMode::Full`], breaks the
///   contract and its tick is rolled back.
///
/// # Examples
///
/// ```
/// use tessera_core::{FieldId, FieldSet, PropagatorError};
/// use tessera_propagator::{Propagator, StepContext, WriteMode};
///
/// struct Fill(FieldId, f32);
///
/// impl Propagator for Fill {
///     fn name(&self) -> &str { "fill" }
///     fn reads(&self) -> FieldSet { FieldSet::empty() }
///     fn writes(&self) -> Vec<(FieldId, WriteMode)> { vec![(self.0, WriteMode::Full)] }
///     fn step(&self, ctx: &mut StepContext<'_>) -> Result<(), PropagatorError> {
///         let out = ctx.writes().write(self.0).ok_or_else(|| PropagatorError::ExecutionFailed {
///             reason: "output not writable".into(),
///         })?;
///         out.fill(self.1);
///         Ok(())
///     }
/// }
///
/// assert_eq!(Fill(FieldId(0), 7.0).name(), "fill");
/// ```
pub trait Propagator: Send + Sync + 'static {
    /// Name used in errors, logs and metrics.
    fn name(&self) -> &str;

    /// Fields read through `ctx.reads()`: the current tick's view, which
    /// includes writes by earlier propagators in the pipeline.
    fn reads(&self) -> FieldSet;

    /// Fields read through `ctx.reads_previous()`: the state as committed
    /// at the end of the previous tick, unaffected by pipeline order.
    fn reads_previous(&self) -> FieldSet {
        FieldSet::empty()
    }

    /// Output fields and how each buffer is initialised.
    fn writes(&self) -> Vec<(FieldId, WriteMode)>;

    /// Largest timestep this propagator tolerates on `space`, if any.
    fn max_dt(&self, _space: &dyn Space) -> Option<f64> {
        None
    }

    /// Extra configuration checks against the world's space and timestep.
    ///
    /// Runs when the world is built and, when both are known, when the
    /// propagator is registered.
    fn validate(&self, _space: &dyn Space, _dt: f64) -> Result<(), String> {
        Ok(())
    }

    /// Advance by one tick.
    fn step(&self, ctx: &mut StepContext<'_>) -> Result<(), PropagatorError>;
}
