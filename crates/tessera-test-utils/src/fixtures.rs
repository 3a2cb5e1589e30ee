//! Small propagators with predictable behaviour.
//!
//! - [`ConstPropagator`] fills a field with a constant (Full).
//! - [`IdentityPropagator`] copies one field into another (Full).
//! - [`AddPropagator`] adds a constant to a field (Incremental).
//! - [`FailingPropagator`] fails on chosen ticks.
//! - [`UndeclaredWritePropagator`] and [`SkipFullWritePropagator`] break
//!   the write contract in the two ways the engine detects.

use tessera_core::{FieldId, FieldSet, PropagatorError, TickId};
use tessera_propagator::{Propagator, StepContext, WriteMode};

fn not_writable(field: FieldId) -> PropagatorError {
    PropagatorError::ExecutionFailed {
        reason: format!("field {field} not writable"),
    }
}

/// Writes `value` to every cell of `output`.
#[derive(Debug)]
pub struct ConstPropagator {
    pub name: String,
    pub output: FieldId,
    pub value: f32,
}

impl ConstPropagator {
    pub fn new(name: impl Into<String>, output: FieldId, value: f32) -> Self {
        Self {
            name: name.into(),
            output,
            value,
        }
    }
}

impl Propagator for ConstPropagator {
    fn name(&self) -> &str {
        &self.name
    }

    fn reads(&self) -> FieldSet {
        FieldSet::empty()
    }

    fn writes(&self) -> Vec<(FieldId, WriteMode)> {
        vec![(self.output, WriteMode::Full)]
    }

    fn step(&self, ctx: &mut StepContext<'_>) -> Result<(), PropagatorError> {
        ctx.writes()
            .write(self.output)
            .ok_or_else(|| not_writable(self.output))?
            .fill(self.value);
        Ok(())
    }
}

/// Copies `input` (current-tick view) into `output`.
#[derive(Debug)]
pub struct IdentityPropagator {
    pub name: String,
    pub input: FieldId,
    pub output: FieldId,
}

impl IdentityPropagator {
    pub fn new(name: impl Into<String>, input: FieldId, output: FieldId) -> Self {
        Self {
            name: name.into(),
            input,
            output,
        }
    }
}

impl Propagator for IdentityPropagator {
    fn name(&self) -> &str {
        &self.name
    }

    fn reads(&self) -> FieldSet {
        [self.input].into_iter().collect()
    }

    fn writes(&self) -> Vec<(FieldId, WriteMode)> {
        vec![(self.output, WriteMode::Full)]
    }

    fn step(&self, ctx: &mut StepContext<'_>) -> Result<(), PropagatorError> {
        let input = ctx
            .reads()
            .read(self.input)
            .ok_or_else(|| PropagatorError::ExecutionFailed {
                reason: format!("field {} not readable", self.input),
            })?
            .to_vec();
        let output = ctx
            .writes()
            .write(self.output)
            .ok_or_else(|| not_writable(self.output))?;
        if output.len() != input.len() {
            return Err(PropagatorError::ExecutionFailed {
                reason: format!("length mismatch: {} vs {}", input.len(), output.len()),
            });
        }
        output.copy_from_slice(&input);
        Ok(())
    }
}

/// Adds `delta` to every cell of `output`, keeping what is already there.
#[derive(Debug)]
pub struct AddPropagator {
    pub name: String,
    pub output: FieldId,
    pub delta: f32,
}

impl AddPropagator {
    pub fn new(name: impl Into<String>, output: FieldId, delta: f32) -> Self {
        Self {
            name: name.into(),
            output,
            delta,
        }
    }
}

impl Propagator for AddPropagator {
    fn name(&self) -> &str {
        &self.name
    }

    fn reads(&self) -> FieldSet {
        FieldSet::empty()
    }

    fn writes(&self) -> Vec<(FieldId, WriteMode)> {
        vec![(self.output, WriteMode::Incremental)]
    }

    fn step(&self, ctx: &mut StepContext<'_>) -> Result<(), PropagatorError> {
        let out = ctx
            .writes()
            .write(self.output)
            .ok_or_else(|| not_writable(self.output))?;
        for v in out.iter_mut() {
            *v += self.delta;
        }
        Ok(())
    }
}

/// Fills `output` with the tick number, failing on every tick in
/// `fail_on` (every tick when `None`). Keyed on tick rather than call
/// count so that a retried tick fails again.
#[derive(Debug)]
pub struct FailingPropagator {
    pub name: String,
    pub output: FieldId,
    pub fail_on: Option<Vec<TickId>>,
}

impl FailingPropagator {
    pub fn new(name: impl Into<String>, output: FieldId, fail_on: Vec<TickId>) -> Self {
        Self {
            name: name.into(),
            output,
            fail_on: Some(fail_on),
        }
    }

    pub fn always(name: impl Into<String>, output: FieldId) -> Self {
        Self {
            name: name.into(),
            output,
            fail_on: None,
        }
    }

    fn fails_at(&self, tick: TickId) -> bool {
        self.fail_on.as_ref().is_none_or(|ticks| ticks.contains(&tick))
    }
}

impl Propagator for FailingPropagator {
    fn name(&self) -> &str {
        &self.name
    }

    fn reads(&self) -> FieldSet {
        FieldSet::empty()
    }

    fn writes(&self) -> Vec<(FieldId, WriteMode)> {
        vec![(self.output, WriteMode::Full)]
    }

    fn step(&self, ctx: &mut StepContext<'_>) -> Result<(), PropagatorError> {
        let tick = ctx.tick_id();
        if self.fails_at(tick) {
            return Err(PropagatorError::ExecutionFailed {
                reason: format!("deliberate failure at tick {tick}"),
            });
        }
        ctx.writes()
            .write(self.output)
            .ok_or_else(|| not_writable(self.output))?
            .fill(tick.0 as f32);
        Ok(())
    }
}

/// Declares `declared` but also tries to write `undeclared`.
#[derive(Debug)]
pub struct UndeclaredWritePropagator {
    pub declared: FieldId,
    pub undeclared: FieldId,
}

impl Propagator for UndeclaredWritePropagator {
    fn name(&self) -> &str {
        "undeclared_write"
    }

    fn reads(&self) -> FieldSet {
        FieldSet::empty()
    }

    fn writes(&self) -> Vec<(FieldId, WriteMode)> {
        vec![(self.declared, WriteMode::Full)]
    }

    fn step(&self, ctx: &mut StepContext<'_>) -> Result<(), PropagatorError> {
        if let Some(out) = ctx.writes().write(self.declared) {
            out.fill(1.0);
        }
        if let Some(out) = ctx.writes().write(self.undeclared) {
            out.fill(1.0);
        }
        Ok(())
    }
}

/// Declares a Full write to `output` and never touches it.
#[derive(Debug)]
pub struct SkipFullWritePropagator {
    pub output: FieldId,
}

impl Propagator for SkipFullWritePropagator {
    fn name(&self) -> &str {
        "skip_full_write"
    }

    fn reads(&self) -> FieldSet {
        FieldSet::empty()
    }

    fn writes(&self) -> Vec<(FieldId, WriteMode)> {
        vec![(self.output, WriteMode::Full)]
    }

    fn step(&self, _ctx: &mut StepContext<'_>) -> Result<(), PropagatorError> {
        Ok(())
    }
}
