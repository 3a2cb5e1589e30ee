//! Carries a field forward one tick unchanged.
//!
//! Useful for fields no other propagator writes but that must appear in
//! a pipeline's write set, for example agent positions that only change
//! through commands.

use crate::{unreadable, unwritable};
use tessera_core::{FieldId, FieldSet, PropagatorError};
use tessera_propagator::{Propagator, StepContext, WriteMode};

/// Copies a field's previous-tick buffer into its current-tick buffer.
///
/// ```
/// use tessera_core::FieldId;
/// use tessera_propagator::Propagator;
/// use tessera_propagators::IdentityCopy;
///
/// let prop = IdentityCopy::new(FieldId(5));
/// assert!(prop.reads_previous().contains(FieldId(5)));
/// ```
#[derive(Clone, Copy, Debug)]
pub struct IdentityCopy {
    field: FieldId,
}

impl IdentityCopy {
    /// Copy `field` forward each tick.
    pub fn new(field: FieldId) -> Self {
        Self { field }
    }
}

impl Propagator for IdentityCopy {
    fn name(&self) -> &str {
        "IdentityCopy"
    }

    fn reads(&self) -> FieldSet {
        FieldSet::empty()
    }

    fn reads_previous(&self) -> FieldSet {
        [self.field].into_iter().collect()
    }

    fn writes(&self) -> Vec<(FieldId, WriteMode)> {
        vec![(self.field, WriteMode::Full)]
    }

    fn step(&self, ctx: &mut StepContext<'_>) -> Result<(), PropagatorError> {
        let prev = ctx
            .reads_previous()
            .read(self.field)
            .ok_or_else(|| unreadable(self.field))?
            .to_vec();
        let out = ctx.writes().write(self.field).ok_or_else(|| unwritable(self.field))?;
        if out.len() != prev.len() {
            return Err(PropagatorError::ExecutionFailed {
                reason: format!("length mismatch: {} vs {}", prev.len(), out.len()),
            });
        }
        out.copy_from_slice(&prev);
        Ok(())
    }
}
