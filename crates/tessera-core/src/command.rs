//! Commands: explicit post-propagator field mutations.

use crate::id::{Coord, FieldId};

/// Set one cell of one field to a value.
///
/// Commands are applied after every propagator has run for the tick, in
/// the order they were submitted. They are therefore invisible to the
/// propagators of the tick they arrive in and show up in the next tick's
/// reads.
///
/// # Examples
///
/// ```
/// use tessera_core::{Command, FieldId};
///
/// let cmd = Command::set(FieldId(0), [3, 4], 1.5);
/// assert_eq!(cmd.coord.as_slice(), &[3, 4]);
/// assert_eq!(cmd.value, 1.5);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Command {
    /// Target field.
    pub field_id: FieldId,
    /// Target cell, in the topology's coordinate system.
    pub coord: Coord,
    /// New value for the cell (first component for vector fields).
    pub value: f32,
}

impl Command {
    /// Build a set-cell command from any coordinate-like sequence.
    pub fn set(field_id: FieldId, coord: impl AsRef<[i32]>, value: f32) -> Self {
        Self {
            field_id,
            coord: Coord::from_slice(coord.as_ref()),
            value,
        }
    }
}
