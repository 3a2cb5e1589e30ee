//! Field access traits.

use crate::id::{FieldId, TickId};

/// Read-only access to field buffers.
///
/// Returns `None` when the field does not exist or is not readable in the
/// current context (for a propagator, when it is outside the declared
/// read set).
pub trait FieldReader {
    /// Flat `f32` buffer of a field.
    fn read(&self, field: FieldId) -> Option<&[f32]>;
}

/// Mutable access to the buffers a propagator declared as outputs.
///
/// Returns `None` for any field outside the declared write set.
pub trait FieldWriter {
    /// Mutable flat `f32` buffer of a field.
    fn write(&mut self, field: FieldId) -> Option<&mut [f32]>;
}

/// Read-only view of a world's committed state, as seen by observation.
pub trait SnapshotAccess {
    /// Committed buffer of a field.
    fn read_field(&self, field: FieldId) -> Option<&[f32]>;

    /// Tick at which this state was committed.
    fn tick_id(&self) -> TickId;

    /// Tick at which a field was last written by a propagator or command.
    ///
    /// Static fields and never-written fields report the tick of the last
    /// reset (tick 0).
    fn last_write_tick(&self, field: FieldId) -> Option<TickId>;
}
