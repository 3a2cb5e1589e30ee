//! Field and tick identifiers, and [`Coord`].

use smallvec::SmallVec;
use std::fmt;

/// Index of a field in a world's field list.
///
/// Fields are registered on the world configuration and assigned
/// sequential IDs: `FieldId(n)` is the n-th field added.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub u32);

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for FieldId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Number of committed ticks since construction or the last reset.
///
/// Starts at 0 for a fresh or freshly reset world and is incremented
/// once per committed step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TickId(pub u64);

impl TickId {
    /// The tick that follows this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for TickId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TickId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Integer coordinate of a cell, one entry per axis.
///
/// `SmallVec<[i32; 4]>` keeps coordinates of up to four dimensions on the
/// stack, which covers every built-in topology and small product spaces.
pub type Coord = SmallVec<[i32; 4]>;
