//! Axis helpers shared by the lattice backends.

use crate::edge::EdgeBehavior;
use crate::error::SpaceError;

/// Map an axis value under `edge`. `None` means the neighbour does not exist.
pub(crate) fn resolve_axis(val: i32, len: u32, edge: EdgeBehavior) -> Option<i32> {
    let n = len as i32;
    if (0..n).contains(&val) {
        return Some(val);
    }
    match edge {
        EdgeBehavior::Absorb => None,
        EdgeBehavior::Clamp => Some(val.clamp(0, n - 1)),
        EdgeBehavior::Wrap => Some(val.rem_euclid(n)),
    }
}

/// Steps between two axis values, taking the short way round when wrapping.
pub(crate) fn axis_distance(a: i32, b: i32, len: u32, edge: EdgeBehavior) -> u32 {
    let diff = a.abs_diff(b);
    match edge {
        EdgeBehavior::Wrap => diff.min(len - diff),
        EdgeBehavior::Absorb | EdgeBehavior::Clamp => diff,
    }
}

/// Reject zero-length axes and axes too long for `i32` coordinates.
pub(crate) fn check_dim(name: &'static str, value: u32) -> Result<(), SpaceError> {
    const MAX: u32 = i32::MAX as u32;
    if value == 0 {
        return Err(SpaceError::EmptySpace);
    }
    if value > MAX {
        return Err(SpaceError::DimensionTooLarge {
            name,
            value,
            max: MAX,
        });
    }
    Ok(())
}

/// Whether `v` is a valid index on an axis of length `len`.
pub(crate) fn in_axis(v: i32, len: u32) -> bool {
    v >= 0 && (v as i64) < len as i64
}
