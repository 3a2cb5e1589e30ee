//! Errors from space construction and spatial queries.

use tessera_core::Coord;
use thiserror::Error;

/// Errors from building a topology or resolving coordinates against it.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SpaceError {
    /// A coordinate lies outside the space.
    #[error("coordinate {coord:?} out of bounds: {bounds}")]
    CoordOutOfBounds {
        /// The offending coordinate.
        coord: Coord,
        /// Description of the valid range.
        bounds: String,
    },
    /// A region cannot be compiled against this space.
    #[error("invalid region: {reason}")]
    InvalidRegion {
        /// What is wrong with it.
        reason: String,
    },
    /// A dimension of zero was requested.
    #[error("space must have at least one cell")]
    EmptySpace,
    /// A dimension does not fit the `i32` coordinate type.
    #[error("{name} = {value} exceeds maximum {max}")]
    DimensionTooLarge {
        /// Which parameter.
        name: &'static str,
        /// Requested value.
        value: u32,
        /// Largest accepted value.
        max: u32,
    },
    /// Parameters are individually valid but do not compose.
    #[error("invalid composition: {reason}")]
    InvalidComposition {
        /// Why.
        reason: String,
    },
}
