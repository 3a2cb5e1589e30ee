//! Topological edge behavior for lattice backends.

/// How a lattice treats neighbours that fall off its edge.
///
/// Distinct from [`tessera_core::BoundaryBehavior`], which governs field
/// values. `EdgeBehavior` decides which cells are adjacent.
///
/// # Examples
///
/// ```
/// use tessera_space::{EdgeBehavior, Space, Square4};
///
/// let absorb = Square4::new(4, 4, EdgeBehavior::Absorb).unwrap();
/// let corner: tessera_core::Coord = vec![0i32, 0].into();
/// assert_eq!(absorb.neighbours(&corner).len(), 2);
///
/// let wrap = Square4::new(4, 4, EdgeBehavior::Wrap).unwrap();
/// assert_eq!(wrap.neighbours(&corner).len(), 4);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EdgeBehavior {
    /// The off-edge neighbour is the boundary cell itself (a self-loop).
    Clamp,
    /// The off-edge neighbour wraps to the opposite side.
    Wrap,
    /// The off-edge neighbour does not exist.
    Absorb,
}
