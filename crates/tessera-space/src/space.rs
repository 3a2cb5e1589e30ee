//! The [`Space`] trait and `dyn Space` downcasting.

use smallvec::SmallVec;
use std::any::Any;
use tessera_core::Coord;

/// A discrete spatial topology.
///
/// Backends define which coordinates exist, how they are ranked, and who
/// neighbours whom. Everything downstream (field storage, commands,
/// adjacency tables, observation plans) addresses cells by the rank
/// returned from [`canonical_rank`](Self::canonical_rank), so the ordering
/// must be a pure function of the construction parameters.
///
/// `Sync` is required so a world can be stepped on a worker thread while
/// observation plans hold shared references.
pub trait Space: Any + Send + Sync + 'static {
    /// Number of coordinate components.
    fn ndim(&self) -> usize;

    /// Total number of cells.
    fn cell_count(&self) -> usize;

    /// Neighbours of an in-bounds cell, in a deterministic backend order.
    ///
    /// Clamped edges may yield the cell itself; wrapped edges on very short
    /// axes may yield the same neighbour twice.
    fn neighbours(&self, coord: &Coord) -> SmallVec<[Coord; 8]>;

    /// Neighbour count of an interior cell, the largest degree any cell
    /// can have.
    fn max_degree(&self) -> usize;

    /// Graph-geodesic distance between two cells.
    fn distance(&self, a: &Coord, b: &Coord) -> f64;

    /// Every cell in canonical rank order.
    fn canonical_ordering(&self) -> Vec<Coord>;

    /// Rank of `coord`, or `None` if it is not a cell of this space.
    fn canonical_rank(&self, coord: &[i32]) -> Option<usize>;

    /// Row-major shape whose enumeration matches the canonical order, when
    /// the cells form a dense box. `None` for sparse lattices.
    fn grid_shape(&self) -> Option<Vec<usize>> {
        None
    }

    /// Period of each coordinate axis: `Some(len)` where the axis wraps,
    /// `None` where it is bounded.
    fn axis_periods(&self) -> Vec<Option<u32>> {
        vec![None; self.ndim()]
    }

    /// Whether `other` is the same kind of space with the same parameters.
    ///
    /// Worlds whose spaces compare equal here can share one compiled
    /// observation plan.
    fn topology_eq(&self, other: &dyn Space) -> bool;
}

impl dyn Space {
    /// Downcast to a concrete backend.
    pub fn downcast_ref<T: Space>(&self) -> Option<&T> {
        (self as &dyn Any).downcast_ref::<T>()
    }
}
