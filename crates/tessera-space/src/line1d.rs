//! One-dimensional line of cells.

use crate::edge::EdgeBehavior;
use crate::error::SpaceError;
use crate::grid;
use crate::space::Space;
use smallvec::{smallvec, SmallVec};
use tessera_core::Coord;

/// A line of `len` cells with coordinates `[i]`, `0 <= i < len`.
///
/// Interior cells have two neighbours. What happens at the ends depends on
/// the [`EdgeBehavior`].
///
/// # Examples
///
/// ```
/// use tessera_space::{EdgeBehavior, Line1D, Space};
///
/// let line = Line1D::new(10, EdgeBehavior::Absorb).unwrap();
/// assert_eq!(line.cell_count(), 10);
/// assert_eq!(line.neighbours(&vec![0i32].into()).len(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct Line1D {
    len: u32,
    edge: EdgeBehavior,
}

impl Line1D {
    /// Build a line of `len` cells.
    pub fn new(len: u32, edge: EdgeBehavior) -> Result<Self, SpaceError> {
        grid::check_dim("len", len)?;
        Ok(Self { len, edge })
    }

    /// Number of cells.
    pub fn len(&self) -> u32 {
        self.len
    }

    /// Always `false`; empty lines are rejected at construction.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Edge behavior.
    pub fn edge_behavior(&self) -> EdgeBehavior {
        self.edge
    }
}

impl Space for Line1D {
    fn ndim(&self) -> usize {
        1
    }

    fn cell_count(&self) -> usize {
        self.len as usize
    }

    fn neighbours(&self, coord: &Coord) -> SmallVec<[Coord; 8]> {
        let i = coord[0];
        [i - 1, i + 1]
            .into_iter()
            .filter_map(|n| grid::resolve_axis(n, self.len, self.edge))
            .map(|n| smallvec![n])
            .collect()
    }

    fn max_degree(&self) -> usize {
        2
    }

    fn distance(&self, a: &Coord, b: &Coord) -> f64 {
        grid::axis_distance(a[0], b[0], self.len, self.edge) as f64
    }

    fn canonical_ordering(&self) -> Vec<Coord> {
        (0..self.len as i32).map(|i| smallvec![i]).collect()
    }

    fn canonical_rank(&self, coord: &[i32]) -> Option<usize> {
        match coord {
            [i] if grid::in_axis(*i, self.len) => Some(*i as usize),
            _ => None,
        }
    }

    fn grid_shape(&self) -> Option<Vec<usize>> {
        Some(vec![self.len as usize])
    }

    fn axis_periods(&self) -> Vec<Option<u32>> {
        vec![(self.edge == EdgeBehavior::Wrap).then_some(self.len)]
    }

    fn topology_eq(&self, other: &dyn Space) -> bool {
        other
            .downcast_ref::<Self>()
            .is_some_and(|o| o.len == self.len && o.edge == self.edge)
    }
}
