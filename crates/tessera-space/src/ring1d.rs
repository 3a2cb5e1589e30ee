//! Periodic one-dimensional ring.

use crate::edge::EdgeBehavior;
use crate::error::SpaceError;
use crate::line1d::Line1D;
use crate::space::Space;
use smallvec::SmallVec;
use tessera_core::Coord;

/// A ring of `len` cells: a [`Line1D`] whose ends are joined.
#[derive(Clone, Debug)]
pub struct Ring1D {
    line: Line1D,
}

impl Ring1D {
    /// Build a ring of `len` cells.
    pub fn new(len: u32) -> Result<Self, SpaceError> {
        Ok(Self {
            line: Line1D::new(len, EdgeBehavior::Wrap)?,
        })
    }

    /// Number of cells.
    pub fn len(&self) -> u32 {
        self.line.len()
    }

    /// Always `false`.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Space for Ring1D {
    fn ndim(&self) -> usize {
        1
    }

    fn cell_count(&self) -> usize {
        self.line.cell_count()
    }

    fn neighbours(&self, coord: &Coord) -> SmallVec<[Coord; 8]> {
        self.line.neighbours(coord)
    }

    fn max_degree(&self) -> usize {
        2
    }

    fn distance(&self, a: &Coord, b: &Coord) -> f64 {
        self.line.distance(a, b)
    }

    fn canonical_ordering(&self) -> Vec<Coord> {
        self.line.canonical_ordering()
    }

    fn canonical_rank(&self, coord: &[i32]) -> Option<usize> {
        self.line.canonical_rank(coord)
    }

    fn grid_shape(&self) -> Option<Vec<usize>> {
        self.line.grid_shape()
    }

    fn axis_periods(&self) -> Vec<Option<u32>> {
        vec![Some(self.len())]
    }

    fn topology_eq(&self, other: &dyn Space) -> bool {
        other
            .downcast_ref::<Self>()
            .is_some_and(|o| o.len() == self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance;
    use smallvec::smallvec;

    #[test]
    fn every_cell_has_two_neighbours() {
        let ring = Ring1D::new(6).unwrap();
        for coord in ring.canonical_ordering() {
            assert_eq!(ring.neighbours(&coord).len(), 2);
        }
        let origin: Coord = smallvec![0];
        assert_eq!(ring.distance(&origin, &smallvec![5]), 1.0);
    }

    #[test]
    fn ring_is_not_a_wrapped_line() {
        let ring = Ring1D::new(6).unwrap();
        let line = Line1D::new(6, EdgeBehavior::Wrap).unwrap();
        assert!(!ring.topology_eq(&line));
        compliance::run_full_compliance(&ring);
    }
}
