//! Two-dimensional hexagonal lattice in axial coordinates.

use crate::error::SpaceError;
use crate::grid;
use crate::space::Space;
use smallvec::{smallvec, SmallVec};
use tessera_core::Coord;

/// Axial `(dq, dr)` offsets, pointy-top: E, NE, NW, W, SW, SE.
const HEX_OFFSETS: [(i32, i32); 6] = [(1, 0), (1, -1), (0, -1), (-1, 0), (-1, 1), (0, 1)];

/// A hex lattice of `rows × cols` cells with coordinates `[q, r]`,
/// `0 <= q < cols`, `0 <= r < rows`.
///
/// Interior cells have six neighbours; edges absorb. Distance is the cube
/// distance `max(|dq|, |dr|, |dq + dr|)`. Canonical order is r-major:
/// outer loop over `r`, inner loop over `q`.
///
/// # Examples
///
/// ```
/// use tessera_space::{Hex2D, Space};
///
/// let hex = Hex2D::new(5, 5).unwrap();
/// assert_eq!(hex.neighbours(&vec![2i32, 2].into()).len(), 6);
/// assert_eq!(hex.neighbours(&vec![0i32, 0].into()).len(), 2);
/// ```
#[derive(Clone, Debug)]
pub struct Hex2D {
    rows: u32,
    cols: u32,
}

impl Hex2D {
    /// Build a hex lattice.
    pub fn new(rows: u32, cols: u32) -> Result<Self, SpaceError> {
        grid::check_dim("rows", rows)?;
        grid::check_dim("cols", cols)?;
        Ok(Self { rows, cols })
    }

    /// Number of rows (`r` extent).
    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Number of columns (`q` extent).
    pub fn cols(&self) -> u32 {
        self.cols
    }

    fn contains(&self, q: i32, r: i32) -> bool {
        grid::in_axis(q, self.cols) && grid::in_axis(r, self.rows)
    }
}

impl Space for Hex2D {
    fn ndim(&self) -> usize {
        2
    }

    fn cell_count(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    fn neighbours(&self, coord: &Coord) -> SmallVec<[Coord; 8]> {
        let (q, r) = (coord[0], coord[1]);
        HEX_OFFSETS
            .iter()
            .map(|&(dq, dr)| (q + dq, r + dr))
            .filter(|&(nq, nr)| self.contains(nq, nr))
            .map(|(nq, nr)| smallvec![nq, nr])
            .collect()
    }

    fn max_degree(&self) -> usize {
        6
    }

    fn distance(&self, a: &Coord, b: &Coord) -> f64 {
        let dq = b[0] - a[0];
        let dr = b[1] - a[1];
        dq.abs().max(dr.abs()).max((dq + dr).abs()) as f64
    }

    fn canonical_ordering(&self) -> Vec<Coord> {
        let mut out = Vec::with_capacity(self.cell_count());
        for r in 0..self.rows as i32 {
            for q in 0..self.cols as i32 {
                out.push(smallvec![q, r]);
            }
        }
        out
    }

    fn canonical_rank(&self, coord: &[i32]) -> Option<usize> {
        match *coord {
            [q, r] if self.contains(q, r) => Some(r as usize * self.cols as usize + q as usize),
            _ => None,
        }
    }

    fn grid_shape(&self) -> Option<Vec<usize>> {
        Some(vec![self.rows as usize, self.cols as usize])
    }

    fn topology_eq(&self, other: &dyn Space) -> bool {
        other
            .downcast_ref::<Self>()
            .is_some_and(|o| o.rows == self.rows && o.cols == self.cols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance;

    fn c(q: i32, r: i32) -> Coord {
        smallvec![q, r]
    }

    #[test]
    fn interior_has_all_six_directions() {
        let hex = Hex2D::new(5, 5).unwrap();
        let n = hex.neighbours(&c(2, 2));
        for nb in [c(3, 2), c(3, 1), c(2, 1), c(1, 2), c(1, 3), c(2, 3)] {
            assert!(n.contains(&nb), "missing {nb:?}");
        }
    }

    #[test]
    fn neighbours_are_at_distance_one() {
        let hex = Hex2D::new(6, 4).unwrap();
        for coord in hex.canonical_ordering() {
            for nb in hex.neighbours(&coord) {
                assert_eq!(hex.distance(&coord, &nb), 1.0);
            }
        }
    }

    #[test]
    fn rank_is_r_major() {
        let hex = Hex2D::new(3, 4).unwrap();
        assert_eq!(hex.canonical_rank(&[1, 0]), Some(1));
        assert_eq!(hex.canonical_rank(&[0, 1]), Some(4));
        assert_eq!(hex.canonical_rank(&[4, 0]), None);
    }

    #[test]
    fn compliance_rectangular() {
        compliance::run_full_compliance(&Hex2D::new(4, 5).unwrap());
    }
}
