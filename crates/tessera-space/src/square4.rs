//! Two-dimensional square grid, 4-connected.

use crate::edge::EdgeBehavior;
use crate::error::SpaceError;
use crate::grid;
use crate::space::Space;
use smallvec::{smallvec, SmallVec};
use tessera_core::Coord;

const OFFSETS: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// A `rows × cols` grid with coordinates `[row, col]` and N/S/W/E
/// neighbours. Distance is Manhattan, which is the graph geodesic here.
///
/// Canonical order is row-major.
#[derive(Clone, Debug)]
pub struct Square4 {
    rows: u32,
    cols: u32,
    edge: EdgeBehavior,
}

impl Square4 {
    /// Build a `rows × cols` grid.
    ///
    /// # Examples
    ///
    /// ```
    /// use tessera_space::{EdgeBehavior, Space, Square4};
    ///
    /// let grid = Square4::new(16, 16, EdgeBehavior::Absorb).unwrap();
    /// assert_eq!(grid.cell_count(), 256);
    /// assert_eq!(grid.canonical_rank(&[1, 0]), Some(16));
    /// ```
    pub fn new(rows: u32, cols: u32, edge: EdgeBehavior) -> Result<Self, SpaceError> {
        grid::check_dim("rows", rows)?;
        grid::check_dim("cols", cols)?;
        Ok(Self { rows, cols, edge })
    }

    /// Number of rows.
    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> u32 {
        self.cols
    }

    /// Edge behavior.
    pub fn edge_behavior(&self) -> EdgeBehavior {
        self.edge
    }
}

impl Space for Square4 {
    fn ndim(&self) -> usize {
        2
    }

    fn cell_count(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    fn neighbours(&self, coord: &Coord) -> SmallVec<[Coord; 8]> {
        let (r, c) = (coord[0], coord[1]);
        OFFSETS
            .iter()
            .filter_map(|&(dr, dc)| {
                let nr = grid::resolve_axis(r + dr, self.rows, self.edge)?;
                let nc = grid::resolve_axis(c + dc, self.cols, self.edge)?;
                Some(smallvec![nr, nc])
            })
            .collect()
    }

    fn max_degree(&self) -> usize {
        4
    }

    fn distance(&self, a: &Coord, b: &Coord) -> f64 {
        let dr = grid::axis_distance(a[0], b[0], self.rows, self.edge);
        let dc = grid::axis_distance(a[1], b[1], self.cols, self.edge);
        (dr + dc) as f64
    }

    fn canonical_ordering(&self) -> Vec<Coord> {
        let mut out = Vec::with_capacity(self.cell_count());
        for r in 0..self.rows as i32 {
            for c in 0..self.cols as i32 {
                out.push(smallvec![r, c]);
            }
        }
        out
    }

    fn canonical_rank(&self, coord: &[i32]) -> Option<usize> {
        match *coord {
            [r, c] if grid::in_axis(r, self.rows) && grid::in_axis(c, self.cols) => {
                Some(r as usize * self.cols as usize + c as usize)
            }
            _ => None,
        }
    }

    fn grid_shape(&self) -> Option<Vec<usize>> {
        Some(vec![self.rows as usize, self.cols as usize])
    }

    fn axis_periods(&self) -> Vec<Option<u32>> {
        let wrap = self.edge == EdgeBehavior::Wrap;
        vec![wrap.then_some(self.rows), wrap.then_some(self.cols)]
    }

    fn topology_eq(&self, other: &dyn Space) -> bool {
        other.downcast_ref::<Self>().is_some_and(|o| {
            o.rows == self.rows && o.cols == self.cols && o.edge == self.edge
        })
    }
}
