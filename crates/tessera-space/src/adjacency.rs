//! Precomputed, sentinel-padded adjacency tables.
//!
//! [`Adjacency::build`] walks a space once in canonical order and produces
//! the flat tables graph kernels consume:
//!
//! - `table`: `cell_count × width` neighbour ranks, row-major, where
//!   `width` is the space's maximum degree. Missing neighbours hold the
//!   sentinel rank `cell_count`.
//! - `degree`: real neighbour count per cell.
//!
//! A kernel that appends one extra slot to its working buffer and stores
//! the reduction's identity there can gather through the table without
//! ever branching on "no neighbour here".

use crate::error::SpaceError;
use crate::space::Space;
use indexmap::IndexSet;
use std::collections::VecDeque;
use tessera_core::Coord;

/// Neighbour-index and degree tables for one topology.
#[derive(Clone, Debug)]
pub struct Adjacency {
    /// Cells in rank order; `get_index_of(coord)` is the rank.
    cells: IndexSet<Coord>,
    table: Vec<usize>,
    degree: Vec<u32>,
    width: usize,
    periods: Vec<Option<u32>>,
}

/// Reusable visit state for [`Adjacency::bfs_with`].
///
/// Marks are epoch stamps, so starting a new search costs nothing beyond
/// bumping the epoch.
#[derive(Clone, Debug, Default)]
pub struct BfsScratch {
    stamp: Vec<u32>,
    epoch: u32,
    queue: VecDeque<(usize, u32)>,
}

impl BfsScratch {
    /// Scratch sized for `adjacency`.
    pub fn new(adjacency: &Adjacency) -> Self {
        Self {
            stamp: vec![0; adjacency.cell_count()],
            epoch: 0,
            queue: VecDeque::new(),
        }
    }

    fn begin(&mut self, cell_count: usize) {
        if self.stamp.len() != cell_count {
            self.stamp = vec![0; cell_count];
            self.epoch = 0;
        }
        self.epoch = self.epoch.wrapping_add(1);
        if self.epoch == 0 {
            self.stamp.fill(0);
            self.epoch = 1;
        }
        self.queue.clear();
    }

    /// Mark `rank` visited; `false` if it already was.
    fn visit(&mut self, rank: usize) -> bool {
        if self.stamp[rank] == self.epoch {
            false
        } else {
            self.stamp[rank] = self.epoch;
            true
        }
    }
}

impl Adjacency {
    /// Build tables for `space`.
    ///
    /// Self-loops (clamped edges) and repeated neighbours (wrapping on
    /// axes shorter than three) are dropped, so every row lists distinct
    /// cells other than its own.
    ///
    /// # Errors
    ///
    /// [`SpaceError::InvalidComposition`] if the backend's canonical order
    /// repeats a cell, disagrees with `cell_count`, or if a neighbour is
    /// not itself a cell.
    ///
    /// # Examples
    ///
    /// ```
    /// use tessera_space::{Adjacency, EdgeBehavior, Line1D};
    ///
    /// let adj = Adjacency::build(&Line1D::new(3, EdgeBehavior::Absorb).unwrap()).unwrap();
    /// assert_eq!(adj.sentinel(), 3);
    /// assert_eq!(adj.row(0), &[1, 3]);
    /// assert_eq!(adj.degrees(), &[1, 2, 1]);
    /// ```
    pub fn build(space: &dyn Space) -> Result<Self, SpaceError> {
        let cells: IndexSet<Coord> = space.canonical_ordering().into_iter().collect();
        let n = cells.len();
        if n != space.cell_count() {
            return Err(SpaceError::InvalidComposition {
                reason: format!(
                    "canonical ordering yields {n} distinct cells, cell_count is {}",
                    space.cell_count()
                ),
            });
        }

        let width = space.max_degree();
        let mut table = vec![n; n * width];
        let mut degree = vec![0u32; n];
        for (rank, coord) in cells.iter().enumerate() {
            let row = &mut table[rank * width..(rank + 1) * width];
            let mut filled = 0usize;
            for nb in space.neighbours(coord) {
                let nb_rank =
                    cells
                        .get_index_of(&nb)
                        .ok_or_else(|| SpaceError::InvalidComposition {
                            reason: format!("neighbour {nb:?} of {coord:?} is not a cell"),
                        })?;
                if nb_rank == rank || row[..filled].contains(&nb_rank) {
                    continue;
                }
                if filled == width {
                    return Err(SpaceError::InvalidComposition {
                        reason: format!("{coord:?} has more than {width} neighbours"),
                    });
                }
                row[filled] = nb_rank;
                filled += 1;
            }
            degree[rank] = filled as u32;
        }

        Ok(Self {
            cells,
            table,
            degree,
            width,
            periods: space.axis_periods(),
        })
    }

    /// Number of cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// The out-of-range rank used to pad rows, equal to `cell_count`.
    pub fn sentinel(&self) -> usize {
        self.cells.len()
    }

    /// Row width of the neighbour table (the space's maximum degree).
    pub fn width(&self) -> usize {
        self.width
    }

    /// Flat `cell_count × width` neighbour table.
    pub fn table(&self) -> &[usize] {
        &self.table
    }

    /// Padded neighbour row of one cell.
    pub fn row(&self, rank: usize) -> &[usize] {
        &self.table[rank * self.width..(rank + 1) * self.width]
    }

    /// Real neighbours of one cell, without padding.
    pub fn neighbours_of(&self, rank: usize) -> &[usize] {
        &self.row(rank)[..self.degree[rank] as usize]
    }

    /// Per-cell degree.
    pub fn degrees(&self) -> &[u32] {
        &self.degree
    }

    /// Largest degree actually present.
    pub fn max_observed_degree(&self) -> u32 {
        self.degree.iter().copied().max().unwrap_or(0)
    }

    /// Number of undirected edges, counting each unordered pair once.
    pub fn edge_count(&self) -> usize {
        (0..self.cell_count())
            .map(|r| self.neighbours_of(r).iter().filter(|&&nb| nb > r).count())
            .sum()
    }

    /// Rank of a coordinate.
    pub fn rank_of(&self, coord: &[i32]) -> Option<usize> {
        self.cells.get_index_of(coord)
    }

    /// Rank of a coordinate after reducing wrapped axes into range.
    ///
    /// Bounded axes are left alone, so a point past a bounded edge is
    /// still `None`.
    pub fn rank_of_wrapped(&self, coord: &[i32]) -> Option<usize> {
        if self.periods.iter().all(Option::is_none) || coord.len() != self.periods.len() {
            return self.rank_of(coord);
        }
        let reduced: Coord = coord
            .iter()
            .zip(&self.periods)
            .map(|(&v, period)| match period {
                Some(p) => (i64::from(v).rem_euclid(i64::from(*p))) as i32,
                None => v,
            })
            .collect();
        self.rank_of(&reduced)
    }

    /// Coordinate of a rank.
    pub fn coord(&self, rank: usize) -> Option<&Coord> {
        self.cells.get_index(rank)
    }

    /// Breadth-first expansion from `start` out to `radius` hops.
    ///
    /// Returns `(rank, hops)` pairs in visit order; `start` comes first.
    pub fn bfs(&self, start: usize, radius: u32) -> Vec<(usize, u32)> {
        let mut out = Vec::new();
        self.bfs_with(start, radius, &mut BfsScratch::new(self), &mut out);
        out
    }

    /// [`bfs`](Self::bfs) into a caller-owned buffer, reusing `scratch`
    /// across calls. `out` is cleared first.
    pub fn bfs_with(
        &self,
        start: usize,
        radius: u32,
        scratch: &mut BfsScratch,
        out: &mut Vec<(usize, u32)>,
    ) {
        out.clear();
        scratch.begin(self.cell_count());
        scratch.visit(start);
        out.push((start, 0));
        scratch.queue.push_back((start, 0));
        while let Some((rank, hops)) = scratch.queue.pop_front() {
            if hops == radius {
                continue;
            }
            for &nb in self.neighbours_of(rank) {
                if scratch.visit(nb) {
                    out.push((nb, hops + 1));
                    scratch.queue.push_back((nb, hops + 1));
                }
            }
        }
    }
}
