//! Face-centred cubic lattice with 12-connectivity.
//!
//! Cells are the integer points `[x, y, z]` inside a `w × h × d` box whose
//! coordinate sum is even. Each interior cell touches 12 others, reached by
//! changing exactly two coordinates by ±1.
//!
//! - **Absorb**: off-box neighbours are dropped.
//! - **Clamp**: behaves as Absorb. Clamping one axis would leave a single
//!   coordinate changed and land on an odd-parity point.
//! - **Wrap**: needs even extents so parity survives the wrap.

use crate::edge::EdgeBehavior;
use crate::error::SpaceError;
use crate::grid;
use crate::space::Space;
use smallvec::{smallvec, SmallVec};
use tessera_core::Coord;

const FCC_OFFSETS: [(i32, i32, i32); 12] = [
    (1, 1, 0),
    (1, -1, 0),
    (-1, 1, 0),
    (-1, -1, 0),
    (1, 0, 1),
    (1, 0, -1),
    (-1, 0, 1),
    (-1, 0, -1),
    (0, 1, 1),
    (0, 1, -1),
    (0, -1, 1),
    (0, -1, -1),
];

/// Face-centred cubic lattice. Canonical order is z, then y, then x,
/// skipping odd-parity points.
///
/// # Examples
///
/// ```
/// use tessera_space::{EdgeBehavior, Fcc12, Space};
///
/// let fcc = Fcc12::new(6, 6, 6, EdgeBehavior::Absorb).unwrap();
/// assert_eq!(fcc.cell_count(), 108);
/// assert_eq!(fcc.neighbours(&vec![2i32, 2, 2].into()).len(), 12);
/// ```
#[derive(Clone, Debug)]
pub struct Fcc12 {
    w: u32,
    h: u32,
    d: u32,
    edge: EdgeBehavior,
    /// Rank of the first cell of each `(z, y)` row, plus a final total.
    row_offsets: Vec<usize>,
}

impl Fcc12 {
    /// Build a lattice in a `w × h × d` box.
    pub fn new(w: u32, h: u32, d: u32, edge: EdgeBehavior) -> Result<Self, SpaceError> {
        grid::check_dim("w", w)?;
        grid::check_dim("h", h)?;
        grid::check_dim("d", d)?;
        if edge == EdgeBehavior::Wrap && (w % 2 != 0 || h % 2 != 0 || d % 2 != 0) {
            return Err(SpaceError::InvalidComposition {
                reason: format!("Fcc12 with Wrap needs even extents, got {w}x{h}x{d}"),
            });
        }
        let mut row_offsets = Vec::with_capacity(h as usize * d as usize + 1);
        let mut total = 0usize;
        for z in 0..d {
            for y in 0..h {
                row_offsets.push(total);
                total += if (y + z) % 2 == 0 {
                    (w as usize).div_ceil(2)
                } else {
                    w as usize / 2
                };
            }
        }
        row_offsets.push(total);
        Ok(Self {
            w,
            h,
            d,
            edge,
            row_offsets,
        })
    }

    /// Extents `(w, h, d)`.
    pub fn extents(&self) -> (u32, u32, u32) {
        (self.w, self.h, self.d)
    }

    /// Edge behavior.
    pub fn edge_behavior(&self) -> EdgeBehavior {
        self.edge
    }

    fn resolve(&self, val: i32, len: u32) -> Option<i32> {
        match self.edge {
            EdgeBehavior::Wrap => grid::resolve_axis(val, len, EdgeBehavior::Wrap),
            EdgeBehavior::Absorb | EdgeBehavior::Clamp => {
                grid::resolve_axis(val, len, EdgeBehavior::Absorb)
            }
        }
    }
}

impl Space for Fcc12 {
    fn ndim(&self) -> usize {
        3
    }

    fn cell_count(&self) -> usize {
        self.row_offsets.last().copied().unwrap_or(0)
    }

    fn neighbours(&self, coord: &Coord) -> SmallVec<[Coord; 8]> {
        let (x, y, z) = (coord[0], coord[1], coord[2]);
        FCC_OFFSETS
            .iter()
            .filter_map(|&(dx, dy, dz)| {
                Some(smallvec![
                    self.resolve(x + dx, self.w)?,
                    self.resolve(y + dy, self.h)?,
                    self.resolve(z + dz, self.d)?
                ])
            })
            .collect()
    }

    fn max_degree(&self) -> usize {
        12
    }

    fn distance(&self, a: &Coord, b: &Coord) -> f64 {
        let dx = grid::axis_distance(a[0], b[0], self.w, self.edge);
        let dy = grid::axis_distance(a[1], b[1], self.h, self.edge);
        let dz = grid::axis_distance(a[2], b[2], self.d, self.edge);
        dx.max(dy).max(dz).max((dx + dy + dz) / 2) as f64
    }

    fn canonical_ordering(&self) -> Vec<Coord> {
        let mut out = Vec::with_capacity(self.cell_count());
        for z in 0..self.d as i32 {
            for y in 0..self.h as i32 {
                let start = (y + z) % 2;
                for x in (start..self.w as i32).step_by(2) {
                    out.push(smallvec![x, y, z]);
                }
            }
        }
        out
    }

    fn canonical_rank(&self, coord: &[i32]) -> Option<usize> {
        let [x, y, z] = *coord else {
            return None;
        };
        if !grid::in_axis(x, self.w) || !grid::in_axis(y, self.h) || !grid::in_axis(z, self.d) {
            return None;
        }
        if (x + y + z) % 2 != 0 {
            return None;
        }
        let row = z as usize * self.h as usize + y as usize;
        Some(self.row_offsets[row] + x as usize / 2)
    }

    fn axis_periods(&self) -> Vec<Option<u32>> {
        let wrap = self.edge == EdgeBehavior::Wrap;
        vec![
            wrap.then_some(self.w),
            wrap.then_some(self.h),
            wrap.then_some(self.d),
        ]
    }

    fn topology_eq(&self, other: &dyn Space) -> bool {
        other.downcast_ref::<Self>().is_some_and(|o| {
            o.extents() == self.extents() && o.edge == self.edge
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance;

    fn c(x: i32, y: i32, z: i32) -> Coord {
        smallvec![x, y, z]
    }

    #[test]
    fn wrap_needs_even_extents() {
        assert!(matches!(
            Fcc12::new(3, 4, 4, EdgeBehavior::Wrap),
            Err(SpaceError::InvalidComposition { .. })
        ));
        assert!(Fcc12::new(4, 4, 4, EdgeBehavior::Wrap).is_ok());
        assert!(Fcc12::new(3, 3, 3, EdgeBehavior::Absorb).is_ok());
    }

    #[test]
    fn cell_count_is_even_parity_points() {
        let s = Fcc12::new(3, 3, 3, EdgeBehavior::Absorb).unwrap();
        assert_eq!(s.cell_count(), 14);
        assert_eq!(s.canonical_ordering().len(), 14);
    }

    #[test]
    fn odd_parity_has_no_rank() {
        let s = Fcc12::new(4, 4, 4, EdgeBehavior::Absorb).unwrap();
        assert_eq!(s.canonical_rank(&[1, 0, 0]), None);
        assert_eq!(s.canonical_rank(&[1, 1, 0]), Some(2));
    }

    #[test]
    fn clamp_matches_absorb() {
        let clamp = Fcc12::new(4, 4, 4, EdgeBehavior::Clamp).unwrap();
        let absorb = Fcc12::new(4, 4, 4, EdgeBehavior::Absorb).unwrap();
        for coord in absorb.canonical_ordering() {
            assert_eq!(clamp.neighbours(&coord), absorb.neighbours(&coord));
        }
        assert_eq!(absorb.neighbours(&c(0, 0, 0)).len(), 3);
    }

    #[test]
    fn neighbours_keep_parity() {
        let s = Fcc12::new(4, 4, 4, EdgeBehavior::Wrap).unwrap();
        for coord in s.canonical_ordering() {
            let n = s.neighbours(&coord);
            assert_eq!(n.len(), 12);
            for nb in &n {
                assert!(s.canonical_rank(nb).is_some(), "{nb:?} off-lattice");
            }
        }
    }

    #[test]
    fn compliance_small_boxes() {
        compliance::run_full_compliance(&Fcc12::new(4, 3, 3, EdgeBehavior::Absorb).unwrap());
        compliance::run_full_compliance(&Fcc12::new(4, 4, 4, EdgeBehavior::Wrap).unwrap());
    }
}
