//! Region specifications and their compiled slot plans.

use crate::adjacency::Adjacency;
use crate::error::SpaceError;
use crate::space::Space;
use tessera_core::Coord;

/// Largest number of slots a box region may compile to, padding included.
pub const MAX_REGION_SLOTS: usize = 1 << 24;

/// A set of cells, described declaratively.
#[derive(Clone, Debug, PartialEq)]
pub enum RegionSpec {
    /// Every cell.
    All,
    /// Axis-aligned box in coordinate space, both corners inclusive.
    ///
    /// Box points that are not cells (off the space, or odd-parity on a
    /// sparse lattice) become padding slots.
    Rect {
        /// Lower corner.
        min: Coord,
        /// Upper corner.
        max: Coord,
    },
    /// Cells within `radius` hops of `center`.
    Disk {
        /// Centre cell.
        center: Coord,
        /// Hop radius, inclusive.
        radius: u32,
    },
    /// An explicit cell list.
    Coords(Vec<Coord>),
}

/// A region resolved to rank slots.
///
/// `slots[i]` is the cell feeding output element `i`, or `None` for a
/// padding element. `shape` is the tensor shape of the slots in row-major
/// order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegionPlan {
    /// Rank per output element.
    pub slots: Vec<Option<usize>>,
    /// Row-major shape; its product equals `slots.len()`.
    pub shape: Vec<usize>,
}

impl RegionPlan {
    /// Compile `spec` against a space and its adjacency.
    pub fn compile(
        spec: &RegionSpec,
        space: &dyn Space,
        adjacency: &Adjacency,
    ) -> Result<Self, SpaceError> {
        match spec {
            RegionSpec::All => {
                let n = adjacency.cell_count();
                Ok(Self {
                    slots: (0..n).map(Some).collect(),
                    shape: space.grid_shape().unwrap_or_else(|| vec![n]),
                })
            }
            RegionSpec::Rect { min, max } => {
                if min.len() != space.ndim() || max.len() != space.ndim() {
                    return Err(SpaceError::InvalidRegion {
                        reason: format!(
                            "Rect corners must have {} components, got {} and {}",
                            space.ndim(),
                            min.len(),
                            max.len()
                        ),
                    });
                }
                if min.iter().zip(max.iter()).any(|(lo, hi)| lo > hi) {
                    return Err(SpaceError::InvalidRegion {
                        reason: format!("Rect min {min:?} exceeds max {max:?} on some axis"),
                    });
                }
                let extents: Vec<usize> = min
                    .iter()
                    .zip(max.iter())
                    .map(|(&lo, &hi)| {
                        usize::try_from(i64::from(hi) - i64::from(lo) + 1).unwrap_or(usize::MAX)
                    })
                    .collect();
                if box_slot_count(&extents).is_none() {
                    return Err(SpaceError::InvalidRegion {
                        reason: format!(
                            "Rect {min:?}..={max:?} spans more than {MAX_REGION_SLOTS} slots"
                        ),
                    });
                }
                Ok(Self {
                    slots: box_slots(min, &extents, |p| space.canonical_rank(p)),
                    shape: extents,
                })
            }
            RegionSpec::Disk { center, radius } => {
                let rank = adjacency
                    .rank_of(center)
                    .ok_or_else(|| out_of_bounds(center))?;
                let mut ranks: Vec<usize> =
                    adjacency.bfs(rank, *radius).into_iter().map(|(r, _)| r).collect();
                ranks.sort_unstable();
                Ok(Self::dense(ranks))
            }
            RegionSpec::Coords(coords) => {
                let mut ranks = coords
                    .iter()
                    .map(|c| adjacency.rank_of(c).ok_or_else(|| out_of_bounds(c)))
                    .collect::<Result<Vec<_>, _>>()?;
                ranks.sort_unstable();
                ranks.dedup();
                Ok(Self::dense(ranks))
            }
        }
    }

    fn dense(ranks: Vec<usize>) -> Self {
        let len = ranks.len();
        Self {
            slots: ranks.into_iter().map(Some).collect(),
            shape: vec![len],
        }
    }

    /// Number of output elements, padding included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the plan has no elements.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of non-padding elements.
    pub fn valid_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Fraction of elements backed by a real cell.
    pub fn valid_ratio(&self) -> f64 {
        if self.slots.is_empty() {
            return 0.0;
        }
        self.valid_count() as f64 / self.slots.len() as f64
    }
}

fn out_of_bounds(coord: &Coord) -> SpaceError {
    SpaceError::CoordOutOfBounds {
        coord: coord.clone(),
        bounds: "not a cell of this space".into(),
    }
}

/// Slot count of a box with `extents`, or `None` if it overflows or
/// exceeds [`MAX_REGION_SLOTS`].
pub fn box_slot_count(extents: &[usize]) -> Option<usize> {
    extents
        .iter()
        .try_fold(1usize, |acc, &e| acc.checked_mul(e))
        .filter(|&n| n <= MAX_REGION_SLOTS)
}

/// Ranks of every point in the box starting at `origin` with `extents`,
/// row-major over coordinate axes, as resolved by `rank`. Points that are
/// not cells map to `None`.
pub fn box_slots(
    origin: &[i32],
    extents: &[usize],
    rank: impl Fn(&[i32]) -> Option<usize>,
) -> Vec<Option<usize>> {
    let total: usize = extents.iter().product();
    let mut out = Vec::with_capacity(total);
    let mut offset = vec![0usize; extents.len()];
    let mut point: Vec<i32> = origin.to_vec();
    for _ in 0..total {
        for (axis, &o) in offset.iter().enumerate() {
            point[axis] = origin[axis] + o as i32;
        }
        out.push(rank(&point));
        // Odometer increment, last axis fastest.
        for axis in (0..extents.len()).rev() {
            offset[axis] += 1;
            if offset[axis] < extents[axis] {
                break;
            }
            offset[axis] = 0;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::EdgeBehavior;
    use crate::fcc12::Fcc12;
    use crate::line1d::Line1D;
    use crate::square4::Square4;
    use smallvec::smallvec;

    fn grid() -> (Square4, Adjacency) {
        let s = Square4::new(4, 5, EdgeBehavior::Absorb).unwrap();
        let adj = Adjacency::build(&s).unwrap();
        (s, adj)
    }

    #[test]
    fn all_uses_grid_shape() {
        let (s, adj) = grid();
        let plan = RegionPlan::compile(&RegionSpec::All, &s, &adj).unwrap();
        assert_eq!(plan.shape, vec![4, 5]);
        assert_eq!(plan.valid_ratio(), 1.0);
    }

    #[test]
    fn rect_off_edge_is_padding() {
        let (s, adj) = grid();
        let spec = RegionSpec::Rect {
            min: smallvec![-1, 3],
            max: smallvec![0, 5],
        };
        let plan = RegionPlan::compile(&spec, &s, &adj).unwrap();
        assert_eq!(plan.shape, vec![2, 3]);
        assert_eq!(plan.slots, vec![None, None, None, Some(3), Some(4), None]);
    }

    #[test]
    fn rect_inverted_corners_rejected() {
        let (s, adj) = grid();
        let spec = RegionSpec::Rect {
            min: smallvec![2, 2],
            max: smallvec![1, 3],
        };
        assert!(matches!(
            RegionPlan::compile(&spec, &s, &adj),
            Err(SpaceError::InvalidRegion { .. })
        ));
    }

    #[test]
    fn rect_spanning_all_of_i32_rejected() {
        let s = Line1D::new(4, EdgeBehavior::Absorb).unwrap();
        let adj = Adjacency::build(&s).unwrap();
        let spec = RegionSpec::Rect {
            min: smallvec![i32::MIN],
            max: smallvec![i32::MAX],
        };
        assert!(matches!(
            RegionPlan::compile(&spec, &s, &adj),
            Err(SpaceError::InvalidRegion { .. })
        ));

        let (s, adj) = grid();
        let wide = RegionSpec::Rect {
            min: smallvec![0, 0],
            max: smallvec![1 << 13, 1 << 13],
        };
        assert!(RegionPlan::compile(&wide, &s, &adj).is_err());
    }

    #[test]
    fn box_slot_count_bounds() {
        assert_eq!(box_slot_count(&[3, 4]), Some(12));
        assert_eq!(box_slot_count(&[MAX_REGION_SLOTS]), Some(MAX_REGION_SLOTS));
        assert_eq!(box_slot_count(&[MAX_REGION_SLOTS, 2]), None);
        assert_eq!(box_slot_count(&[usize::MAX, usize::MAX]), None);
    }

    #[test]
    fn disk_is_sorted_by_rank() {
        let (s, adj) = grid();
        let spec = RegionSpec::Disk {
            center: smallvec![1, 1],
            radius: 1,
        };
        let plan = RegionPlan::compile(&spec, &s, &adj).unwrap();
        assert_eq!(plan.slots, vec![Some(1), Some(5), Some(6), Some(7), Some(11)]);
    }

    #[test]
    fn coords_dedup_and_validate() {
        let (s, adj) = grid();
        let spec = RegionSpec::Coords(vec![smallvec![0, 1], smallvec![0, 0], smallvec![0, 1]]);
        let plan = RegionPlan::compile(&spec, &s, &adj).unwrap();
        assert_eq!(plan.slots, vec![Some(0), Some(1)]);

        let bad = RegionSpec::Coords(vec![smallvec![9, 9]]);
        assert!(matches!(
            RegionPlan::compile(&bad, &s, &adj),
            Err(SpaceError::CoordOutOfBounds { .. })
        ));
    }

    #[test]
    fn sparse_lattice_box_half_padding() {
        let s = Fcc12::new(2, 2, 2, EdgeBehavior::Absorb).unwrap();
        let slots = box_slots(&[0, 0, 0], &[2, 2, 2], |p| s.canonical_rank(p));
        assert_eq!(slots.iter().filter(|s| s.is_some()).count(), 4);
    }
}
