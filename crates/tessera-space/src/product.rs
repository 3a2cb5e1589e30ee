//! Cartesian product of spaces.

use crate::error::SpaceError;
use crate::space::Space;
use smallvec::SmallVec;
use tessera_core::Coord;

/// The product of two or more component spaces.
///
/// A product coordinate is the concatenation of component coordinates.
/// Two cells are adjacent when exactly one component differs and that
/// component's sub-coordinates are adjacent in their own space. Degree is
/// therefore the sum of component degrees and distance the sum of
/// component distances.
///
/// Canonical order is mixed-radix with the rightmost component varying
/// fastest.
///
/// # Examples
///
/// ```
/// use tessera_space::{EdgeBehavior, Hex2D, Line1D, ProductSpace, Space};
///
/// let space = ProductSpace::new(vec![
///     Box::new(Hex2D::new(4, 4).unwrap()),
///     Box::new(Line1D::new(3, EdgeBehavior::Absorb).unwrap()),
/// ])
/// .unwrap();
/// assert_eq!(space.ndim(), 3);
/// assert_eq!(space.cell_count(), 48);
/// assert_eq!(space.max_degree(), 8);
/// ```
pub struct ProductSpace {
    components: Vec<Box<dyn Space>>,
    /// Start of each component's slice within a product coordinate.
    offsets: Vec<usize>,
    /// Rank multiplier per component.
    strides: Vec<usize>,
    cell_count: usize,
}

impl ProductSpace {
    /// Compose `components` into one space.
    pub fn new(components: Vec<Box<dyn Space>>) -> Result<Self, SpaceError> {
        if components.len() < 2 {
            return Err(SpaceError::InvalidComposition {
                reason: format!(
                    "a product needs at least two components, got {}",
                    components.len()
                ),
            });
        }
        let mut offsets = Vec::with_capacity(components.len() + 1);
        let mut dim = 0;
        for comp in &components {
            offsets.push(dim);
            dim += comp.ndim();
        }
        offsets.push(dim);

        let mut strides = vec![1usize; components.len()];
        let mut cell_count = 1usize;
        for i in (0..components.len()).rev() {
            strides[i] = cell_count;
            cell_count = cell_count
                .checked_mul(components[i].cell_count())
                .ok_or_else(|| SpaceError::InvalidComposition {
                    reason: "product cell count overflows usize".into(),
                })?;
        }
        Ok(Self {
            components,
            offsets,
            strides,
            cell_count,
        })
    }

    /// The component spaces, left to right.
    pub fn components(&self) -> &[Box<dyn Space>] {
        &self.components
    }

    fn part<'c>(&self, coord: &'c [i32], i: usize) -> &'c [i32] {
        &coord[self.offsets[i]..self.offsets[i + 1]]
    }
}

impl std::fmt::Debug for ProductSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductSpace")
            .field("components", &self.components.len())
            .field("cell_count", &self.cell_count)
            .finish()
    }
}

impl Space for ProductSpace {
    fn ndim(&self) -> usize {
        self.offsets[self.components.len()]
    }

    fn cell_count(&self) -> usize {
        self.cell_count
    }

    fn neighbours(&self, coord: &Coord) -> SmallVec<[Coord; 8]> {
        let mut out = SmallVec::new();
        for (i, comp) in self.components.iter().enumerate() {
            let sub: Coord = Coord::from_slice(self.part(coord, i));
            for nb in comp.neighbours(&sub) {
                let mut full = coord.clone();
                full[self.offsets[i]..self.offsets[i + 1]].copy_from_slice(&nb);
                out.push(full);
            }
        }
        out
    }

    fn max_degree(&self) -> usize {
        self.components.iter().map(|c| c.max_degree()).sum()
    }

    fn distance(&self, a: &Coord, b: &Coord) -> f64 {
        self.components
            .iter()
            .enumerate()
            .map(|(i, comp)| {
                let sa = Coord::from_slice(self.part(a, i));
                let sb = Coord::from_slice(self.part(b, i));
                comp.distance(&sa, &sb)
            })
            .sum()
    }

    fn canonical_ordering(&self) -> Vec<Coord> {
        let mut out: Vec<Coord> = vec![Coord::new()];
        for comp in &self.components {
            let cells = comp.canonical_ordering();
            let mut next = Vec::with_capacity(out.len() * cells.len());
            for prefix in &out {
                for cell in &cells {
                    let mut c = prefix.clone();
                    c.extend_from_slice(cell);
                    next.push(c);
                }
            }
            out = next;
        }
        out
    }

    fn canonical_rank(&self, coord: &[i32]) -> Option<usize> {
        if coord.len() != self.ndim() {
            return None;
        }
        self.components
            .iter()
            .enumerate()
            .try_fold(0usize, |acc, (i, comp)| {
                Some(acc + comp.canonical_rank(self.part(coord, i))? * self.strides[i])
            })
    }

    fn grid_shape(&self) -> Option<Vec<usize>> {
        let mut shape = Vec::new();
        for comp in &self.components {
            shape.extend(comp.grid_shape()?);
        }
        Some(shape)
    }

    fn axis_periods(&self) -> Vec<Option<u32>> {
        self.components
            .iter()
            .flat_map(|comp| comp.axis_periods())
            .collect()
    }

    fn topology_eq(&self, other: &dyn Space) -> bool {
        other.downcast_ref::<Self>().is_some_and(|o| {
            o.components.len() == self.components.len()
                && self
                    .components
                    .iter()
                    .zip(&o.components)
                    .all(|(a, b)| a.topology_eq(b.as_ref()))
        })
    }
}
