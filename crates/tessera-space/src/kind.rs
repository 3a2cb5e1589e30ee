//! Declarative topology descriptors.

use crate::edge::EdgeBehavior;
use crate::error::SpaceError;
use crate::fcc12::Fcc12;
use crate::hex2d::Hex2D;
use crate::line1d::Line1D;
use crate::product::ProductSpace;
use crate::ring1d::Ring1D;
use crate::space::Space;
use crate::square4::Square4;

/// A topology kind together with its parameters.
///
/// Lets a configuration record *which* space it wants and build a fresh
/// instance on demand, so two worlds built from equal kinds get
/// topologically equal spaces.
///
/// # Examples
///
/// ```
/// use tessera_space::{EdgeBehavior, SpaceKind};
///
/// let kind = SpaceKind::Square4 { rows: 8, cols: 8, edge: EdgeBehavior::Wrap };
/// let space = kind.build().unwrap();
/// assert_eq!(space.cell_count(), 64);
///
/// let bad = SpaceKind::Line1D { len: 0, edge: EdgeBehavior::Absorb };
/// assert!(bad.build().is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpaceKind {
    /// [`Line1D`].
    Line1D {
        /// Number of cells.
        len: u32,
        /// Edge behavior.
        edge: EdgeBehavior,
    },
    /// [`Ring1D`].
    Ring1D {
        /// Number of cells.
        len: u32,
    },
    /// [`Square4`].
    Square4 {
        /// Rows.
        rows: u32,
        /// Columns.
        cols: u32,
        /// Edge behavior.
        edge: EdgeBehavior,
    },
    /// [`Hex2D`].
    Hex2D {
        /// Rows (`r` extent).
        rows: u32,
        /// Columns (`q` extent).
        cols: u32,
    },
    /// [`Fcc12`].
    Fcc12 {
        /// x extent.
        w: u32,
        /// y extent.
        h: u32,
        /// z extent.
        d: u32,
        /// Edge behavior.
        edge: EdgeBehavior,
    },
    /// [`ProductSpace`] of the listed components.
    Product(Vec<SpaceKind>),
}

impl SpaceKind {
    /// Construct the described space.
    pub fn build(&self) -> Result<Box<dyn Space>, SpaceError> {
        Ok(match self {
            Self::Line1D { len, edge } => Box::new(Line1D::new(*len, *edge)?),
            Self::Ring1D { len } => Box::new(Ring1D::new(*len)?),
            Self::Square4 { rows, cols, edge } => Box::new(Square4::new(*rows, *cols, *edge)?),
            Self::Hex2D { rows, cols } => Box::new(Hex2D::new(*rows, *cols)?),
            Self::Fcc12 { w, h, d, edge } => Box::new(Fcc12::new(*w, *h, *d, *edge)?),
            Self::Product(parts) => {
                let components = parts
                    .iter()
                    .map(SpaceKind::build)
                    .collect::<Result<Vec<_>, _>>()?;
                Box::new(ProductSpace::new(components)?)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_kinds_build_equal_topologies() {
        let kind = SpaceKind::Product(vec![
            SpaceKind::Ring1D { len: 4 },
            SpaceKind::Hex2D { rows: 3, cols: 3 },
        ]);
        let a = kind.build().unwrap();
        let b = kind.build().unwrap();
        assert!(a.topology_eq(b.as_ref()));
        assert_eq!(a.cell_count(), 36);
    }

    #[test]
    fn malformed_parameters_are_errors() {
        assert_eq!(
            SpaceKind::Hex2D { rows: 0, cols: 3 }.build().err().unwrap(),
            SpaceError::EmptySpace
        );
        assert!(matches!(
            SpaceKind::Product(vec![]).build(),
            Err(SpaceError::InvalidComposition { .. })
        ));
        assert!(matches!(
            SpaceKind::Fcc12 { w: 3, h: 4, d: 4, edge: EdgeBehavior::Wrap }.build(),
            Err(SpaceError::InvalidComposition { .. })
        ));
    }
}
