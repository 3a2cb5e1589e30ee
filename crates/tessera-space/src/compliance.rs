//! Assertions every [`Space`] backend must satisfy.
//!
//! Public so backends outside this crate can run the same checks in their
//! own tests.

use crate::adjacency::Adjacency;
use crate::space::Space;
use indexmap::IndexSet;

/// `distance(a, a) == 0` for every cell.
pub fn assert_distance_reflexive(space: &dyn Space) {
    for coord in space.canonical_ordering() {
        let d = space.distance(&coord, &coord);
        assert!(d.abs() < f64::EPSILON, "distance({coord:?}, itself) = {d}");
    }
}

/// `distance(a, b) == distance(b, a)` and the triangle inequality hold.
pub fn assert_distance_metric(space: &dyn Space) {
    let cells = space.canonical_ordering();
    for a in &cells {
        for b in &cells {
            let dab = space.distance(a, b);
            assert!(
                (dab - space.distance(b, a)).abs() < f64::EPSILON,
                "distance not symmetric for {a:?}, {b:?}"
            );
            for c in &cells {
                let dac = space.distance(a, c);
                let dbc = space.distance(b, c);
                assert!(
                    dac <= dab + dbc + f64::EPSILON,
                    "triangle inequality violated: d({a:?},{c:?})={dac} > {dab} + {dbc}"
                );
            }
        }
    }
}

/// `b ∈ N(a)` implies `a ∈ N(b)`.
pub fn assert_neighbours_symmetric(space: &dyn Space) {
    for coord in space.canonical_ordering() {
        for nb in space.neighbours(&coord) {
            assert!(
                space.neighbours(&nb).contains(&coord),
                "{nb:?} in N({coord:?}) but not the reverse"
            );
        }
    }
}

/// Canonical order is deterministic, complete, duplicate-free, and agrees
/// with `canonical_rank`.
pub fn assert_canonical_order(space: &dyn Space) {
    let first = space.canonical_ordering();
    assert_eq!(first, space.canonical_ordering(), "ordering is non-deterministic");
    assert_eq!(first.len(), space.cell_count(), "ordering length != cell_count");
    let unique: IndexSet<_> = first.iter().collect();
    assert_eq!(unique.len(), first.len(), "ordering has duplicates");
    for (i, coord) in first.iter().enumerate() {
        assert_eq!(space.canonical_rank(coord), Some(i), "rank mismatch at {coord:?}");
    }
}

/// The adjacency tables are a simple undirected graph:
/// `sum(degree) == 2 × edge_count`, every row symmetric, padding is the
/// sentinel, and no degree exceeds `max_degree`.
pub fn assert_adjacency_consistent(space: &dyn Space) {
    let adj = Adjacency::build(space).expect("adjacency should build");
    let degree_sum: u64 = adj.degrees().iter().map(|&d| d as u64).sum();
    assert_eq!(degree_sum, 2 * adj.edge_count() as u64, "sum(degree) != 2E");
    for rank in 0..adj.cell_count() {
        let deg = adj.degrees()[rank] as usize;
        assert!(deg <= space.max_degree());
        for &nb in adj.neighbours_of(rank) {
            assert!(adj.neighbours_of(nb).contains(&rank), "asymmetric edge {rank}-{nb}");
        }
        assert!(adj.row(rank)[deg..].iter().all(|&p| p == adj.sentinel()));
    }
}

/// One period entry per axis, and shifting a cell by a whole period along
/// a wrapped axis lands back on the same rank.
pub fn assert_axis_periods(space: &dyn Space) {
    let periods = space.axis_periods();
    assert_eq!(periods.len(), space.ndim(), "one period per axis");
    let adj = Adjacency::build(space).expect("adjacency should build");
    for (rank, coord) in space.canonical_ordering().iter().enumerate() {
        for (axis, period) in periods.iter().enumerate() {
            let Some(p) = period else { continue };
            let mut shifted = coord.clone();
            shifted[axis] -= *p as i32;
            assert_eq!(adj.rank_of_wrapped(&shifted), Some(rank), "axis {axis} at {coord:?}");
        }
    }
}

/// Run every check.
pub fn run_full_compliance(space: &dyn Space) {
    assert_distance_reflexive(space);
    assert_distance_metric(space);
    assert_neighbours_symmetric(space);
    assert_canonical_order(space);
    assert_adjacency_consistent(space);
    assert_axis_periods(space);
}
