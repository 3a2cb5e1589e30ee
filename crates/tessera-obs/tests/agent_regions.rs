//! Agent-relative observations keep a fixed length whatever the centre.

use proptest::prelude::*;
use smallvec::smallvec;
use tessera_core::{Coord, FieldId, TickId};
use tessera_obs::{ObsEntry, ObsPlan, ObsRegion, ObsSpec, PoolKernel};
use tessera_space::{Adjacency, EdgeBehavior, Hex2D, Space, Square4};
use tessera_test_utils::MockSnapshot;

const F: FieldId = FieldId(0);

fn observe(plan: &ObsPlan, space: &dyn Space, center: Coord) -> (Vec<f32>, Vec<u8>) {
    let mut snap = MockSnapshot::new(TickId(1));
    snap.set_field(F, vec![1.0; space.cell_count()]);
    let mut out = vec![0.0; plan.output_len()];
    let mut mask = vec![0; plan.mask_len()];
    plan.execute_agents(&snap, &[center], &mut out, &mut mask).unwrap();
    (out, mask)
}

fn zeros(mask: &[u8]) -> usize {
    mask.iter().filter(|&&m| m == 0).count()
}

#[test]
fn corner_disk_has_more_padding_than_interior() {
    let space = Square4::new(10, 10, EdgeBehavior::Absorb).unwrap();
    let spec = ObsSpec::new(vec![ObsEntry::new(F, ObsRegion::AgentDisk { radius: 3 })]);
    let plan = ObsPlan::compile(&spec, &space).unwrap();
    assert_eq!(plan.output_len(), 25);

    let (_, corner) = observe(&plan, &space, smallvec![0, 0]);
    let (_, interior) = observe(&plan, &space, smallvec![5, 5]);
    assert_eq!(corner.len(), interior.len());
    assert_eq!(zeros(&interior), 0);
    assert_eq!(zeros(&corner), 15);
}

#[test]
fn hex_disk_interior_is_full() {
    let space = Hex2D::new(7, 7).unwrap();
    let spec = ObsSpec::new(vec![ObsEntry::new(F, ObsRegion::AgentDisk { radius: 2 })]);
    let plan = ObsPlan::compile(&spec, &space).unwrap();
    // 1 + 6 + 12
    assert_eq!(plan.output_len(), 19);
    let (_, mask) = observe(&plan, &space, smallvec![3, 3]);
    assert_eq!(zeros(&mask), 0);
}

#[test]
fn pooled_rect_window_counts_only_real_cells() {
    let space = Square4::new(5, 5, EdgeBehavior::Absorb).unwrap();
    let spec = ObsSpec::new(vec![ObsEntry::new(F, ObsRegion::AgentRect {
        half_extent: smallvec![1, 1],
    })
    .with_pool(PoolKernel::Sum, 3, 1)]);
    let plan = ObsPlan::compile(&spec, &space).unwrap();
    assert_eq!(plan.output_len(), 1);
    let (corner, _) = observe(&plan, &space, smallvec![0, 0]);
    let (middle, _) = observe(&plan, &space, smallvec![2, 2]);
    assert_eq!(corner, vec![4.0]);
    assert_eq!(middle, vec![9.0]);
}

proptest! {
    #[test]
    fn torus_rect_never_pads(
        rows in 3u32..8,
        cols in 3u32..8,
        half in 0u32..3,
        pick in any::<prop::sample::Index>(),
    ) {
        let space = Square4::new(rows, cols, EdgeBehavior::Wrap).unwrap();
        let adjacency = Adjacency::build(&space).unwrap();
        let spec = ObsSpec::new(vec![
            ObsEntry::new(F, ObsRegion::AgentRect { half_extent: smallvec![half, half] }),
        ]);
        let plan = ObsPlan::compile(&spec, &space).unwrap();
        let rank = pick.index(space.cell_count());
        let center = adjacency.coord(rank).unwrap().clone();
        let (out, mask) = observe(&plan, &space, center);
        prop_assert_eq!(zeros(&mask), 0);
        prop_assert!(out.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn output_length_is_centre_independent(
        rows in 2u32..8,
        cols in 2u32..8,
        radius in 0u32..4,
        pick in any::<prop::sample::Index>(),
    ) {
        let space = Square4::new(rows, cols, EdgeBehavior::Absorb).unwrap();
        let adjacency = Adjacency::build(&space).unwrap();
        let spec = ObsSpec::new(vec![
            ObsEntry::new(F, ObsRegion::AgentDisk { radius }),
            ObsEntry::new(F, ObsRegion::AgentRect { half_extent: smallvec![radius, radius] }),
        ]);
        let plan = ObsPlan::compile(&spec, &space).unwrap();
        let rank = pick.index(space.cell_count());
        let center = adjacency.coord(rank).unwrap().clone();
        let (out, mask) = observe(&plan, &space, center);
        prop_assert_eq!(out.len(), plan.output_len());
        prop_assert_eq!(mask.len(), plan.mask_len());
        // The centre itself is always real data.
        prop_assert_eq!(mask[0], 1);
    }
}
