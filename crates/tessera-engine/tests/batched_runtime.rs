//! Integration tests: batched stepping, observation and reset.

use proptest::prelude::*;

use tessera_core::{Command, FieldDef, FieldId, FieldMutability, StepError, TickId};
use tessera_engine::{BatchError, BatchedWorld, WorldConfig};
use tessera_obs::{ObsEntry, ObsSpec, ObsTransform};
use tessera_propagators::{GraphDiffusion, NoiseInjection};
use tessera_space::{EdgeBehavior, RegionSpec, SpaceKind};
use tessera_test_utils::{AddPropagator, FailingPropagator};
use tracing_subscriber::EnvFilter;

const HEAT: FieldId = FieldId(0);
const JITTER: FieldId = FieldId(1);

/// 4x4 grid with a diffusing heat field and a noise field.
fn grid_config(seed: u64) -> WorldConfig {
    let mut cfg = WorldConfig::new();
    cfg.set_space(SpaceKind::Square4 {
        rows: 4,
        cols: 4,
        edge: EdgeBehavior::Absorb,
    })
    .unwrap();
    let heat = cfg
        .add_field(FieldDef::scalar("heat", FieldMutability::Sparse))
        .unwrap();
    cfg.set_dt(0.5).unwrap();
    cfg.set_seed(seed).unwrap();
    cfg.add_propagator(
        GraphDiffusion::builder()
            .field(heat)
            .coefficient(0.1)
            .source(5, 4.0)
            .build()
            .unwrap(),
    )
    .unwrap();
    let jitter = cfg
        .add_field(FieldDef::scalar("jitter", FieldMutability::Sparse))
        .unwrap();
    cfg.add_propagator(NoiseInjection::new(jitter, 0.05).unwrap())
        .unwrap();
    cfg
}

/// Route engine logs to the test harness; `RUST_LOG=debug` shows rollbacks.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn heat_spec() -> ObsSpec {
    ObsSpec::new(vec![
        ObsEntry::new(HEAT, RegionSpec::All),
        ObsEntry::new(JITTER, RegionSpec::All),
    ])
}

fn buffers(batch: &BatchedWorld) -> (Vec<f32>, Vec<u8>) {
    let len = batch.num_worlds() * batch.output_len();
    (vec![0.0; len], vec![0; len])
}

#[test]
fn reset_one_world_leaves_the_others() {
    init_tracing();
    let configs = (0..4).map(grid_config).collect();
    let mut batch = BatchedWorld::new(configs, &heat_spec()).unwrap();
    let per = batch.output_len();
    let (mut out, mut mask) = buffers(&batch);
    let no_commands = vec![Vec::new(); 4];
    for _ in 0..10 {
        batch
            .step_and_observe(&no_commands, &mut out, &mut mask)
            .unwrap();
    }
    let before = out.clone();

    batch.reset_world(1, 99).unwrap();
    batch.observe_all(&mut out, &mut mask).unwrap();

    assert_eq!(&out[..per], &before[..per]);
    assert_eq!(&out[2 * per..3 * per], &before[2 * per..3 * per]);
    assert_eq!(&out[3 * per..], &before[3 * per..]);
    assert!(out[per..2 * per].iter().all(|&v| v == 0.0));
    assert_eq!(
        batch.tick_ids(),
        vec![TickId(10), TickId(0), TickId(10), TickId(10)]
    );
}

#[test]
fn observe_all_is_repeatable() {
    let mut batch = BatchedWorld::new(vec![grid_config(1), grid_config(2)], &heat_spec()).unwrap();
    let (mut out, mut mask) = buffers(&batch);
    batch
        .step_and_observe(&[vec![], vec![]], &mut out, &mut mask)
        .unwrap();

    let (mut a, mut am) = buffers(&batch);
    let (mut b, mut bm) = buffers(&batch);
    batch.observe_all(&mut a, &mut am).unwrap();
    batch.observe_all(&mut b, &mut bm).unwrap();
    let bits = |buf: &[f32]| buf.iter().map(|v| v.to_bits()).collect::<Vec<_>>();
    assert_eq!(bits(&a), bits(&b));
    assert_eq!(am, bm);
    assert_eq!(a, out);
}

#[test]
fn command_count_error_names_both_counts() {
    let configs = (0..4).map(grid_config).collect();
    let mut batch = BatchedWorld::new(configs, &heat_spec()).unwrap();
    let (mut out, mut mask) = buffers(&batch);
    let err = batch
        .step_and_observe(&vec![Vec::new(); 3], &mut out, &mut mask)
        .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains('3') && msg.contains('4'), "{msg}");
}

#[test]
fn one_failing_world_commits_none() {
    init_tracing();
    let make = |fail: bool| {
        let mut cfg = WorldConfig::new();
        cfg.set_space(SpaceKind::Line1D {
            len: 3,
            edge: EdgeBehavior::Absorb,
        })
        .unwrap();
        let f = cfg
            .add_field(FieldDef::scalar("f", FieldMutability::Sparse))
            .unwrap();
        let g = cfg
            .add_field(FieldDef::scalar("g", FieldMutability::PerTick))
            .unwrap();
        cfg.add_propagator(AddPropagator::new("inc", f, 1.0)).unwrap();
        let fail_on = if fail { vec![TickId(2)] } else { vec![] };
        cfg.add_propagator(FailingPropagator::new("gate", g, fail_on))
            .unwrap();
        cfg
    };
    let spec = ObsSpec::new(vec![ObsEntry::new(FieldId(0), RegionSpec::All)]);
    let mut batch = BatchedWorld::new(vec![make(false), make(true), make(false)], &spec).unwrap();
    let (mut out, mut mask) = buffers(&batch);
    let cmds = vec![Vec::new(); 3];

    batch.step_and_observe(&cmds, &mut out, &mut mask).unwrap();
    let after_first = out.clone();

    match batch.step_and_observe(&cmds, &mut out, &mut mask) {
        Err(BatchError::Step { world_index, error }) => {
            assert_eq!(world_index, 1);
            assert!(matches!(error, StepError::PropagatorFailed { .. }));
        }
        other => panic!("expected step failure, got {other:?}"),
    }
    assert_eq!(batch.tick_ids(), vec![TickId(1); 3]);
    batch.observe_all(&mut out, &mut mask).unwrap();
    assert_eq!(out, after_first);
}

#[test]
fn commands_reach_only_their_world() {
    let cfg_for = |_: usize| {
        let mut cfg = WorldConfig::new();
        cfg.set_space(SpaceKind::Line1D {
            len: 4,
            edge: EdgeBehavior::Absorb,
        })
        .unwrap();
        let f = cfg
            .add_field(FieldDef::scalar("f", FieldMutability::Sparse))
            .unwrap();
        cfg.add_propagator(AddPropagator::new("noop", f, 0.0)).unwrap();
        cfg
    };
    let configs = (0..3).map(cfg_for).collect();
    let spec = ObsSpec::new(vec![ObsEntry::new(FieldId(0), RegionSpec::All)
        .with_transform(ObsTransform::Normalize { min: 0.0, max: 2.0 })]);
    let mut batch = BatchedWorld::new(configs, &spec).unwrap();
    let (mut out, mut mask) = buffers(&batch);
    let cmds = vec![
        vec![],
        vec![Command::set(FieldId(0), [3], 1.0)],
        vec![Command::set(FieldId(0), [0], 4.0)],
    ];
    batch.step_and_observe(&cmds, &mut out, &mut mask).unwrap();
    assert_eq!(
        out,
        vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.5, 1.0, 0.0, 0.0, 0.0]
    );
}

#[test]
fn agent_relative_spec_rejected() {
    let spec = ObsSpec::new(vec![ObsEntry::new(
        HEAT,
        tessera_obs::ObsRegion::AgentDisk { radius: 1 },
    )]);
    assert!(matches!(
        BatchedWorld::new(vec![grid_config(0)], &spec),
        Err(BatchError::InvalidArgument { .. })
    ));
}

fn run(seeds: &[u64], steps: usize, poke: &[(usize, usize, i32, i32)]) -> Vec<Vec<u32>> {
    let configs = seeds.iter().map(|&s| grid_config(s)).collect();
    let mut batch = BatchedWorld::new(configs, &heat_spec()).unwrap();
    let (mut out, mut mask) = buffers(&batch);
    let mut trajectory = Vec::new();
    for step in 0..steps {
        let mut cmds = vec![Vec::new(); seeds.len()];
        for &(at, world, r, c) in poke {
            if at == step {
                cmds[world % seeds.len()].push(Command::set(HEAT, [r, c], 2.0));
            }
        }
        batch.step_and_observe(&cmds, &mut out, &mut mask).unwrap();
        trajectory.push(out.iter().map(|v| v.to_bits()).collect());
    }
    trajectory
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn identical_batches_are_bit_identical(
        seeds in prop::collection::vec(any::<u64>(), 1..4),
        steps in 1usize..8,
        poke in prop::collection::vec((0usize..8, 0usize..4, 0i32..4, 0i32..4), 0..6),
    ) {
        prop_assert_eq!(run(&seeds, steps, &poke), run(&seeds, steps, &poke));
    }
}
