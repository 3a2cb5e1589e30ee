//! Criterion micro-benchmarks for observation plans.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tessera_bench::{profile_obs_spec, reference_profile, HEAT};
use tessera_core::Coord;
use tessera_engine::World;
use tessera_obs::{ObsEntry, ObsPlan, ObsRegion, ObsSpec, PoolKernel};
use tessera_space::{RegionSpec, SpaceKind};

fn world() -> World {
    let mut world = World::new(reference_profile(42).unwrap()).unwrap();
    for _ in 0..10 {
        world.step(&[]).unwrap();
    }
    world
}

fn bench_compile(c: &mut Criterion) {
    let world = world();
    let spec = profile_obs_spec();

    c.bench_function("obs_compile_10k", |b| {
        b.iter(|| black_box(ObsPlan::compile(&spec, world.space()).unwrap()));
    });
}

fn bench_execute_10k(c: &mut Criterion) {
    let world = world();
    let plan = ObsPlan::compile(&profile_obs_spec(), world.space()).unwrap();
    let mut out = vec![0.0f32; plan.output_len()];
    let mut mask = vec![0u8; plan.mask_len()];

    c.bench_function("obs_execute_10k", |b| {
        b.iter(|| black_box(plan.execute(&world, &mut out, &mut mask).unwrap()));
    });
}

fn bench_execute_pooled(c: &mut Criterion) {
    let world = world();
    let spec = ObsSpec::new(vec![ObsEntry::new(HEAT, RegionSpec::All).with_pool(
        PoolKernel::Mean,
        4,
        4,
    )]);
    let plan = ObsPlan::compile(&spec, world.space()).unwrap();
    let mut out = vec![0.0f32; plan.output_len()];
    let mut mask = vec![0u8; plan.mask_len()];

    c.bench_function("obs_execute_mean_pool_4x4", |b| {
        b.iter(|| black_box(plan.execute(&world, &mut out, &mut mask).unwrap()));
    });
}

/// 16 agents, radius-3 disks on the 100x100 grid.
fn bench_execute_agents_16(c: &mut Criterion) {
    let world = world();
    let spec = ObsSpec::new(vec![ObsEntry::new(HEAT, ObsRegion::AgentDisk { radius: 3 })]);
    let plan = ObsPlan::compile(&spec, world.space()).unwrap();
    let centers: Vec<Coord> = (0..16).map(|i| Coord::from_slice(&[i * 6, 99 - i * 6])).collect();
    let len = plan.output_len() * centers.len();
    let mut out = vec![0.0f32; len];
    let mut mask = vec![0u8; len];

    c.bench_function("obs_execute_agents_16", |b| {
        b.iter(|| {
            black_box(
                plan.execute_agents(&world, &centers, &mut out, &mut mask)
                    .unwrap(),
            )
        });
    });
}

fn bench_compile_hex(c: &mut Criterion) {
    let space = SpaceKind::Hex2D { rows: 100, cols: 100 }.build().unwrap();
    let spec = ObsSpec::new(vec![ObsEntry::new(HEAT, RegionSpec::All)]);

    c.bench_function("obs_compile_hex_10k", |b| {
        b.iter(|| black_box(ObsPlan::compile(&spec, space.as_ref()).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_compile,
    bench_execute_10k,
    bench_execute_pooled,
    bench_execute_agents_16,
    bench_compile_hex
);
criterion_main!(benches);
