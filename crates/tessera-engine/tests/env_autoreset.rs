//! Integration tests: episodic batch environment.

use tessera_core::{Command, FieldDef, FieldId, FieldMutability, TickId};
use tessera_engine::{
    BatchError, BatchedEnv, EnvConfig, EnvError, EnvHooks, ObsBatch, ResetPolicy, ResetSeeds,
    WorldConfig,
};
use tessera_obs::{ObsEntry, ObsSpec};
use tessera_space::{EdgeBehavior, RegionSpec, SpaceKind};
use tessera_test_utils::AddPropagator;

const COUNTER: FieldId = FieldId(0);

/// Three cells whose value grows by one per tick.
fn counter_config(_: usize) -> WorldConfig {
    let mut cfg = WorldConfig::new();
    cfg.set_space(SpaceKind::Line1D {
        len: 3,
        edge: EdgeBehavior::Absorb,
    })
    .unwrap();
    let f = cfg
        .add_field(FieldDef::scalar("counter", FieldMutability::Sparse))
        .unwrap();
    cfg.add_propagator(AddPropagator::new("tick", f, 1.0)).unwrap();
    cfg
}

fn spec() -> ObsSpec {
    ObsSpec::new(vec![ObsEntry::new(COUNTER, RegionSpec::All)])
}

/// Action `Some(v)` writes `v` into cell 0 of that world; episodes end
/// when cell 1 reaches `horizon[i]`.
#[derive(Default)]
struct Countdown {
    horizon: Vec<f32>,
    resets: Vec<(usize, u64)>,
}

impl EnvHooks for Countdown {
    type Action = Option<f32>;

    fn actions_to_commands(
        &mut self,
        actions: &[Option<f32>],
        num_worlds: usize,
    ) -> Vec<Vec<Command>> {
        (0..num_worlds)
            .map(|i| match actions.get(i).copied().flatten() {
                Some(v) => vec![Command::set(COUNTER, [0], v)],
                None => Vec::new(),
            })
            .collect()
    }

    fn compute_rewards(&mut self, obs: ObsBatch<'_>, _: &[TickId]) -> Vec<f64> {
        obs.iter().map(|o| f64::from(o[1])).collect()
    }

    fn check_terminated(&mut self, obs: ObsBatch<'_>, _: &[TickId]) -> Vec<bool> {
        obs.iter()
            .zip(&self.horizon)
            .map(|(o, &h)| o[1] >= h)
            .collect()
    }

    fn on_reset(&mut self, world: usize, seed: u64) {
        self.resets.push((world, seed));
    }
}

fn env(horizon: Vec<f32>, warmup_ticks: u32) -> BatchedEnv<Countdown> {
    let n = horizon.len();
    BatchedEnv::from_factory(
        n,
        counter_config,
        &spec(),
        Countdown {
            horizon,
            resets: Vec::new(),
        },
        EnvConfig {
            base_seed: 10,
            reset_policy: ResetPolicy { warmup_ticks },
        },
    )
    .unwrap()
}

#[test]
fn reset_seeds_follow_the_requested_scheme() {
    let mut e = env(vec![100.0; 3], 0);
    e.reset(ResetSeeds::Default).unwrap();
    assert_eq!(e.hooks().resets, vec![(0, 10), (1, 11), (2, 12)]);

    let mut e = env(vec![100.0; 3], 0);
    e.reset(ResetSeeds::Scalar(7)).unwrap();
    assert_eq!(e.hooks().resets, vec![(0, 7), (1, 8), (2, 9)]);

    let mut e = env(vec![100.0; 3], 0);
    e.reset(ResetSeeds::List(vec![5, 3, 1])).unwrap();
    assert_eq!(e.hooks().resets, vec![(0, 5), (1, 3), (2, 1)]);

    let mut e = env(vec![100.0; 3], 0);
    assert!(matches!(
        e.reset(ResetSeeds::List(vec![1])),
        Err(EnvError::Batch(BatchError::InvalidArgument { .. }))
    ));
}

#[test]
fn finished_worlds_reset_and_keep_final_observation() {
    let mut e = env(vec![2.0, 100.0], 0);
    let initial = e.reset(ResetSeeds::Default).unwrap().to_vec();
    assert_eq!(initial, vec![0.0; 6]);

    let first = e.step(&[None, None]).unwrap();
    assert_eq!(first.terminated, vec![false, false]);
    assert!(first.final_observations.iter().all(Option::is_none));
    assert_eq!(e.stats().reobservations, 0);

    let second = e.step(&[None, None]).unwrap();
    assert_eq!(second.terminated, vec![true, false]);
    assert_eq!(second.tick_ids, vec![TickId(2), TickId(2)]);
    assert_eq!(second.final_observations[0], Some(vec![2.0; 3]));
    assert_eq!(second.final_returns[0], Some(3.0));
    assert_eq!(second.final_observations[1], None);
    assert_eq!(&second.observations[..3], &[0.0; 3], "world 0 restarted");
    assert_eq!(&second.observations[3..], &[2.0; 3], "world 1 untouched");
    assert_eq!(e.stats().reobservations, 1);
    assert_eq!(e.episode_counts(), &[1, 0]);
    assert_eq!(e.episode_steps(), &[0, 2]);
    assert_eq!(e.hooks().resets.last(), Some(&(0, 10 + 2)));
}

#[test]
fn one_reobservation_however_many_worlds_finish() {
    let mut e = env(vec![1.0; 4], 0);
    e.reset(ResetSeeds::Default).unwrap();
    let out = e.step(&[None; 4]).unwrap();
    assert!(out.terminated.iter().all(|&t| t));
    let stats = e.stats();
    assert_eq!(stats.auto_resets, 4);
    assert_eq!(stats.reobservations, 1);
    assert_eq!(stats.steps, 1);
}

#[test]
fn auto_reset_seeds_advance_per_episode() {
    let mut e = env(vec![1.0, 1.0], 0);
    e.reset(ResetSeeds::Default).unwrap();
    e.step(&[None, None]).unwrap();
    e.step(&[None, None]).unwrap();
    let auto: Vec<_> = e.hooks().resets[2..].to_vec();
    assert_eq!(auto, vec![(0, 12), (1, 13), (0, 14), (1, 15)]);
}

#[test]
fn warmup_applies_to_initial_and_automatic_resets() {
    let mut e = env(vec![5.0], 2);
    let initial = e.reset(ResetSeeds::Default).unwrap().to_vec();
    assert_eq!(initial, vec![2.0; 3]);

    let mut last = None;
    for _ in 0..3 {
        last = Some(e.step(&[None]).unwrap());
    }
    let out = last.unwrap();
    assert_eq!(out.terminated, vec![true]);
    assert_eq!(out.final_observations[0], Some(vec![5.0; 3]));
    assert_eq!(out.observations, vec![2.0; 3], "fresh episode warmed up like the first");
}

#[test]
fn actions_become_commands() {
    let mut e = env(vec![100.0, 100.0], 0);
    e.reset(ResetSeeds::Default).unwrap();
    let out = e.step(&[Some(9.0), None]).unwrap();
    assert_eq!(out.observations, vec![9.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
    assert_eq!(out.rewards, vec![1.0, 1.0]);
}

#[test]
fn close_is_idempotent() {
    let mut e = env(vec![1.0], 0);
    e.reset(ResetSeeds::Default).unwrap();
    e.close();
    e.close();
    assert!(e.is_closed());
    assert!(matches!(e.step(&[None]), Err(EnvError::Closed)));
    assert!(matches!(e.reset(ResetSeeds::Default), Err(EnvError::Closed)));
}

struct ShortRewards;

impl EnvHooks for ShortRewards {
    type Action = ();

    fn compute_rewards(&mut self, _: ObsBatch<'_>, _: &[TickId]) -> Vec<f64> {
        vec![0.0]
    }
}

#[test]
fn hook_output_length_checked() {
    let mut e =
        BatchedEnv::from_factory(2, counter_config, &spec(), ShortRewards, EnvConfig::default())
            .unwrap();
    e.reset(ResetSeeds::Default).unwrap();
    let before = e.batch().tick_ids();
    assert!(matches!(
        e.step(&[(), ()]),
        Err(EnvError::Hook {
            hook: "compute_rewards",
            expected: 2,
            got: 1
        })
    ));

    // The worlds committed the tick before the hook failed; the episode
    // bookkeeping follows them.
    let advanced: Vec<u64> = e
        .batch()
        .tick_ids()
        .iter()
        .zip(&before)
        .map(|(after, before)| after.0 - before.0)
        .collect();
    assert_eq!(advanced, vec![1, 1]);
    assert_eq!(e.episode_steps(), &advanced[..]);
    assert_eq!(e.episode_returns(), &[0.0, 0.0]);
    assert_eq!(e.stats().steps, 1);
}
