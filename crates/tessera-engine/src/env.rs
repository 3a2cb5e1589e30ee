//! Episodic environment over a [`BatchedWorld`].
//!
//! [`BatchedEnv`] adds rewards, termination and auto-reset to a batch of
//! worlds, following the usual vectorized-environment conventions: a done
//! world's final observation is returned alongside the observation of its
//! fresh episode. Task logic lives in an [`EnvHooks`] implementation.
//!
//! Per-world episode state is kept as parallel arrays indexed by world.

use thiserror::Error;
use tracing::{debug, info};

use tessera_core::{Command, TickId};
use tessera_obs::ObsSpec;

use crate::batched::{BatchError, BatchedWorld};
use crate::config::WorldConfig;

/// Errors from [`BatchedEnv`].
#[derive(Debug, Error)]
pub enum EnvError {
    /// The underlying batch failed.
    #[error(transparent)]
    Batch(#[from] BatchError),
    /// A hook returned the wrong number of per-world values.
    #[error("hook {hook} returned {got} values, expected {expected}")]
    Hook {
        /// Which hook.
        hook: &'static str,
        /// One per world.
        expected: usize,
        /// What it returned.
        got: usize,
    },
    /// The environment was closed.
    #[error("environment is closed")]
    Closed,
}

/// Observations of every world, `per_world` floats each.
#[derive(Clone, Copy, Debug)]
pub struct ObsBatch<'a> {
    data: &'a [f32],
    per_world: usize,
}

impl<'a> ObsBatch<'a> {
    /// Wrap a flat buffer.
    pub fn new(data: &'a [f32], per_world: usize) -> Self {
        Self { data, per_world }
    }

    /// Observation of world `i`.
    pub fn world(&self, i: usize) -> &'a [f32] {
        &self.data[i * self.per_world..(i + 1) * self.per_world]
    }

    /// One slice per world.
    pub fn iter(&self) -> impl Iterator<Item = &'a [f32]> {
        self.data.chunks(self.per_world.max(1))
    }

    /// The whole buffer.
    pub fn as_flat(&self) -> &'a [f32] {
        self.data
    }

    /// Number of worlds.
    pub fn num_worlds(&self) -> usize {
        self.data.len().checked_div(self.per_world).unwrap_or(0)
    }
}

/// Task logic plugged into a [`BatchedEnv`].
///
/// Every method has a neutral default: no commands, zero reward, never
/// done. Per-world outputs must have one entry per world.
pub trait EnvHooks {
    /// What the policy emits per step.
    type Action;

    /// Turn actions into one command list per world.
    fn actions_to_commands(
        &mut self,
        actions: &[Self::Action],
        num_worlds: usize,
    ) -> Vec<Vec<Command>> {
        let _ = actions;
        vec![Vec::new(); num_worlds]
    }

    /// Reward of every world after a step.
    fn compute_rewards(&mut self, obs: ObsBatch<'_>, tick_ids: &[TickId]) -> Vec<f64> {
        let _ = obs;
        vec![0.0; tick_ids.len()]
    }

    /// Whether each world reached a terminal state.
    fn check_terminated(&mut self, obs: ObsBatch<'_>, tick_ids: &[TickId]) -> Vec<bool> {
        let _ = obs;
        vec![false; tick_ids.len()]
    }

    /// Whether each world hit an external limit such as a time cap.
    fn check_truncated(&mut self, obs: ObsBatch<'_>, tick_ids: &[TickId]) -> Vec<bool> {
        let _ = obs;
        vec![false; tick_ids.len()]
    }

    /// Called after world `world` was reset with `seed`.
    fn on_reset(&mut self, world: usize, seed: u64) {
        let _ = (world, seed);
    }
}

/// What happens to a world right after it is reset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResetPolicy {
    /// Empty-command ticks run after every reset, initial and automatic
    /// alike, before the world is observed.
    pub warmup_ticks: u32,
}

/// Settings for a [`BatchedEnv`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EnvConfig {
    /// Seeds for auto-resets derive from this.
    pub base_seed: u64,
    /// Post-reset behaviour.
    pub reset_policy: ResetPolicy,
}

/// Seeds for [`BatchedEnv::reset`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ResetSeeds {
    /// World `i` gets `base_seed + i`.
    #[default]
    Default,
    /// World `i` gets `seed + i`; `seed` becomes the new base seed.
    Scalar(u64),
    /// One seed per world.
    List(Vec<u64>),
}

/// Result of [`BatchedEnv::step`].
#[derive(Clone, Debug, PartialEq)]
pub struct StepOutput {
    /// Current observations, post-reset for worlds that finished.
    pub observations: Vec<f32>,
    /// Validity mask matching `observations`.
    pub masks: Vec<u8>,
    /// Reward per world.
    pub rewards: Vec<f64>,
    /// Terminal flag per world.
    pub terminated: Vec<bool>,
    /// Truncation flag per world.
    pub truncated: Vec<bool>,
    /// Last observation of each world that finished this step.
    pub final_observations: Vec<Option<Vec<f32>>>,
    /// Return of each episode that finished this step.
    pub final_returns: Vec<Option<f64>>,
    /// Tick each world reached in the step, before any reset.
    pub tick_ids: Vec<TickId>,
}

/// Running totals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EnvStats {
    /// Calls to [`BatchedEnv::step`] that advanced the worlds.
    pub steps: u64,
    /// Worlds reset automatically.
    pub auto_resets: u64,
    /// Extra observation passes run after auto-resets.
    pub reobservations: u64,
}

/// Vectorized episodic environment.
pub struct BatchedEnv<H: EnvHooks> {
    batch: BatchedWorld,
    hooks: H,
    config: EnvConfig,
    obs: Vec<f32>,
    mask: Vec<u8>,
    episode_counts: Vec<u64>,
    episode_steps: Vec<u64>,
    episode_returns: Vec<f64>,
    stats: EnvStats,
    closed: bool,
}

impl<H: EnvHooks> BatchedEnv<H> {
    /// Build the batch from `configs` and wrap it.
    pub fn new(
        configs: Vec<WorldConfig>,
        spec: &ObsSpec,
        hooks: H,
        config: EnvConfig,
    ) -> Result<Self, EnvError> {
        let batch = BatchedWorld::new(configs, spec)?;
        let n = batch.num_worlds();
        let len = n * batch.output_len();
        info!(worlds = n, warmup = config.reset_policy.warmup_ticks, "batched env created");
        Ok(Self {
            obs: vec![0.0; len],
            mask: vec![0; len],
            episode_counts: vec![0; n],
            episode_steps: vec![0; n],
            episode_returns: vec![0.0; n],
            batch,
            hooks,
            config,
            stats: EnvStats::default(),
            closed: false,
        })
    }

    /// Build `num_worlds` configs with `factory(i)` and wrap them.
    pub fn from_factory(
        num_worlds: usize,
        factory: impl FnMut(usize) -> WorldConfig,
        spec: &ObsSpec,
        hooks: H,
        config: EnvConfig,
    ) -> Result<Self, EnvError> {
        Self::new((0..num_worlds).map(factory).collect(), spec, hooks, config)
    }

    /// Reset every world and return the initial observations.
    pub fn reset(&mut self, seeds: ResetSeeds) -> Result<&[f32], EnvError> {
        self.check_open()?;
        let n = self.num_worlds();
        let seeds: Vec<u64> = match seeds {
            ResetSeeds::Default => (0..n as u64)
                .map(|i| self.config.base_seed.wrapping_add(i))
                .collect(),
            ResetSeeds::Scalar(base) => {
                self.config.base_seed = base;
                (0..n as u64).map(|i| base.wrapping_add(i)).collect()
            }
            ResetSeeds::List(seeds) => seeds,
        };
        self.batch.reset_all(&seeds)?;
        for (i, &seed) in seeds.iter().enumerate() {
            self.hooks.on_reset(i, seed);
        }
        self.episode_counts.fill(0);
        self.episode_steps.fill(0);
        self.episode_returns.fill(0.0);

        let all: Vec<usize> = (0..n).collect();
        self.batch
            .advance_worlds(&all, self.config.reset_policy.warmup_ticks)?;
        self.batch.observe_all(&mut self.obs, &mut self.mask)?;
        debug!(worlds = n, "env reset");
        Ok(&self.obs)
    }

    /// Act, step every world, score, and auto-reset finished worlds.
    ///
    /// # Errors
    ///
    /// [`EnvError::Batch`] as [`BatchedWorld::step_and_observe`].
    /// [`EnvError::Hook`] if a hook returns the wrong number of values; the
    /// worlds have already advanced by then and
    /// [`episode_steps`](Self::episode_steps) counts the tick.
    pub fn step(&mut self, actions: &[H::Action]) -> Result<StepOutput, EnvError> {
        self.check_open()?;
        let n = self.num_worlds();
        let per = self.batch.output_len();

        let commands = self.hooks.actions_to_commands(actions, n);
        let tick_ids = self
            .batch
            .step_and_observe(&commands, &mut self.obs, &mut self.mask)?;
        // The worlds have committed this tick; count it even if a hook fails.
        for steps in &mut self.episode_steps {
            *steps += 1;
        }
        self.stats.steps += 1;

        let view = ObsBatch::new(&self.obs, per);
        let rewards = self.hooks.compute_rewards(view, &tick_ids);
        let terminated = self.hooks.check_terminated(view, &tick_ids);
        let truncated = self.hooks.check_truncated(view, &tick_ids);
        check_len("compute_rewards", n, rewards.len())?;
        check_len("check_terminated", n, terminated.len())?;
        check_len("check_truncated", n, truncated.len())?;

        for (ret, r) in self.episode_returns.iter_mut().zip(&rewards) {
            *ret += r;
        }

        let done: Vec<usize> = terminated
            .iter()
            .zip(&truncated)
            .enumerate()
            .filter_map(|(i, (&t, &u))| (t || u).then_some(i))
            .collect();

        let mut final_observations = vec![None; n];
        let mut final_returns = vec![None; n];
        for &i in &done {
            final_observations[i] = Some(view.world(i).to_vec());
            final_returns[i] = Some(self.episode_returns[i]);
        }
        for &i in &done {
            self.episode_counts[i] += 1;
            let seed = episode_seed(self.config.base_seed, i, n, self.episode_counts[i]);
            self.batch.reset_world(i, seed)?;
            self.hooks.on_reset(i, seed);
            self.episode_steps[i] = 0;
            self.episode_returns[i] = 0.0;
            debug!(world = i, seed, episode = self.episode_counts[i], "auto-reset");
        }

        if !done.is_empty() {
            self.batch
                .advance_worlds(&done, self.config.reset_policy.warmup_ticks)?;
            self.batch.observe_all(&mut self.obs, &mut self.mask)?;
            self.stats.auto_resets += done.len() as u64;
            self.stats.reobservations += 1;
        }

        Ok(StepOutput {
            observations: self.obs.clone(),
            masks: self.mask.clone(),
            rewards,
            terminated,
            truncated,
            final_observations,
            final_returns,
            tick_ids,
        })
    }

    /// Destroy the batch. Idempotent.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.batch.destroy();
            debug!("env closed");
        }
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of worlds.
    pub fn num_worlds(&self) -> usize {
        self.batch.num_worlds()
    }

    /// Observation floats per world.
    pub fn obs_output_len(&self) -> usize {
        self.batch.output_len()
    }

    /// Mask bytes per world.
    pub fn obs_mask_len(&self) -> usize {
        self.batch.mask_len()
    }

    /// Latest observations.
    pub fn observations(&self) -> ObsBatch<'_> {
        ObsBatch::new(&self.obs, self.batch.output_len())
    }

    /// Finished episodes per world since the last [`reset`](Self::reset).
    pub fn episode_counts(&self) -> &[u64] {
        &self.episode_counts
    }

    /// Steps taken in each world's current episode.
    pub fn episode_steps(&self) -> &[u64] {
        &self.episode_steps
    }

    /// Reward accumulated in each world's current episode.
    pub fn episode_returns(&self) -> &[f64] {
        &self.episode_returns
    }

    /// Running totals.
    pub fn stats(&self) -> EnvStats {
        self.stats
    }

    /// The hooks.
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// The underlying batch.
    pub fn batch(&self) -> &BatchedWorld {
        &self.batch
    }

    fn check_open(&self) -> Result<(), EnvError> {
        if self.closed {
            Err(EnvError::Closed)
        } else {
            Ok(())
        }
    }
}

/// Seed of world `i`'s episode number `episode` (0 is the first).
fn episode_seed(base: u64, i: usize, n: usize, episode: u64) -> u64 {
    base.wrapping_add(i as u64)
        .wrapping_add((n as u64).wrapping_mul(episode))
}

fn check_len(hook: &'static str, expected: usize, got: usize) -> Result<(), EnvError> {
    if expected == got {
        Ok(())
    } else {
        Err(EnvError::Hook { hook, expected, got })
    }
}

impl<H: EnvHooks> std::fmt::Debug for BatchedEnv<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchedEnv")
            .field("worlds", &self.num_worlds())
            .field("config", &self.config)
            .field("stats", &self.stats)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn obs_batch_slices_by_world() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let b = ObsBatch::new(&data, 2);
        assert_eq!(b.num_worlds(), 3);
        assert_eq!(b.world(1), &[3.0, 4.0]);
        assert_eq!(b.iter().count(), 3);
    }

    #[test]
    fn episode_seeds_never_collide_within_a_batch() {
        let n = 4;
        let mut seen = std::collections::HashSet::new();
        for episode in 0..5 {
            for i in 0..n {
                assert!(seen.insert(episode_seed(100, i, n, episode)));
            }
        }
        assert_eq!(episode_seed(100, 2, 4, 0), 102);
        assert_eq!(episode_seed(100, 2, 4, 1), 106);
    }

    #[test]
    fn hook_length_checked() {
        assert!(check_len("compute_rewards", 2, 2).is_ok());
        let err = check_len("check_truncated", 4, 3).unwrap_err();
        assert_eq!(err.to_string(), "hook check_truncated returned 3 values, expected 4");
    }
}
