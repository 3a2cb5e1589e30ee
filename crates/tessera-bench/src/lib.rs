//! Benchmark profiles for the Tessera simulation substrate.
//!
//! - [`reference_profile`]: 100x100 grid (10K cells), diffusion plus noise
//! - [`stress_profile`]: 316x316 grid (~100K cells), same pipeline
//! - [`source_ranks`]: deterministic heat-source placement from a seed

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::collections::BTreeSet;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tessera_core::{FieldDef, FieldId, FieldMutability};
use tessera_engine::{ConfigError, WorldConfig};
use tessera_obs::{ObsEntry, ObsSpec, ObsTransform};
use tessera_propagators::{GraphDiffusion, NoiseInjection};
use tessera_space::{EdgeBehavior, RegionSpec, SpaceKind};

/// Diffusing scalar, field 0 of every profile.
pub const HEAT: FieldId = FieldId(0);
/// Per-tick noise, field 1 of every profile.
pub const JITTER: FieldId = FieldId(1);

/// Build the 10K-cell reference profile.
///
/// Pipeline: GraphDiffusion(D=0.1, 4 sources) then NoiseInjection(0.01).
/// dt=0.5 sits inside the Square4 stability bound of 1/(4*0.1) = 2.5.
pub fn reference_profile(seed: u64) -> Result<WorldConfig, ConfigError> {
    grid_profile(100, seed)
}

/// Build the ~100K-cell stress profile.
///
/// Same pipeline as [`reference_profile`] at ten times the cell count.
pub fn stress_profile(seed: u64) -> Result<WorldConfig, ConfigError> {
    grid_profile(316, seed)
}

/// Observe both profile fields over the whole grid, heat normalised to `[0, 1]`.
pub fn profile_obs_spec() -> ObsSpec {
    ObsSpec::new(vec![
        ObsEntry::new(HEAT, RegionSpec::All)
            .with_transform(ObsTransform::Normalize { min: 0.0, max: 10.0 }),
        ObsEntry::new(JITTER, RegionSpec::All),
    ])
}

/// `n` distinct ranks below `cell_count`, the same for the same seed.
///
/// `n` is capped at `cell_count`.
pub fn source_ranks(cell_count: usize, n: usize, seed: u64) -> Vec<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut chosen = BTreeSet::new();
    let n = n.min(cell_count);
    while chosen.len() < n {
        chosen.insert(rng.random_range(0..cell_count));
    }
    chosen.into_iter().collect()
}

fn grid_profile(side: u32, seed: u64) -> Result<WorldConfig, ConfigError> {
    let cells = (side * side) as usize;
    let mut diffusion = GraphDiffusion::builder().field(HEAT).coefficient(0.1);
    for rank in source_ranks(cells, 4, seed) {
        diffusion = diffusion.source(rank, 5.0);
    }

    let mut cfg = WorldConfig::new();
    cfg.set_space(SpaceKind::Square4 {
        rows: side,
        cols: side,
        edge: EdgeBehavior::Absorb,
    })?
    .set_dt(0.5)?
    .set_seed(seed)?;
    cfg.add_field(FieldDef::scalar("heat", FieldMutability::Sparse))?;
    cfg.add_field(FieldDef::scalar("jitter", FieldMutability::PerTick))?;
    cfg.add_propagator(diffusion.build()?)?
        .add_propagator(NoiseInjection::new(JITTER, 0.01)?)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_engine::World;

    #[test]
    fn reference_profile_builds_and_steps() {
        let mut world = World::new(reference_profile(42).unwrap()).unwrap();
        world.step(&[]).unwrap();
        let heat = world.read(HEAT).unwrap();
        assert_eq!(heat.len(), 10_000);
        assert!(heat.iter().any(|&v| v > 0.0));
    }

    #[test]
    fn stress_profile_builds() {
        let world = World::new(stress_profile(7).unwrap()).unwrap();
        assert_eq!(world.read(HEAT).unwrap().len(), 316 * 316);
    }

    #[test]
    fn source_ranks_distinct_and_in_range() {
        let ranks = source_ranks(100, 10, 42);
        assert_eq!(ranks.len(), 10);
        assert_eq!(ranks.iter().collect::<BTreeSet<_>>().len(), 10);
        assert!(ranks.iter().all(|&r| r < 100));
    }

    #[test]
    fn source_ranks_deterministic() {
        assert_eq!(source_ranks(1000, 5, 9), source_ranks(1000, 5, 9));
        assert_eq!(source_ranks(3, 10, 1), vec![0, 1, 2]);
    }
}
