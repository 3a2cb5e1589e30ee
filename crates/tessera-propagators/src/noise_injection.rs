//! Additive Gaussian noise.
//!
//! Samples come from the world's RNG through [`StepContext::rng`], so a
//! world reset with the same seed replays the same noise.

use crate::{unreadable, unwritable};
use rand::Rng;
use tessera_core::{FieldId, FieldSet, PropagatorError};
use tessera_propagator::{Propagator, StepContext, WriteMode};

/// Adds `scale · N(0, 1)` to every cell of a field each tick.
#[derive(Clone, Copy, Debug)]
pub struct NoiseInjection {
    field: FieldId,
    scale: f64,
}

impl NoiseInjection {
    /// Noise with standard deviation `scale` on `field`.
    ///
    /// # Errors
    ///
    /// `scale` negative or non-finite.
    pub fn new(field: FieldId, scale: f64) -> Result<Self, String> {
        if !scale.is_finite() || scale < 0.0 {
            return Err(format!("scale must be finite and >= 0, got {scale}"));
        }
        Ok(Self { field, scale })
    }

    /// Box-Muller transform.
    fn gaussian<R: Rng + ?Sized>(rng: &mut R) -> f64 {
        let u1: f64 = rng.random::<f64>().max(f64::MIN_POSITIVE);
        let u2: f64 = rng.random();
        (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }
}

impl Propagator for NoiseInjection {
    fn name(&self) -> &str {
        "NoiseInjection"
    }

    fn reads(&self) -> FieldSet {
        FieldSet::empty()
    }

    fn reads_previous(&self) -> FieldSet {
        [self.field].into_iter().collect()
    }

    fn writes(&self) -> Vec<(FieldId, WriteMode)> {
        vec![(self.field, WriteMode::Full)]
    }

    fn step(&self, ctx: &mut StepContext<'_>) -> Result<(), PropagatorError> {
        let prev = ctx
            .reads_previous()
            .read(self.field)
            .ok_or_else(|| unreadable(self.field))?
            .to_vec();
        let noise: Vec<f64> = (0..prev.len())
            .map(|_| self.scale * Self::gaussian(ctx.rng()))
            .collect();
        let out = ctx.writes().write(self.field).ok_or_else(|| unwritable(self.field))?;
        if out.len() != prev.len() {
            return Err(PropagatorError::ExecutionFailed {
                reason: format!("length mismatch: {} vs {}", prev.len(), out.len()),
            });
        }
        for ((o, &p), n) in out.iter_mut().zip(&prev).zip(noise) {
            *o = (p as f64 + n) as f32;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use tessera_core::TickId;
    use tessera_space::{Adjacency, EdgeBehavior, Line1D};
    use tessera_test_utils::{MockFieldReader, MockFieldWriter};

    fn noisy(prop: &NoiseInjection, seed: u64) -> Vec<f32> {
        let f = prop.field;
        let space = Line1D::new(64, EdgeBehavior::Absorb).unwrap();
        let adjacency = Adjacency::build(&space).unwrap();
        let mut prev = MockFieldReader::new();
        prev.set_field(f, vec![1.0; 64]);
        let mut writer = MockFieldWriter::new();
        writer.add_field(f, 64);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut ctx = StepContext::new(
            &prev, &prev, &mut writer, &space, &adjacency, &mut rng, TickId(1), 1.0,
        );
        prop.step(&mut ctx).unwrap();
        writer.get_field(f).unwrap().to_vec()
    }

    #[test]
    fn same_seed_same_noise() {
        let prop = NoiseInjection::new(FieldId(0), 0.5).unwrap();
        assert_eq!(noisy(&prop, 7), noisy(&prop, 7));
        assert_ne!(noisy(&prop, 7), noisy(&prop, 8));
    }

    #[test]
    fn zero_scale_is_identity() {
        let prop = NoiseInjection::new(FieldId(0), 0.0).unwrap();
        assert!(noisy(&prop, 1).iter().all(|&v| v == 1.0));
    }

    #[test]
    fn negative_scale_rejected() {
        assert!(NoiseInjection::new(FieldId(0), -1.0).is_err());
        assert!(NoiseInjection::new(FieldId(0), f64::NAN).is_err());
    }

    #[test]
    fn samples_are_centred() {
        let prop = NoiseInjection::new(FieldId(0), 1.0).unwrap();
        let out = noisy(&prop, 3);
        let mean = out.iter().map(|&v| v as f64 - 1.0).sum::<f64>() / out.len() as f64;
        assert!(mean.abs() < 0.5, "mean {mean}");
    }
}
