//! Topology-agnostic diffusion and decay.
//!
//! One explicit-Euler step of
//!
//! ```text
//! u' = u + D·dt·(nbr_sum − deg·u) − λ·dt·u
//! ```
//!
//! where `nbr_sum` is gathered through the world's [`Adjacency`] table. The
//! previous-tick field is copied into a buffer one slot longer than the
//! cell count and the extra slot is zero, so padded rows (which point at
//! the sentinel rank) add nothing to the sum. The kernel never looks at
//! coordinates: grids, hex lattices, FCC lattices and product spaces all
//! go through the same loop.
//!
//! The update is only non-negative and non-oscillating while
//! `max_degree·D·dt + λ·dt < 1`. That bound is checked when the world is
//! built (and when the propagator is registered, if the space and dt are
//! already known), never at step time.
//!
//! [`Adjacency`]: tessera_space::Adjacency

use crate::{unreadable, unwritable};
use tessera_core::{FieldId, FieldSet, PropagatorError};
use tessera_propagator::{Propagator, StepContext, WriteMode};
use tessera_space::Space;

/// Graph-Laplacian diffusion of a single scalar field.
///
/// Reads the field's previous-tick value and writes it in
/// [`WriteMode::Full`].
///
/// ```
/// use tessera_core::FieldId;
/// use tessera_propagators::GraphDiffusion;
///
/// let heat = GraphDiffusion::builder()
///     .field(FieldId(0))
///     .coefficient(0.1)
///     .decay(0.01)
///     .source(0, 10.0)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone, Debug)]
pub struct GraphDiffusion {
    field: FieldId,
    coefficient: f64,
    decay: f64,
    sources: Vec<(usize, f32)>,
    clamp_non_negative: bool,
}

/// Builder for [`GraphDiffusion`]. `field` is required.
#[derive(Clone, Debug)]
pub struct GraphDiffusionBuilder {
    field: Option<FieldId>,
    coefficient: f64,
    decay: f64,
    sources: Vec<(usize, f32)>,
    clamp_non_negative: bool,
}

impl GraphDiffusion {
    /// Start configuring a diffusion propagator.
    pub fn builder() -> GraphDiffusionBuilder {
        GraphDiffusionBuilder {
            field: None,
            coefficient: 0.0,
            decay: 0.0,
            sources: Vec::new(),
            clamp_non_negative: true,
        }
    }

    /// The diffused field.
    pub fn field(&self) -> FieldId {
        self.field
    }

    /// `max_degree·D + λ`; the stability bound is `rate·dt < 1`.
    fn rate(&self, space: &dyn Space) -> f64 {
        space.max_degree() as f64 * self.coefficient + self.decay
    }

    /// Check the stability bound and source ranks against `space` and `dt`.
    ///
    /// # Errors
    ///
    /// A description naming the offending values.
    pub fn validate_for(&self, space: &dyn Space, dt: f64) -> Result<(), String> {
        let product = self.rate(space) * dt;
        if product >= 1.0 {
            return Err(format!(
                "unstable: max_degree({}) * D({}) * dt({dt}) + decay({}) * dt = {product} must be < 1",
                space.max_degree(),
                self.coefficient,
                self.decay,
            ));
        }
        let cells = space.cell_count();
        if let Some(&(rank, _)) = self.sources.iter().find(|(rank, _)| *rank >= cells) {
            return Err(format!(
                "source rank {rank} out of range for {cells} cells"
            ));
        }
        Ok(())
    }
}

impl GraphDiffusionBuilder {
    /// Field to diffuse.
    pub fn field(mut self, field: FieldId) -> Self {
        self.field = Some(field);
        self
    }

    /// Diffusion coefficient `D` (default 0).
    pub fn coefficient(mut self, coefficient: f64) -> Self {
        self.coefficient = coefficient;
        self
    }

    /// Decay rate `λ` (default 0).
    pub fn decay(mut self, decay: f64) -> Self {
        self.decay = decay;
        self
    }

    /// Pin cell `rank` to `value` after every update.
    pub fn source(mut self, rank: usize, value: f32) -> Self {
        self.sources.push((rank, value));
        self
    }

    /// Clamp updated values to `>= 0` (default on).
    pub fn clamp_non_negative(mut self, clamp: bool) -> Self {
        self.clamp_non_negative = clamp;
        self
    }

    /// Finish the builder.
    ///
    /// # Errors
    ///
    /// `field` missing, `D` or `λ` negative or non-finite, or a source
    /// value that is not finite.
    pub fn build(self) -> Result<GraphDiffusion, String> {
        let field = self.field.ok_or_else(|| "field is required".to_string())?;
        if !self.coefficient.is_finite() || self.coefficient < 0.0 {
            return Err(format!(
                "coefficient must be finite and >= 0, got {}",
                self.coefficient
            ));
        }
        if !self.decay.is_finite() || self.decay < 0.0 {
            return Err(format!("decay must be finite and >= 0, got {}", self.decay));
        }
        if let Some(&(rank, value)) = self.sources.iter().find(|(_, v)| !v.is_finite()) {
            return Err(format!("source at rank {rank} has non-finite value {value}"));
        }
        Ok(GraphDiffusion {
            field,
            coefficient: self.coefficient,
            decay: self.decay,
            sources: self.sources,
            clamp_non_negative: self.clamp_non_negative,
        })
    }
}

impl Propagator for GraphDiffusion {
    fn name(&self) -> &str {
        "GraphDiffusion"
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

    fn max_dt(&self, space: &dyn Space) -> Option<f64> {
        let rate = self.rate(space);
        (rate > 0.0).then(|| 1.0 / rate)
    }

    fn validate(&self, space: &dyn Space, dt: f64) -> Result<(), String> {
        self.validate_for(space, dt)
    }

    fn step(&self, ctx: &mut StepContext<'_>) -> Result<(), PropagatorError> {
        let n = ctx.adjacency().cell_count();
        let prev = ctx
            .reads_previous()
            .read(self.field)
            .ok_or_else(|| unreadable(self.field))?;
        if prev.len() != n {
            return Err(PropagatorError::ExecutionFailed {
                reason: format!("field {} has {} cells, topology has {n}", self.field, prev.len()),
            });
        }
        let mut padded = Vec::with_capacity(n + 1);
        padded.extend_from_slice(prev);
        padded.push(0.0f32);

        let dt = ctx.dt();
        let diffuse = self.coefficient * dt;
        let decay = self.decay * dt;
        let adjacency = ctx.adjacency();
        let width = adjacency.width();
        let table = adjacency.table();
        let next: Vec<f32> = (0..n)
            .map(|i| {
                let u = padded[i] as f64;
                let nbr_sum: f64 = table[i * width..(i + 1) * width]
                    .iter()
                    .map(|&nb| padded[nb] as f64)
                    .sum();
                let laplacian = nbr_sum - adjacency.degrees()[i] as f64 * u;
                let v = (u + diffuse * laplacian - decay * u) as f32;
                if self.clamp_non_negative {
                    v.max(0.0)
                } else {
                    v
                }
            })
            .collect();

        let out = ctx.writes().write(self.field).ok_or_else(|| unwritable(self.field))?;
        out.copy_from_slice(&next);
        for &(rank, value) in &self.sources {
            if let Some(cell) = out.get_mut(rank) {
                *cell = value;
            }
        }
        Ok(())
    }
}
