//! Execution context handed to a propagator for one tick.

use rand_chacha::ChaCha8Rng;
use tessera_core::{FieldReader, FieldWriter, TickId};
use tessera_space::{Adjacency, Space};

/// Everything a propagator may touch during `step`.
///
/// Field access goes through trait objects so the same propagator runs
/// against the engine's buffers or against mocks in tests.
///
/// - [`reads`](Self::reads): current-tick view. Sees buffers written by
///   earlier propagators this tick, otherwise the committed state.
/// - [`reads_previous`](Self::reads_previous): the committed state from the
///   end of the previous tick, regardless of pipeline order (Jacobi reads).
/// - [`writes`](Self::writes): the propagator's declared output buffers.
pub struct StepContext<'a> {
    reads: &'a dyn FieldReader,
    reads_previous: &'a dyn FieldReader,
    writes: &'a mut dyn FieldWriter,
    space: &'a dyn Space,
    adjacency: &'a Adjacency,
    rng: &'a mut ChaCha8Rng,
    tick_id: TickId,
    dt: f64,
}

impl<'a> StepContext<'a> {
    /// Assemble a context. The engine does this once per propagator per
    /// tick; tests build one around mock readers and writers.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        reads: &'a dyn FieldReader,
        reads_previous: &'a dyn FieldReader,
        writes: &'a mut dyn FieldWriter,
        space: &'a dyn Space,
        adjacency: &'a Adjacency,
        rng: &'a mut ChaCha8Rng,
        tick_id: TickId,
        dt: f64,
    ) -> Self {
        Self {
            reads,
            reads_previous,
            writes,
            space,
            adjacency,
            rng,
            tick_id,
            dt,
        }
    }

    /// Current-tick reader.
    pub fn reads(&self) -> &dyn FieldReader {
        self.reads
    }

    /// Previous-tick reader.
    pub fn reads_previous(&self) -> &dyn FieldReader {
        self.reads_previous
    }

    /// Writer for declared outputs.
    pub fn writes(&mut self) -> &mut dyn FieldWriter {
        self.writes
    }

    /// The world's topology.
    pub fn space(&self) -> &dyn Space {
        self.space
    }

    /// Sentinel-padded neighbour tables of the world's topology.
    pub fn adjacency(&self) -> &Adjacency {
        self.adjacency
    }

    /// The world's random stream. Reseeded by `reset(seed)`.
    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        self.rng
    }

    /// Tick being produced (one past the last committed tick).
    pub fn tick_id(&self) -> TickId {
        self.tick_id
    }

    /// Timestep.
    pub fn dt(&self) -> f64 {
        self.dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use tessera_core::FieldId;
    use tessera_space::{EdgeBehavior, Line1D};
    use tessera_test_utils::{MockFieldReader, MockFieldWriter};

    #[test]
    fn views_are_independent() {
        let f = FieldId(0);
        let mut current = MockFieldReader::new();
        current.set_field(f, vec![10.0, 20.0]);
        let mut previous = MockFieldReader::new();
        previous.set_field(f, vec![1.0, 2.0]);
        let mut writer = MockFieldWriter::new();
        writer.add_field(f, 2);
        let space = Line1D::new(2, EdgeBehavior::Absorb).unwrap();
        let adjacency = Adjacency::build(&space).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let mut ctx = StepContext::new(
            &current,
            &previous,
            &mut writer,
            &space,
            &adjacency,
            &mut rng,
            TickId(3),
            0.5,
        );
        assert_eq!(ctx.reads().read(f).unwrap(), &[10.0, 20.0]);
        assert_eq!(ctx.reads_previous().read(f).unwrap(), &[1.0, 2.0]);
        ctx.writes().write(f).unwrap().copy_from_slice(&[4.0, 5.0]);
        assert_eq!(ctx.tick_id(), TickId(3));
        assert_eq!(ctx.dt(), 0.5);
        assert_eq!(ctx.adjacency().sentinel(), 2);
        drop(ctx);
        assert_eq!(writer.get_field(f).unwrap(), &[4.0, 5.0]);
    }

    #[test]
    fn rng_is_the_callers_stream() {
        let reader = MockFieldReader::new();
        let mut writer = MockFieldWriter::new();
        let space = Line1D::new(1, EdgeBehavior::Absorb).unwrap();
        let adjacency = Adjacency::build(&space).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let expected: u64 = ChaCha8Rng::seed_from_u64(9).random();

        let mut ctx = StepContext::new(
            &reader, &reader, &mut writer, &space, &adjacency, &mut rng, TickId(1), 1.0,
        );
        let drawn: u64 = ctx.rng().random();
        assert_eq!(drawn, expected);
    }
}
