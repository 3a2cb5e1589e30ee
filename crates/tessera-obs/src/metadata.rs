//! Per-extraction metadata.

use tessera_core::TickId;

/// What an extraction observed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObsMetadata {
    /// Tick of the observed state.
    pub tick_id: TickId,
    /// Ticks since the least recently written observed field was last
    /// written. 0 when every observed field was written this tick.
    pub age_ticks: u64,
    /// Fraction of mask entries set to 1.
    pub coverage: f64,
}
