//! Per-tick diagnostics.

/// Timings and counters from one tick.
///
/// Durations are microseconds. Counters named `*_rejections`, `*_events`
/// and `*_transitions` are cumulative since the world was built. Nothing
/// here feeds back into simulation results.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepMetrics {
    /// Whole tick.
    pub total_us: u64,
    /// Command validation and application.
    pub command_processing_us: u64,
    /// `(propagator name, time)` in pipeline order.
    pub propagator_us: Vec<(String, u64)>,
    /// Commands applied this tick.
    pub commands_applied: usize,
    /// Commands dropped for exceeding the per-tick limit.
    pub queue_full_rejections: u64,
    /// Step calls refused while ticking was disabled.
    pub tick_disabled_rejections: u64,
    /// Ticks rolled back.
    pub rollback_events: u64,
    /// Times ticking became disabled.
    pub tick_disabled_transitions: u64,
    /// Always 0: stepping is synchronous and has no workers to stall.
    pub worker_stall_events: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_all_zero() {
        let m = StepMetrics::default();
        assert_eq!(m.total_us, 0);
        assert!(m.propagator_us.is_empty());
        assert_eq!(m.rollback_events + m.queue_full_rejections + m.worker_stall_events, 0);
    }
}
