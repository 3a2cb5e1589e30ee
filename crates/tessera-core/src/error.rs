//! Error types shared across the workspace, grouped by subsystem.

use crate::id::FieldId;
use thiserror::Error;

/// Errors from advancing a world by one tick.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum StepError {
    /// A propagator returned an error; the tick was rolled back.
    #[error("propagator '{name}' failed: {reason}")]
    PropagatorFailed {
        /// Name of the failing propagator.
        name: String,
        /// What the propagator reported.
        #[source]
        reason: PropagatorError,
    },
    /// A propagator broke its declared write contract; the tick was rolled back.
    #[error("propagator '{propagator}' violated its write contract: {reason}")]
    ContractViolation {
        /// Name of the offending propagator.
        propagator: String,
        /// What was violated.
        reason: String,
    },
    /// A command addressed a field or cell that does not exist, or a
    /// field that commands may not touch. Nothing was applied.
    #[error("command {index} rejected: {reason}")]
    InvalidCommand {
        /// Position of the command in the submitted list.
        index: usize,
        /// Why it was rejected.
        reason: String,
    },
    /// Ticking is disabled after too many consecutive rollbacks.
    #[error("ticking disabled after {consecutive_rollbacks} consecutive rollbacks; reset the world")]
    TickDisabled {
        /// Rollbacks that led to the disable.
        consecutive_rollbacks: u32,
    },
    /// The world has been destroyed.
    #[error("use after destroy")]
    Destroyed,
}

/// Errors reported by a single propagator's `step`.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum PropagatorError {
    /// The update function failed.
    #[error("execution failed: {reason}")]
    ExecutionFailed {
        /// Human-readable description.
        reason: String,
    },
    /// A NaN was produced in an output buffer.
    #[error("NaN detected in field {field_id}{}", at_cell(.cell_index))]
    NanDetected {
        /// Field containing the NaN.
        field_id: FieldId,
        /// First offending cell, if known.
        cell_index: Option<usize>,
    },
    /// A user-defined constraint was violated.
    #[error("constraint violation: {constraint}")]
    ConstraintViolation {
        /// The violated constraint.
        constraint: String,
    },
}

fn at_cell(cell_index: &Option<usize>) -> String {
    cell_index.map(|i| format!(" at cell {i}")).unwrap_or_default()
}

/// Errors from observation plan compilation and execution.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ObsError {
    /// The entry list cannot be compiled against the topology.
    #[error("invalid observation spec: {reason}")]
    InvalidObsSpec {
        /// What is wrong with it.
        reason: String,
    },
    /// Extraction failed against a particular snapshot.
    #[error("observation failed: {reason}")]
    ExecutionFailed {
        /// What went wrong.
        reason: String,
    },
    /// A caller-owned buffer has the wrong length.
    #[error("{buffer} buffer has {got} elements, expected {expected}")]
    BufferLength {
        /// `"output"` or `"mask"`.
        buffer: &'static str,
        /// Required length.
        expected: usize,
        /// Length supplied.
        got: usize,
    },
    /// An observed field is not present in the snapshot.
    #[error("field {0} is not present in the snapshot")]
    FieldMissing(FieldId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn propagator_failure_chains_source() {
        let err = StepError::PropagatorFailed {
            name: "diffuse".into(),
            reason: PropagatorError::ExecutionFailed {
                reason: "boom".into(),
            },
        };
        assert_eq!(
            err.to_string(),
            "propagator 'diffuse' failed: execution failed: boom"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn nan_message_includes_cell_when_known() {
        let with = PropagatorError::NanDetected {
            field_id: FieldId(2),
            cell_index: Some(5),
        };
        let without = PropagatorError::NanDetected {
            field_id: FieldId(2),
            cell_index: None,
        };
        assert_eq!(with.to_string(), "NaN detected in field 2 at cell 5");
        assert_eq!(without.to_string(), "NaN detected in field 2");
    }

    #[test]
    fn buffer_length_names_both_counts() {
        let err = ObsError::BufferLength {
            buffer: "output",
            expected: 40,
            got: 39,
        };
        assert_eq!(err.to_string(), "output buffer has 39 elements, expected 40");
    }
}
