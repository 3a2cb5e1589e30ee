//! Up-front pipeline validation and read routing.
//!
//! [`validate_pipeline`] runs once when a world is built. It rejects
//! structurally broken propagator lists and returns a
//! [`ReadResolutionPlan`] telling the engine, for every propagator and
//! every field it reads, whether to hand it the committed buffer or a
//! buffer staged earlier in the same tick.

use indexmap::IndexMap;
use thiserror::Error;

use crate::propagator::{Propagator, WriteMode};
use tessera_core::{FieldDef, FieldId, FieldMutability};
use tessera_space::Space;

/// Where a current-tick read is served from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadSource {
    /// The committed state from the previous tick.
    Committed,
    /// The buffer most recently staged by an earlier propagator this tick.
    Staged {
        /// Pipeline index of that propagator.
        writer_index: usize,
    },
}

/// Per-propagator read routes and write modes.
#[derive(Debug)]
#[must_use]
pub struct ReadResolutionPlan {
    routes: Vec<IndexMap<FieldId, ReadSource>>,
    write_modes: Vec<IndexMap<FieldId, WriteMode>>,
}

impl ReadResolutionPlan {
    /// Number of propagators covered.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the plan covers no propagators.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Read source of `field` for propagator `index`.
    pub fn source(&self, index: usize, field: FieldId) -> Option<ReadSource> {
        self.routes.get(index)?.get(&field).copied()
    }

    /// All read routes of propagator `index`.
    pub fn routes_for(&self, index: usize) -> Option<&IndexMap<FieldId, ReadSource>> {
        self.routes.get(index)
    }

    /// All declared writes of propagator `index`.
    pub fn write_modes_for(&self, index: usize) -> Option<&IndexMap<FieldId, WriteMode>> {
        self.write_modes.get(index)
    }
}

/// Two propagators that may not both write a field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteConflict {
    /// The contested field.
    pub field_id: FieldId,
    /// Earlier writer.
    pub first_writer: String,
    /// Later writer.
    pub second_writer: String,
}

/// Structural problems found by [`validate_pipeline`].
#[derive(Clone, Debug, PartialEq, Error)]
pub enum PipelineError {
    /// No propagators were registered.
    #[error("pipeline has no propagators")]
    EmptyPipeline,
    /// A field has a Full-mode writer plus another writer.
    #[error("write conflicts: {}", describe_conflicts(.0))]
    WriteConflict(Vec<WriteConflict>),
    /// A propagator names a field the world does not define.
    #[error("propagator '{propagator}' references undefined field {field_id}")]
    UndefinedField {
        /// Offending propagator.
        propagator: String,
        /// Missing field.
        field_id: FieldId,
    },
    /// A propagator declares a write to a Static field.
    #[error("propagator '{propagator}' writes static field {field_id}")]
    WritesStaticField {
        /// Offending propagator.
        propagator: String,
        /// The static field.
        field_id: FieldId,
    },
    /// `dt` exceeds the tightest `max_dt`.
    #[error("dt {configured_dt} exceeds max_dt {max_supported} (constrained by '{constraining_propagator}')")]
    DtTooLarge {
        /// Requested dt.
        configured_dt: f64,
        /// Tightest bound.
        max_supported: f64,
        /// Propagator imposing it.
        constraining_propagator: String,
    },
    /// `dt` is not finite and positive.
    #[error("dt must be finite and positive, got {value}")]
    InvalidDt {
        /// The rejected dt.
        value: f64,
    },
    /// A propagator reported a non-finite or non-positive `max_dt`.
    #[error("propagator '{propagator}' returned invalid max_dt {value}")]
    InvalidMaxDt {
        /// Offending propagator.
        propagator: String,
        /// Value it returned.
        value: f64,
    },
    /// A propagator's own checks rejected the configuration.
    #[error("propagator '{propagator}' rejected the configuration: {reason}")]
    Rejected {
        /// Offending propagator.
        propagator: String,
        /// Its explanation.
        reason: String,
    },
}

fn describe_conflicts(conflicts: &[WriteConflict]) -> String {
    conflicts
        .iter()
        .map(|c| {
            format!(
                "field {} written by '{}' and '{}'",
                c.field_id, c.first_writer, c.second_writer
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Check a single propagator against the space and dt.
///
/// Used both by [`validate_pipeline`] and by configuration code that wants
/// to fail at registration time.
pub fn validate_timestep(
    prop: &dyn Propagator,
    space: &dyn Space,
    dt: f64,
) -> Result<(), PipelineError> {
    if let Some(max) = prop.max_dt(space) {
        if !max.is_finite() || max <= 0.0 {
            return Err(PipelineError::InvalidMaxDt {
                propagator: prop.name().to_string(),
                value: max,
            });
        }
        if dt > max {
            return Err(PipelineError::DtTooLarge {
                configured_dt: dt,
                max_supported: max,
                constraining_propagator: prop.name().to_string(),
            });
        }
    }
    prop.validate(space, dt)
        .map_err(|reason| PipelineError::Rejected {
            propagator: prop.name().to_string(),
            reason,
        })
}

/// Validate `propagators` against the world's fields, space and dt.
///
/// Checks, in order: dt is finite and positive; the list is non-empty;
/// every read and write names a defined field; nothing writes a Static
/// field; no field with a [`WriteMode::Full`] writer has a second writer;
/// each propagator accepts the space and dt.
pub fn validate_pipeline(
    propagators: &[Box<dyn Propagator>],
    fields: &[FieldDef],
    space: &dyn Space,
    dt: f64,
) -> Result<ReadResolutionPlan, PipelineError> {
    if !dt.is_finite() || dt <= 0.0 {
        return Err(PipelineError::InvalidDt { value: dt });
    }
    if propagators.is_empty() {
        return Err(PipelineError::EmptyPipeline);
    }

    let defined = |id: FieldId| fields.get(id.0 as usize);
    for prop in propagators {
        let reads = prop.reads().union(&prop.reads_previous());
        let writes = prop.writes().into_iter().map(|(id, _)| id);
        for field_id in reads.iter().chain(writes) {
            if defined(field_id).is_none() {
                return Err(PipelineError::UndefinedField {
                    propagator: prop.name().to_string(),
                    field_id,
                });
            }
        }
        for (field_id, _) in prop.writes() {
            if defined(field_id).map(|d| d.mutability) == Some(FieldMutability::Static) {
                return Err(PipelineError::WritesStaticField {
                    propagator: prop.name().to_string(),
                    field_id,
                });
            }
        }
    }

    // field -> (index, mode) of every writer so far.
    let mut writers: IndexMap<FieldId, Vec<(usize, WriteMode)>> = IndexMap::new();
    let mut conflicts = Vec::new();
    for (i, prop) in propagators.iter().enumerate() {
        for (field_id, mode) in prop.writes() {
            let prior = writers.entry(field_id).or_default();
            if let Some(&(j, prior_mode)) = prior.last() {
                if mode == WriteMode::Full || prior_mode == WriteMode::Full {
                    conflicts.push(WriteConflict {
                        field_id,
                        first_writer: propagators[j].name().to_string(),
                        second_writer: prop.name().to_string(),
                    });
                }
            }
            prior.push((i, mode));
        }
    }
    if !conflicts.is_empty() {
        return Err(PipelineError::WriteConflict(conflicts));
    }

    for prop in propagators {
        validate_timestep(prop.as_ref(), space, dt)?;
    }

    let mut last_writer: IndexMap<FieldId, usize> = IndexMap::new();
    let mut routes = Vec::with_capacity(propagators.len());
    let mut write_modes = Vec::with_capacity(propagators.len());
    for (i, prop) in propagators.iter().enumerate() {
        let route: IndexMap<FieldId, ReadSource> = prop
            .reads()
            .iter()
            .map(|field| {
                let source = match last_writer.get(&field) {
                    Some(&writer_index) => ReadSource::Staged { writer_index },
                    None => ReadSource::Committed,
                };
                (field, source)
            })
            .collect();
        routes.push(route);

        let modes: IndexMap<FieldId, WriteMode> = prop.writes().into_iter().collect();
        for &field in modes.keys() {
            last_writer.insert(field, i);
        }
        write_modes.push(modes);
    }

    Ok(ReadResolutionPlan {
        routes,
        write_modes,
    })
}
