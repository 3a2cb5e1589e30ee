//! Observation plan compilation and execution.
//!
//! [`ObsPlan::compile`] resolves every entry of an [`ObsSpec`] against a
//! topology: fixed regions become rank slot lists, agent-relative regions
//! become templates with a fixed slot count, gradient transforms become
//! per-cell neighbour stencils, and pooling shapes are checked. The output
//! length is fixed from then on, whatever the tick or agent centre.
//!
//! Execution writes into caller-owned buffers and never allocates them.

use std::borrow::Cow;

use tessera_core::{Coord, FieldId, ObsError, SnapshotAccess};
use tessera_space::region::{box_slot_count, box_slots, MAX_REGION_SLOTS};
use tessera_space::{Adjacency, BfsScratch, RegionPlan, Space};

use crate::metadata::ObsMetadata;
use crate::pool;
use crate::spec::{ObsRegion, ObsSpec, ObsTransform, PoolConfig};

/// A compiled observation program for one topology shape.
///
/// The plan holds no per-tick state and can be shared between threads and
/// executed against any snapshot of a world with an equal topology.
#[derive(Debug)]
pub struct ObsPlan {
    adjacency: Adjacency,
    entries: Vec<CompiledEntry>,
    output_len: usize,
    agent_relative: bool,
}

#[derive(Debug)]
struct CompiledEntry {
    field_id: FieldId,
    region: CompiledRegion,
    transform: CompiledTransform,
    pool: Option<PoolConfig>,
    /// Region shape before pooling.
    raw_shape: Vec<usize>,
    /// Shape actually emitted.
    out_shape: Vec<usize>,
    offset: usize,
    len: usize,
}

#[derive(Debug)]
enum CompiledRegion {
    Fixed(Vec<Option<usize>>),
    AgentDisk { radius: u32, slots: usize },
    AgentRect { half_extent: Vec<i32>, extents: Vec<usize> },
}

#[derive(Debug)]
enum CompiledTransform {
    Identity,
    Normalize { min: f64, max: f64 },
    /// `(minus, plus)` neighbour along the axis, per rank.
    Gradient(Vec<(Option<usize>, Option<usize>)>),
}

impl CompiledTransform {
    fn apply(&self, field: &[f32], rank: usize) -> f32 {
        match self {
            CompiledTransform::Identity => field[rank],
            CompiledTransform::Normalize { min, max } => {
                let range = max - min;
                if range == 0.0 {
                    0.0
                } else {
                    ((field[rank] as f64 - min) / range).clamp(0.0, 1.0) as f32
                }
            }
            CompiledTransform::Gradient(stencil) => match stencil[rank] {
                (Some(m), Some(p)) => (field[p] - field[m]) * 0.5,
                (None, Some(p)) => field[p] - field[rank],
                (Some(m), None) => field[rank] - field[m],
                (None, None) => 0.0,
            },
        }
    }
}

fn invalid(reason: impl Into<String>) -> ObsError {
    ObsError::InvalidObsSpec {
        reason: reason.into(),
    }
}

impl ObsPlan {
    /// Compile `spec` against `space`.
    ///
    /// # Errors
    ///
    /// [`ObsError::InvalidObsSpec`] for an empty entry list, a region that
    /// does not fit the space, a rect half-extent of the wrong
    /// dimensionality, a non-finite or inverted normalize range, a gradient
    /// axis beyond the space's dimensionality, or a pool window that does
    /// not fit the region shape.
    pub fn compile(spec: &ObsSpec, space: &dyn Space) -> Result<Self, ObsError> {
        if spec.entries.is_empty() {
            return Err(invalid("observation spec has no entries"));
        }
        let adjacency = Adjacency::build(space).map_err(|e| invalid(e.to_string()))?;

        let mut entries = Vec::with_capacity(spec.entries.len());
        let mut offset = 0usize;
        for (i, entry) in spec.entries.iter().enumerate() {
            let at = |e: ObsError| match e {
                ObsError::InvalidObsSpec { reason } => invalid(format!("entry {i}: {reason}")),
                other => other,
            };
            let (region, raw_shape) = compile_region(&entry.region, space, &adjacency).map_err(at)?;
            let transform = compile_transform(&entry.transform, space, &adjacency).map_err(at)?;
            let out_shape = match &entry.pool {
                Some(cfg) => pool::check(&raw_shape, cfg).map_err(at)?,
                None => raw_shape.clone(),
            };
            let len = out_shape.iter().product();
            entries.push(CompiledEntry {
                field_id: entry.field_id,
                region,
                transform,
                pool: entry.pool.clone(),
                raw_shape,
                out_shape,
                offset,
                len,
            });
            offset += len;
        }

        Ok(Self {
            adjacency,
            agent_relative: spec.has_agent_entries(),
            entries,
            output_len: offset,
        })
    }

    /// Output elements per execution (per agent for
    /// [`execute_agents`](Self::execute_agents)).
    pub fn output_len(&self) -> usize {
        self.output_len
    }

    /// Mask bytes per execution; one per output element.
    pub fn mask_len(&self) -> usize {
        self.output_len
    }

    /// Shape of each entry's output slice, in entry order.
    pub fn entry_shapes(&self) -> Vec<Vec<usize>> {
        self.entries.iter().map(|e| e.out_shape.clone()).collect()
    }

    /// Whether any entry needs an agent centre.
    pub fn is_agent_relative(&self) -> bool {
        self.agent_relative
    }

    /// Cells in the topology the plan was compiled for.
    pub fn cell_count(&self) -> usize {
        self.adjacency.cell_count()
    }

    /// Fields the plan reads.
    pub fn field_ids(&self) -> impl Iterator<Item = FieldId> + '_ {
        self.entries.iter().map(|e| e.field_id)
    }

    /// Fill `output` and `mask` from `snapshot`.
    ///
    /// # Errors
    ///
    /// [`ObsError::InvalidObsSpec`] if the plan has agent-relative entries,
    /// [`ObsError::BufferLength`] if a buffer is not exactly
    /// [`output_len`](Self::output_len) long, [`ObsError::FieldMissing`] or
    /// [`ObsError::ExecutionFailed`] if an observed field is absent or not
    /// scalar over this topology.
    pub fn execute(
        &self,
        snapshot: &dyn SnapshotAccess,
        output: &mut [f32],
        mask: &mut [u8],
    ) -> Result<ObsMetadata, ObsError> {
        if self.agent_relative {
            return Err(invalid(
                "plan has agent-relative entries; use execute_agents",
            ));
        }
        check_len("output", self.output_len, output.len())?;
        check_len("mask", self.output_len, mask.len())?;
        let fields = self.resolve_fields(snapshot)?;
        for (entry, field) in self.entries.iter().zip(&fields) {
            let CompiledRegion::Fixed(slots) = &entry.region else {
                continue;
            };
            let range = entry.offset..entry.offset + entry.len;
            entry.fill(field, slots, &mut output[range.clone()], &mut mask[range]);
        }
        Ok(self.metadata(snapshot, mask))
    }

    /// Fill one slice per agent, concatenated in `centers` order.
    ///
    /// Fixed entries are repeated in every agent's slice.
    ///
    /// # Errors
    ///
    /// As [`execute`](Self::execute), with buffers of
    /// `centers.len() × output_len`, plus [`ObsError::ExecutionFailed`] for
    /// a centre that is not a cell.
    pub fn execute_agents(
        &self,
        snapshot: &dyn SnapshotAccess,
        centers: &[Coord],
        output: &mut [f32],
        mask: &mut [u8],
    ) -> Result<ObsMetadata, ObsError> {
        let expected = self.output_len * centers.len();
        check_len("output", expected, output.len())?;
        check_len("mask", expected, mask.len())?;
        let ranks = centers
            .iter()
            .map(|c| {
                self.adjacency
                    .rank_of(c)
                    .ok_or_else(|| ObsError::ExecutionFailed {
                        reason: format!("agent center {c:?} is not a cell"),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let fields = self.resolve_fields(snapshot)?;

        let mut scratch = DiskScratch::new(&self.adjacency);
        let per_agent = self.output_len.max(1);
        for ((&center, out), m) in ranks
            .iter()
            .zip(output.chunks_mut(per_agent))
            .zip(mask.chunks_mut(per_agent))
        {
            for (entry, field) in self.entries.iter().zip(&fields) {
                let slots = self.slots_at(&entry.region, center, &mut scratch);
                let range = entry.offset..entry.offset + entry.len;
                entry.fill(field, &slots, &mut out[range.clone()], &mut m[range]);
            }
        }
        Ok(self.metadata(snapshot, mask))
    }

    fn resolve_fields<'s>(
        &self,
        snapshot: &'s dyn SnapshotAccess,
    ) -> Result<Vec<&'s [f32]>, ObsError> {
        let cells = self.cell_count();
        self.entries
            .iter()
            .map(|e| {
                let data = snapshot
                    .read_field(e.field_id)
                    .ok_or(ObsError::FieldMissing(e.field_id))?;
                if data.len() != cells {
                    return Err(ObsError::ExecutionFailed {
                        reason: format!(
                            "field {} has {} values, expected one per cell ({cells})",
                            e.field_id,
                            data.len()
                        ),
                    });
                }
                Ok(data)
            })
            .collect()
    }

    fn slots_at<'a>(
        &self,
        region: &'a CompiledRegion,
        center: usize,
        scratch: &mut DiskScratch,
    ) -> Cow<'a, [Option<usize>]> {
        match region {
            CompiledRegion::Fixed(slots) => Cow::Borrowed(slots),
            CompiledRegion::AgentDisk { radius, slots } => {
                let reached = &mut scratch.reached;
                self.adjacency.bfs_with(center, *radius, &mut scratch.bfs, reached);
                reached.sort_unstable_by_key(|&(rank, hops)| (hops, rank));
                let mut out: Vec<Option<usize>> =
                    reached.iter().map(|&(rank, _)| Some(rank)).collect();
                out.resize(*slots, None);
                Cow::Owned(out)
            }
            CompiledRegion::AgentRect {
                half_extent,
                extents,
            } => {
                let origin: Vec<i32> = match self.adjacency.coord(center) {
                    Some(c) => c.iter().zip(half_extent).map(|(&x, &h)| x - h).collect(),
                    None => return Cow::Owned(vec![None; extents.iter().product()]),
                };
                Cow::Owned(box_slots(&origin, extents, |p| self.adjacency.rank_of_wrapped(p)))
            }
        }
    }

    fn metadata(&self, snapshot: &dyn SnapshotAccess, mask: &[u8]) -> ObsMetadata {
        let tick_id = snapshot.tick_id();
        let oldest = self
            .entries
            .iter()
            .filter_map(|e| snapshot.last_write_tick(e.field_id))
            .min()
            .unwrap_or(tick_id);
        let valid = mask.iter().filter(|&&m| m == 1).count();
        ObsMetadata {
            tick_id,
            age_ticks: tick_id.0.saturating_sub(oldest.0),
            coverage: if mask.is_empty() {
                0.0
            } else {
                valid as f64 / mask.len() as f64
            },
        }
    }
}

impl CompiledEntry {
    fn fill(&self, field: &[f32], slots: &[Option<usize>], out: &mut [f32], mask: &mut [u8]) {
        match &self.pool {
            None => {
                for ((slot, o), m) in slots.iter().zip(out.iter_mut()).zip(mask.iter_mut()) {
                    (*o, *m) = match *slot {
                        Some(rank) => (self.transform.apply(field, rank), 1),
                        None => (0.0, 0),
                    };
                }
            }
            Some(cfg) => {
                let raw: Vec<f32> = slots
                    .iter()
                    .map(|s| s.map_or(0.0, |rank| self.transform.apply(field, rank)))
                    .collect();
                let raw_mask: Vec<u8> = slots.iter().map(|s| u8::from(s.is_some())).collect();
                pool::pool_into(&raw, &raw_mask, &self.raw_shape, cfg, out, mask);
            }
        }
    }
}

fn check_len(buffer: &'static str, expected: usize, got: usize) -> Result<(), ObsError> {
    if expected == got {
        Ok(())
    } else {
        Err(ObsError::BufferLength {
            buffer,
            expected,
            got,
        })
    }
}

/// Per-call buffers for agent disk expansion.
struct DiskScratch {
    bfs: BfsScratch,
    reached: Vec<(usize, u32)>,
}

impl DiskScratch {
    fn new(adjacency: &Adjacency) -> Self {
        Self {
            bfs: BfsScratch::new(adjacency),
            reached: Vec::new(),
        }
    }
}

fn compile_region(
    region: &ObsRegion,
    space: &dyn Space,
    adjacency: &Adjacency,
) -> Result<(CompiledRegion, Vec<usize>), ObsError> {
    match region {
        ObsRegion::Fixed(spec) => {
            let plan = RegionPlan::compile(spec, space, adjacency)
                .map_err(|e| invalid(e.to_string()))?;
            if plan.is_empty() {
                return Err(invalid("region selects no cells"));
            }
            Ok((CompiledRegion::Fixed(plan.slots), plan.shape))
        }
        ObsRegion::AgentDisk { radius } => {
            let n = adjacency.cell_count();
            let mut scratch = DiskScratch::new(adjacency);
            let mut slots = 0;
            for rank in 0..n {
                adjacency.bfs_with(rank, *radius, &mut scratch.bfs, &mut scratch.reached);
                slots = slots.max(scratch.reached.len());
                if slots == n {
                    break;
                }
            }
            Ok((
                CompiledRegion::AgentDisk {
                    radius: *radius,
                    slots,
                },
                vec![slots],
            ))
        }
        ObsRegion::AgentRect { half_extent } => {
            if half_extent.len() != space.ndim() {
                return Err(invalid(format!(
                    "AgentRect half_extent has {} axes, space has {}",
                    half_extent.len(),
                    space.ndim()
                )));
            }
            let extents: Vec<usize> = half_extent
                .iter()
                .map(|&h| (h as usize).saturating_mul(2).saturating_add(1))
                .collect();
            if box_slot_count(&extents).is_none() {
                return Err(invalid(format!(
                    "AgentRect {half_extent:?} spans more than {MAX_REGION_SLOTS} slots"
                )));
            }
            Ok((
                CompiledRegion::AgentRect {
                    half_extent: half_extent.iter().map(|&h| h as i32).collect(),
                    extents: extents.clone(),
                },
                extents,
            ))
        }
    }
}

fn compile_transform(
    transform: &ObsTransform,
    space: &dyn Space,
    adjacency: &Adjacency,
) -> Result<CompiledTransform, ObsError> {
    match *transform {
        ObsTransform::Identity => Ok(CompiledTransform::Identity),
        ObsTransform::Normalize { min, max } => {
            if !min.is_finite() || !max.is_finite() {
                return Err(invalid(format!(
                    "normalize bounds must be finite, got [{min}, {max}]"
                )));
            }
            if min > max {
                return Err(invalid(format!("normalize min {min} exceeds max {max}")));
            }
            Ok(CompiledTransform::Normalize { min, max })
        }
        ObsTransform::Gradient { axis } => {
            if axis >= space.ndim() {
                return Err(invalid(format!(
                    "gradient axis {axis} out of range for {}-d space",
                    space.ndim()
                )));
            }
            Ok(CompiledTransform::Gradient(gradient_stencil(adjacency, axis)))
        }
    }
}

/// Neighbours of each cell that differ from it only along `axis`. A step
/// of +1, or a wrap from the far end back to the start, is the plus side.
fn gradient_stencil(adjacency: &Adjacency, axis: usize) -> Vec<(Option<usize>, Option<usize>)> {
    (0..adjacency.cell_count())
        .map(|rank| {
            let mut sides = (None, None);
            let Some(here) = adjacency.coord(rank) else {
                return sides;
            };
            for &nb in adjacency.neighbours_of(rank) {
                let Some(there) = adjacency.coord(nb) else {
                    continue;
                };
                let off_axis_equal = here
                    .iter()
                    .zip(there.iter())
                    .enumerate()
                    .all(|(a, (x, y))| a == axis || x == y);
                if !off_axis_equal {
                    continue;
                }
                let delta = there[axis] - here[axis];
                if delta == 1 || delta < -1 {
                    sides.1 = Some(nb);
                } else if delta == -1 || delta > 1 {
                    sides.0 = Some(nb);
                }
            }
            sides
        })
        .collect()
}
