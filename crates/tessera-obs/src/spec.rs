//! Declarative observation requests.

use smallvec::SmallVec;
use tessera_core::FieldId;
use tessera_space::RegionSpec;

/// An ordered list of observation entries.
///
/// Entry 0 fills the first slice of the output buffer, entry 1 the next,
/// and so on.
///
/// ```
/// use tessera_core::FieldId;
/// use tessera_obs::{ObsEntry, ObsRegion, ObsSpec, ObsTransform};
/// use tessera_space::RegionSpec;
///
/// let spec = ObsSpec::new(vec![
///     ObsEntry::new(FieldId(0), RegionSpec::All),
///     ObsEntry::new(FieldId(1), ObsRegion::AgentDisk { radius: 2 })
///         .with_transform(ObsTransform::Normalize { min: 0.0, max: 10.0 }),
/// ]);
/// assert!(spec.has_agent_entries());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct ObsSpec {
    /// Entries in output order.
    pub entries: Vec<ObsEntry>,
}

impl ObsSpec {
    /// Wrap an entry list.
    pub fn new(entries: Vec<ObsEntry>) -> Self {
        Self { entries }
    }

    /// Whether any entry is resolved relative to an agent centre.
    pub fn has_agent_entries(&self) -> bool {
        self.entries.iter().any(|e| e.region.is_agent_relative())
    }
}

/// Which cells an entry reads.
#[derive(Clone, Debug, PartialEq)]
pub enum ObsRegion {
    /// Absolute region, resolved at compile time.
    Fixed(RegionSpec),
    /// Cells within `radius` hops of the agent, in order of distance then
    /// rank, padded to the largest disk the topology can produce.
    AgentDisk {
        /// Hop radius, inclusive.
        radius: u32,
    },
    /// Box of `2·h + 1` points per axis centred on the agent. The box wraps
    /// along periodic axes; points past a bounded edge are padding.
    AgentRect {
        /// Half-extent per coordinate axis.
        half_extent: SmallVec<[u32; 4]>,
    },
}

impl ObsRegion {
    /// Whether the region needs an agent centre to resolve.
    pub fn is_agent_relative(&self) -> bool {
        !matches!(self, ObsRegion::Fixed(_))
    }
}

impl From<RegionSpec> for ObsRegion {
    fn from(spec: RegionSpec) -> Self {
        ObsRegion::Fixed(spec)
    }
}

/// Per-cell transform, applied before pooling.
#[derive(Clone, Debug, PartialEq)]
pub enum ObsTransform {
    /// Raw values.
    Identity,
    /// `(v − min) / (max − min)` clamped to `[0, 1]`; all zeros when
    /// `min == max`.
    Normalize {
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },
    /// Derivative along one coordinate axis from neighbour values: a
    /// central difference where both neighbours exist, one-sided where
    /// only one does, 0 where neither does.
    Gradient {
        /// Coordinate axis.
        axis: usize,
    },
}

/// Pool reduction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolKernel {
    /// Average of valid values.
    Mean,
    /// Largest valid value.
    Max,
    /// Smallest valid value.
    Min,
    /// Sum of valid values.
    Sum,
}

/// Sliding-window pooling over an entry's region shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Reduction.
    pub kernel: PoolKernel,
    /// Window side length on every axis.
    pub kernel_size: usize,
    /// Window step on every axis.
    pub stride: usize,
}

/// One field observed over one region.
#[derive(Clone, Debug, PartialEq)]
pub struct ObsEntry {
    /// Observed field. Must be scalar.
    pub field_id: FieldId,
    /// Cells to read.
    pub region: ObsRegion,
    /// Per-cell transform.
    pub transform: ObsTransform,
    /// Pooling, or `None` to emit raw values.
    pub pool: Option<PoolConfig>,
}

impl ObsEntry {
    /// Identity transform, no pooling.
    pub fn new(field_id: FieldId, region: impl Into<ObsRegion>) -> Self {
        Self {
            field_id,
            region: region.into(),
            transform: ObsTransform::Identity,
            pool: None,
        }
    }

    /// Replace the transform.
    pub fn with_transform(mut self, transform: ObsTransform) -> Self {
        self.transform = transform;
        self
    }

    /// Add pooling.
    pub fn with_pool(mut self, kernel: PoolKernel, kernel_size: usize, stride: usize) -> Self {
        self.pool = Some(PoolConfig {
            kernel,
            kernel_size,
            stride,
        });
        self
    }
}
