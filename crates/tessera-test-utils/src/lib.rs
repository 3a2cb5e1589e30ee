//! Mocks and propagator fixtures for Tessera tests.
//!
//! The mocks stand in for the engine's field access ([`FieldReader`],
//! [`FieldWriter`], [`SnapshotAccess`]) so propagators and observation
//! plans can be exercised without building a world.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::collections::HashMap;

use tessera_core::{FieldId, FieldReader, FieldWriter, SnapshotAccess, TickId};

pub use fixtures::{
    AddPropagator, ConstPropagator, FailingPropagator, IdentityPropagator, SkipFullWritePropagator,
    UndeclaredWritePropagator,
};

/// In-memory [`FieldReader`].
#[derive(Debug, Default)]
pub struct MockFieldReader {
    fields: HashMap<FieldId, Vec<f32>>,
}

impl MockFieldReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_field(&mut self, field: FieldId, data: Vec<f32>) {
        self.fields.insert(field, data);
    }
}

impl FieldReader for MockFieldReader {
    fn read(&self, field: FieldId) -> Option<&[f32]> {
        self.fields.get(&field).map(Vec::as_slice)
    }
}

/// In-memory [`FieldWriter`]. Only fields added with
/// [`add_field`](MockFieldWriter::add_field) are writable.
#[derive(Debug, Default)]
pub struct MockFieldWriter {
    fields: HashMap<FieldId, Vec<f32>>,
}

impl MockFieldWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zeroed buffer of `len` cells.
    pub fn add_field(&mut self, field: FieldId, len: usize) {
        self.fields.insert(field, vec![0.0; len]);
    }

    /// Buffer pre-filled with `data`, as an Incremental writer would see it.
    pub fn seed_field(&mut self, field: FieldId, data: Vec<f32>) {
        self.fields.insert(field, data);
    }

    pub fn get_field(&self, field: FieldId) -> Option<&[f32]> {
        self.fields.get(&field).map(Vec::as_slice)
    }
}

impl FieldWriter for MockFieldWriter {
    fn write(&mut self, field: FieldId) -> Option<&mut [f32]> {
        self.fields.get_mut(&field).map(Vec::as_mut_slice)
    }
}

/// In-memory [`SnapshotAccess`] with per-field write ticks.
#[derive(Debug)]
pub struct MockSnapshot {
    fields: HashMap<FieldId, (Vec<f32>, TickId)>,
    tick: TickId,
}

impl MockSnapshot {
    pub fn new(tick: TickId) -> Self {
        Self {
            fields: HashMap::new(),
            tick,
        }
    }

    /// Field last written at the snapshot's own tick.
    pub fn set_field(&mut self, field: FieldId, data: Vec<f32>) {
        let tick = self.tick;
        self.fields.insert(field, (data, tick));
    }

    /// Field last written at an earlier tick.
    pub fn set_stale_field(&mut self, field: FieldId, data: Vec<f32>, written: TickId) {
        self.fields.insert(field, (data, written));
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

impl SnapshotAccess for MockSnapshot {
    fn read_field(&self, field: FieldId) -> Option<&[f32]> {
        self.fields.get(&field).map(|(data, _)| data.as_slice())
    }

    fn tick_id(&self) -> TickId {
        self.tick
    }

    fn last_write_tick(&self, field: FieldId) -> Option<TickId> {
        self.fields.get(&field).map(|&(_, tick)| tick)
    }
}
