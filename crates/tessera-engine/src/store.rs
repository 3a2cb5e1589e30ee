//! Per-world field storage and the per-propagator views over it.
//!
//! The committed state lives in [`FieldStore`]. A tick builds its output
//! in a separate staged buffer per field; propagators see the committed
//! state through [`OverlayReader`] and [`PreviousReader`] and write through
//! a [`ContractWriter`] that only hands out their declared outputs.

use indexmap::IndexMap;

use tessera_core::{
    FieldDef, FieldId, FieldMutability, FieldReader, FieldSet, FieldWriter, TickId,
};
use tessera_propagator::{ReadSource, WriteMode};

/// Committed field buffers of one world.
pub(crate) struct FieldStore {
    defs: Vec<FieldDef>,
    cell_count: usize,
    current: Vec<Vec<f32>>,
    previous: Vec<Vec<f32>>,
    last_write: Vec<TickId>,
    initial: Vec<Option<Vec<f32>>>,
}

impl FieldStore {
    pub(crate) fn new(
        defs: Vec<FieldDef>,
        cell_count: usize,
        initial: Vec<(FieldId, Vec<f32>)>,
    ) -> Self {
        let mut init = vec![None; defs.len()];
        for (field, values) in initial {
            init[field.0 as usize] = Some(values);
        }
        let mut store = Self {
            current: Vec::with_capacity(defs.len()),
            previous: Vec::with_capacity(defs.len()),
            last_write: vec![TickId(0); defs.len()],
            initial: init,
            defs,
            cell_count,
        };
        store.reinitialize();
        store
    }

    /// Zero every buffer, then apply Static initializers.
    pub(crate) fn reinitialize(&mut self) {
        self.current.clear();
        self.previous.clear();
        for (def, init) in self.defs.iter().zip(&self.initial) {
            let buf = match init {
                Some(values) => values.clone(),
                None => vec![0.0; def.buffer_len(self.cell_count)],
            };
            self.previous.push(buf.clone());
            self.current.push(buf);
        }
        self.last_write.fill(TickId(0));
    }

    /// Drop every buffer. The store is unusable afterwards.
    pub(crate) fn release(&mut self) {
        self.current = Vec::new();
        self.previous = Vec::new();
        self.initial = Vec::new();
    }

    pub(crate) fn defs(&self) -> &[FieldDef] {
        &self.defs
    }

    pub(crate) fn def(&self, field: FieldId) -> Option<&FieldDef> {
        self.defs.get(field.0 as usize)
    }

    pub(crate) fn len(&self) -> usize {
        self.defs.len()
    }

    pub(crate) fn current(&self, field: FieldId) -> Option<&[f32]> {
        self.current.get(field.0 as usize).map(Vec::as_slice)
    }

    pub(crate) fn previous(&self, field: FieldId) -> Option<&[f32]> {
        self.previous.get(field.0 as usize).map(Vec::as_slice)
    }

    pub(crate) fn last_write(&self, field: FieldId) -> Option<TickId> {
        self.last_write.get(field.0 as usize).copied()
    }

    /// Make `staged` the new current state as of `tick`.
    ///
    /// Staged fields get their value bounds enforced and their last-write
    /// tick advanced. Unstaged fields carry over unchanged.
    pub(crate) fn commit(&mut self, staged: Vec<Option<Vec<f32>>>, tick: TickId) {
        for (i, slot) in staged.into_iter().enumerate() {
            match slot {
                Some(mut next) => {
                    let def = &self.defs[i];
                    if let Some((lo, hi)) = def.bounds {
                        for v in &mut next {
                            *v = def.boundary_behavior.apply(*v, lo, hi);
                        }
                    }
                    self.previous[i] = std::mem::replace(&mut self.current[i], next);
                    self.last_write[i] = tick;
                }
                None => self.previous[i].clone_from(&self.current[i]),
            }
        }
    }
}

/// Current-tick view for one propagator.
///
/// Fields the propagator declared are routed to the committed state or to
/// the staged output of an earlier writer. Undeclared fields read as
/// `None`.
pub(crate) struct OverlayReader<'a> {
    store: &'a FieldStore,
    staged: &'a [Option<Vec<f32>>],
    routes: &'a IndexMap<FieldId, ReadSource>,
}

impl<'a> OverlayReader<'a> {
    pub(crate) fn new(
        store: &'a FieldStore,
        staged: &'a [Option<Vec<f32>>],
        routes: &'a IndexMap<FieldId, ReadSource>,
    ) -> Self {
        Self {
            store,
            staged,
            routes,
        }
    }
}

impl FieldReader for OverlayReader<'_> {
    fn read(&self, field: FieldId) -> Option<&[f32]> {
        match self.routes.get(&field)? {
            ReadSource::Committed => self.store.current(field),
            ReadSource::Staged { .. } => self
                .staged
                .get(field.0 as usize)
                .and_then(Option::as_deref)
                .or_else(|| self.store.current(field)),
        }
    }
}

/// Previous-tick view: the committed state, limited to declared fields.
pub(crate) struct PreviousReader<'a> {
    store: &'a FieldStore,
    declared: FieldSet,
}

impl<'a> PreviousReader<'a> {
    pub(crate) fn new(store: &'a FieldStore, declared: FieldSet) -> Self {
        Self { store, declared }
    }
}

impl FieldReader for PreviousReader<'_> {
    fn read(&self, field: FieldId) -> Option<&[f32]> {
        if self.declared.contains(field) {
            self.store.current(field)
        } else {
            None
        }
    }
}

struct WriteSlot {
    buf: Vec<f32>,
    mode: WriteMode,
    touched: bool,
}

/// Hands a propagator its declared output buffers and records misuse.
pub(crate) struct ContractWriter {
    slots: IndexMap<FieldId, WriteSlot>,
    undeclared: Vec<FieldId>,
}

impl ContractWriter {
    /// Prepare buffers for the declared writes.
    ///
    /// Full buffers start zeroed for PerTick fields and at the committed
    /// value otherwise. Incremental buffers start at whatever an earlier
    /// writer staged this tick, else at the committed value.
    pub(crate) fn new(
        writes: &IndexMap<FieldId, WriteMode>,
        store: &FieldStore,
        staged: &[Option<Vec<f32>>],
    ) -> Self {
        let slots = writes
            .iter()
            .map(|(&field, &mode)| {
                let committed = store.current(field).unwrap_or_default();
                let buf = match mode {
                    WriteMode::Full => match store.def(field).map(|d| d.mutability) {
                        Some(FieldMutability::PerTick) => vec![0.0; committed.len()],
                        _ => committed.to_vec(),
                    },
                    WriteMode::Incremental => staged
                        .get(field.0 as usize)
                        .and_then(Option::as_ref)
                        .map_or_else(|| committed.to_vec(), Clone::clone),
                };
                (
                    field,
                    WriteSlot {
                        buf,
                        mode,
                        touched: false,
                    },
                )
            })
            .collect();
        Self {
            slots,
            undeclared: Vec::new(),
        }
    }

    /// First field the propagator tried to write without declaring it.
    pub(crate) fn undeclared(&self) -> Option<FieldId> {
        self.undeclared.first().copied()
    }

    /// First Full output the propagator never asked for.
    pub(crate) fn untouched_full(&self) -> Option<FieldId> {
        self.slots
            .iter()
            .find(|(_, s)| s.mode == WriteMode::Full && !s.touched)
            .map(|(&f, _)| f)
    }

    /// First NaN among the written buffers, as `(field, element index)`.
    pub(crate) fn first_nan(&self) -> Option<(FieldId, usize)> {
        self.slots.iter().filter(|(_, s)| s.touched).find_map(|(&f, s)| {
            s.buf.iter().position(|v| v.is_nan()).map(|i| (f, i))
        })
    }

    /// Move the buffers the propagator asked for into `staged`.
    pub(crate) fn stage_into(self, staged: &mut [Option<Vec<f32>>]) {
        for (field, slot) in self.slots {
            if slot.touched {
                staged[field.0 as usize] = Some(slot.buf);
            }
        }
    }
}

impl FieldWriter for ContractWriter {
    fn write(&mut self, field: FieldId) -> Option<&mut [f32]> {
        match self.slots.get_mut(&field) {
            Some(slot) => {
                slot.touched = true;
                Some(&mut slot.buf)
            }
            None => {
                self.undeclared.push(field);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{BoundaryBehavior, FieldMutability};

    fn store() -> FieldStore {
        let mut bounded = FieldDef::scalar("bounded", FieldMutability::Sparse);
        bounded.bounds = Some((0.0, 1.0));
        bounded.boundary_behavior = BoundaryBehavior::Clamp;
        FieldStore::new(
            vec![
                FieldDef::scalar("tick", FieldMutability::PerTick),
                bounded,
                FieldDef::scalar("terrain", FieldMutability::Static),
            ],
            3,
            vec![(FieldId(2), vec![5.0, 6.0, 7.0])],
        )
    }

    #[test]
    fn starts_zeroed_with_initializers() {
        let s = store();
        assert_eq!(s.current(FieldId(0)), Some(&[0.0, 0.0, 0.0][..]));
        assert_eq!(s.current(FieldId(2)), Some(&[5.0, 6.0, 7.0][..]));
        assert_eq!(s.last_write(FieldId(1)), Some(TickId(0)));
        assert_eq!(s.current(FieldId(9)), None);
    }

    #[test]
    fn commit_applies_bounds_and_keeps_previous() {
        let mut s = store();
        s.commit(vec![None, Some(vec![-1.0, 0.5, 3.0]), None], TickId(1));
        assert_eq!(s.current(FieldId(1)), Some(&[0.0, 0.5, 1.0][..]));
        assert_eq!(s.previous(FieldId(1)), Some(&[0.0, 0.0, 0.0][..]));
        assert_eq!(s.last_write(FieldId(1)), Some(TickId(1)));
        assert_eq!(s.last_write(FieldId(0)), Some(TickId(0)));
    }

    #[test]
    fn writer_rejects_undeclared_and_tracks_full() {
        let s = store();
        let staged = vec![None, None, None];
        let writes: IndexMap<_, _> = [(FieldId(0), WriteMode::Full)].into_iter().collect();
        let mut w = ContractWriter::new(&writes, &s, &staged);
        assert_eq!(w.untouched_full(), Some(FieldId(0)));
        assert!(w.write(FieldId(1)).is_none());
        assert_eq!(w.undeclared(), Some(FieldId(1)));
        w.write(FieldId(0)).unwrap()[1] = f32::NAN;
        assert_eq!(w.untouched_full(), None);
        assert_eq!(w.first_nan(), Some((FieldId(0), 1)));
    }

    #[test]
    fn incremental_chains_on_staged_value() {
        let s = store();
        let mut staged = vec![None, Some(vec![0.25, 0.25, 0.25]), None];
        let writes: IndexMap<_, _> = [(FieldId(1), WriteMode::Incremental)].into_iter().collect();
        let mut w = ContractWriter::new(&writes, &s, &staged);
        for v in w.write(FieldId(1)).unwrap() {
            *v += 0.5;
        }
        w.stage_into(&mut staged);
        assert_eq!(staged[1].as_deref(), Some(&[0.75, 0.75, 0.75][..]));
    }

    #[test]
    fn overlay_routes_by_declaration() {
        let s = store();
        let staged = vec![Some(vec![9.0; 3]), None, None];
        let routes: IndexMap<_, _> = [
            (FieldId(0), ReadSource::Staged { writer_index: 0 }),
            (FieldId(2), ReadSource::Committed),
        ]
        .into_iter()
        .collect();
        let r = OverlayReader::new(&s, &staged, &routes);
        assert_eq!(r.read(FieldId(0)), Some(&[9.0; 3][..]));
        assert_eq!(r.read(FieldId(2)), Some(&[5.0, 6.0, 7.0][..]));
        assert_eq!(r.read(FieldId(1)), None);

        let p = PreviousReader::new(&s, [FieldId(1)].into_iter().collect());
        assert!(p.read(FieldId(1)).is_some());
        assert!(p.read(FieldId(0)).is_none());
    }
}
