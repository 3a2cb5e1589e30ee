//! Closure-backed propagators and the host lock.
//!
//! [`FnPropagator`] lets host code supply a propagator as a closure plus
//! its read and write declarations. When the closure calls into a
//! runtime that must not be entered from two threads at once, attach a
//! [`HostLock`]: every propagator sharing the lock is serialized, even
//! while a batch of worlds steps in parallel.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::context::StepContext;
use crate::propagator::{Propagator, WriteMode};
use tessera_core::{FieldId, FieldSet, PropagatorError};
use tessera_space::Space;

/// Mutual exclusion shared by callbacks into a single-threaded host.
///
/// Cloning yields a handle to the same lock.
#[derive(Clone, Default)]
pub struct HostLock(Arc<Mutex<()>>);

impl HostLock {
    /// A fresh, unshared lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock.
    ///
    /// A panic in an earlier holder does not poison later callers.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    /// Whether two handles refer to the same lock.
    pub fn same_lock(&self, other: &HostLock) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for HostLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HostLock").finish()
    }
}

type UpdateFn = dyn Fn(&mut StepContext<'_>) -> Result<(), PropagatorError> + Send + Sync;

/// A propagator whose `step` is a closure.
pub struct FnPropagator {
    name: String,
    reads: FieldSet,
    reads_previous: FieldSet,
    writes: Vec<(FieldId, WriteMode)>,
    max_dt: Option<f64>,
    host_lock: Option<HostLock>,
    update: Box<UpdateFn>,
}

impl FnPropagator {
    /// Wrap `update` with its field declarations.
    pub fn new<F>(
        name: impl Into<String>,
        reads: FieldSet,
        reads_previous: FieldSet,
        writes: Vec<(FieldId, WriteMode)>,
        update: F,
    ) -> Self
    where
        F: Fn(&mut StepContext<'_>) -> Result<(), PropagatorError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            reads,
            reads_previous,
            writes,
            max_dt: None,
            host_lock: None,
            update: Box::new(update),
        }
    }

    /// Serialize every call to `update` behind `lock`.
    pub fn with_host_lock(mut self, lock: HostLock) -> Self {
        self.host_lock = Some(lock);
        self
    }

    /// Declare a timestep bound independent of the space.
    pub fn with_max_dt(mut self, max_dt: f64) -> Self {
        self.max_dt = Some(max_dt);
        self
    }
}

impl fmt::Debug for FnPropagator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPropagator")
            .field("name", &self.name)
            .field("writes", &self.writes)
            .field("host_lock", &self.host_lock.is_some())
            .finish_non_exhaustive()
    }
}

impl Propagator for FnPropagator {
    fn name(&self) -> &str {
        &self.name
    }

    fn reads(&self) -> FieldSet {
        self.reads.clone()
    }

    fn reads_previous(&self) -> FieldSet {
        self.reads_previous.clone()
    }

    fn writes(&self) -> Vec<(FieldId, WriteMode)> {
        self.writes.clone()
    }

    fn max_dt(&self, _space: &dyn Space) -> Option<f64> {
        self.max_dt
    }

    fn step(&self, ctx: &mut StepContext<'_>) -> Result<(), PropagatorError> {
        match &self.host_lock {
            Some(lock) => lock.run(|| (self.update)(ctx)),
            None => (self.update)(ctx),
        }
    }
}
