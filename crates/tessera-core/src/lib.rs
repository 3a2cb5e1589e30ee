//! Core types and traits for the Tessera simulation substrate.
//!
//! This is the leaf crate with no internal dependencies. It defines the
//! vocabulary shared by every other crate in the workspace: identifiers,
//! field descriptors, commands, error types, and the field access traits.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod command;
pub mod error;
pub mod field;
pub mod id;
pub mod traits;

pub use command::Command;
pub use error::{ObsError, PropagatorError, StepError};
pub use field::{BoundaryBehavior, FieldDef, FieldMutability, FieldSet, FieldSetIter, FieldType};
pub use id::{Coord, FieldId, TickId};
pub use traits::{FieldReader, FieldWriter, SnapshotAccess};
