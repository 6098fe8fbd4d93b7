//! Value types shared between the benchmark engine and its frontends.
//!
//! An [`OperationKind`] tags every unit of work, an [`ObjectRecord`] describes an object the
//! benchmark believes to exist in the bucket, and an [`OperationResult`] is the immutable record
//! emitted for every executed operation.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod object;
pub mod operation;

pub use object::ObjectRecord;
pub use operation::{ErrorClass, OperationKind, OperationResult, Outcome, ParseKindError};
