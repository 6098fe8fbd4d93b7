//! The mixed-workload engine.
//!
//! This crate drives a population of concurrent workers that issue `GET`, `STAT`, `PUT` and
//! `DELETE` calls against an object storage bucket, following a configured probability mix.
//!
//! The building blocks, leaf first:
//!
//! - [`MixedDistribution`] validates four weights and eagerly generates an
//!   [`AssignmentSequence`] of operation kinds.
//! - [`ObjectPool`] tracks the objects currently believed to exist, with O(1) insertion and
//!   uniform random selection under concurrent access.
//! - [`Executor`] runs a single operation, picking targets from the pool and recording an
//!   [`OperationResult`](mixbench_types::OperationResult).
//! - [`Mixed`] warms the pool, fans the sequence out to a fixed number of workers and drains
//!   them on shutdown.
//!
//! The storage client, payload generation and result aggregation are pluggable through the
//! [`Backend`], [`PayloadSource`] and [`ResultSink`] traits.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod backend;
pub mod distribution;
pub mod error;
pub mod executor;
pub mod mixed;
pub mod payload;
pub mod pool;
pub mod sequence;
pub mod sink;

pub use backend::{Backend, BackendError, SharedBackend};
pub use distribution::{MixedDistribution, Sampling, Weights};
pub use error::{ConfigError, Error, OperationError, Result};
pub use executor::Executor;
pub use mixed::{CleanupReport, Mixed, MixedConfig, RunReport, RunState, StopReason};
pub use payload::{Payload, PayloadSource, RandomPayloads, SizeDistribution};
pub use pool::ObjectPool;
pub use sequence::{AssignmentSequence, Slot};
pub use sink::{Collector, ResultSink};
