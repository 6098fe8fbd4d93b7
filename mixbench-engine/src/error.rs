//! Run-level and per-operation errors.

use std::time::Duration;

use mixbench_types::{ErrorClass, OperationKind};
use thiserror::Error;

use crate::backend::BackendError;

/// A configuration that cannot be scheduled. The run never starts.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// A weight was below zero.
    #[error("{kind} weight must not be negative, got {weight}")]
    NegativeWeight {
        /// The offending operation kind.
        kind: OperationKind,
        /// The configured weight.
        weight: f64,
    },

    /// A weight was NaN or infinite.
    #[error("{kind} weight must be a finite number")]
    NonFiniteWeight {
        /// The offending operation kind.
        kind: OperationKind,
    },

    /// All weights were zero.
    #[error("the sum of all operation weights must be positive")]
    ZeroWeights,

    /// The mix deletes objects faster than it creates them.
    #[error("DELETE weight ({delete}) cannot be bigger than PUT weight ({put})")]
    DeleteExceedsPut {
        /// The configured PUT weight.
        put: f64,
        /// The configured DELETE weight.
        delete: f64,
    },

    /// The assignment sequence would be empty.
    #[error("at least one operation slot is required")]
    NoSlots,

    /// No workers were configured.
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,

    /// The object size distribution cannot be constructed.
    #[error("invalid object size distribution: {0}")]
    InvalidSizes(String),
}

/// Fatal errors that abort a whole benchmark run.
#[derive(Debug, Error)]
pub enum Error {
    /// The run was rejected before it started.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Workers kept running past the grace period after a stop signal.
    #[error("workers did not drain within {grace:?} ({in_flight} operations still in flight)")]
    ShutdownTimeout {
        /// The configured grace period.
        grace: Duration,
        /// Number of storage calls that had not completed.
        in_flight: usize,
    },

    /// A worker task panicked or was aborted.
    #[error("worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Result type for run-level operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure of a single operation.
///
/// These never abort a run. The executor folds them into a failed
/// [`OperationResult`](mixbench_types::OperationResult).
#[derive(Debug, Error)]
pub enum OperationError {
    /// The working set was empty when a target was needed.
    #[error("no target available")]
    TargetUnavailable,

    /// The storage call failed.
    #[error(transparent)]
    Transport(#[from] BackendError),
}

impl OperationError {
    /// Returns the coarse classification recorded in results.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::TargetUnavailable => ErrorClass::TargetUnavailable,
            Self::Transport(_) => ErrorClass::Transport,
        }
    }
}
