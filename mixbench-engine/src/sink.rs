//! Destinations for completed [`OperationResult`]s.

use std::sync::{Arc, Mutex, PoisonError};

use mixbench_types::OperationResult;

/// Receives every result produced during the mixed phase.
///
/// Results arrive from many workers concurrently and in no particular order.
pub trait ResultSink: Send + Sync {
    /// Hands over one result.
    fn record(&self, result: OperationResult);

    /// Called once after all workers have been joined.
    fn flush(&self) {}
}

impl<S: ResultSink + ?Sized> ResultSink for Arc<S> {
    fn record(&self, result: OperationResult) {
        (**self).record(result)
    }

    fn flush(&self) {
        (**self).flush()
    }
}

/// A sink that keeps every result in memory.
#[derive(Debug, Default)]
pub struct Collector {
    results: Mutex<Vec<OperationResult>>,
}

impl Collector {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of results collected so far.
    pub fn len(&self) -> usize {
        self.results.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if no results were collected.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Takes all collected results.
    pub fn take(&self) -> Vec<OperationResult> {
        std::mem::take(&mut *self.results.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl ResultSink for Collector {
    fn record(&self, result: OperationResult) {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(result);
    }
}
