//! Executes a single operation against the storage backend.

use std::sync::Arc;
use std::time::{Instant, SystemTime};

use mixbench_types::{ObjectRecord, OperationKind, OperationResult, Outcome};
use uuid::Uuid;

use crate::backend::SharedBackend;
use crate::error::OperationError;
use crate::payload::PayloadSource;
use crate::pool::ObjectPool;

/// Runs one operation at a time, selecting targets from the shared [`ObjectPool`].
///
/// Every call to [`execute`](Self::execute) produces exactly one [`OperationResult`]. Failures
/// are recorded in the result and never retried.
#[derive(Debug)]
pub struct Executor {
    backend: SharedBackend,
    pool: Arc<ObjectPool>,
    payloads: Arc<dyn PayloadSource>,
    prefix: String,
}

impl Executor {
    /// Creates an executor writing objects below `prefix`.
    pub fn new(
        backend: SharedBackend,
        pool: Arc<ObjectPool>,
        payloads: Arc<dyn PayloadSource>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            pool,
            payloads,
            prefix: prefix.into(),
        }
    }

    /// The working set this executor reads from and writes to.
    pub fn pool(&self) -> &Arc<ObjectPool> {
        &self.pool
    }

    /// The storage backend.
    pub fn backend(&self) -> &SharedBackend {
        &self.backend
    }

    /// The prefix of all object names created by this executor.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Executes one operation of the given kind.
    pub async fn execute(&self, kind: OperationKind) -> OperationResult {
        match kind {
            OperationKind::Put => self.put().await,
            OperationKind::Get => self.get().await,
            OperationKind::Stat => self.stat().await,
            OperationKind::Delete => self.delete().await,
        }
    }

    /// Uploads a new object and adds it to the pool on success.
    pub async fn put(&self) -> OperationResult {
        let name = self.object_name();
        let payload = self.payloads.next_payload();

        let timer = Timer::start();
        let result = self.backend.put_object(&name, payload).await;
        match result {
            Ok(response) => {
                let size = response.size;
                self.pool
                    .add(ObjectRecord::new(name.clone(), size).with_etag(response.etag));
                timer.finish(OperationKind::Put, Some(name), Ok(size))
            }
            Err(err) => timer.finish(OperationKind::Put, Some(name), Err(err.into())),
        }
    }

    async fn get(&self) -> OperationResult {
        let timer = Timer::start();
        let Some(target) = self.pool.peek_random() else {
            return timer.finish(OperationKind::Get, None, Err(OperationError::TargetUnavailable));
        };

        let result = self.backend.get_object(&target.name).await;
        let result = result
            .map(|contents| contents.len() as u64)
            .map_err(OperationError::from);
        timer.finish(OperationKind::Get, Some(target.name), result)
    }

    async fn stat(&self) -> OperationResult {
        let timer = Timer::start();
        let Some(target) = self.pool.peek_random() else {
            return timer.finish(OperationKind::Stat, None, Err(OperationError::TargetUnavailable));
        };

        let result = self.backend.stat_object(&target.name).await;
        // STAT transfers no payload.
        let result = result.map(|_meta| 0).map_err(OperationError::from);
        timer.finish(OperationKind::Stat, Some(target.name), result)
    }

    /// Removes a random object from the pool and deletes it.
    ///
    /// The object is not re-inserted when the storage call fails: a stale pool entry would send
    /// later operations to an object that may no longer exist.
    async fn delete(&self) -> OperationResult {
        let timer = Timer::start();
        let Some(target) = self.pool.remove_random() else {
            return timer.finish(
                OperationKind::Delete,
                None,
                Err(OperationError::TargetUnavailable),
            );
        };

        let result = self.backend.delete_object(&target.name).await;
        let result = result.map(|()| 0).map_err(OperationError::from);
        timer.finish(OperationKind::Delete, Some(target.name), result)
    }

    fn object_name(&self) -> String {
        format!("{}/{}.rnd", self.prefix, Uuid::new_v4().simple())
    }
}

/// Captures wall-clock start and a monotonic timer for one operation.
struct Timer {
    start: SystemTime,
    instant: Instant,
}

impl Timer {
    fn start() -> Self {
        Self {
            start: SystemTime::now(),
            instant: Instant::now(),
        }
    }

    fn finish(
        self,
        kind: OperationKind,
        object: Option<String>,
        result: Result<u64, OperationError>,
    ) -> OperationResult {
        let duration = self.instant.elapsed();
        let (outcome, bytes) = match result {
            Ok(bytes) => (Outcome::Success, bytes),
            Err(err) => {
                tracing::debug!(%kind, object = object.as_deref(), error = %err, "operation failed");
                let outcome = Outcome::Failed {
                    class: err.class(),
                    reason: err.to_string(),
                };
                (outcome, 0)
            }
        };

        OperationResult {
            kind,
            object,
            start: self.start,
            duration,
            outcome,
            bytes,
        }
    }
}
