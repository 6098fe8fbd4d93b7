//! The mixed benchmark driver.
//!
//! A run moves through `Idle → Warming → Running → Draining → Done`:
//!
//! - *Warming* uploads `create_objects` baseline objects with bounded concurrency, so that reads
//!   and deletes have targets as soon as the mix starts.
//! - *Running* spawns exactly `concurrency` workers. Each worker claims the next slot of the
//!   [`AssignmentSequence`], executes it and hands the result to the [`ResultSink`], until the
//!   sequence is exhausted or the run is stopped.
//! - *Draining* lets in-flight calls finish. No worker claims a new slot after the stop signal.
//!   Workers that do not finish within the grace period fail the run.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use futures::StreamExt;
use mixbench_types::Outcome;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::{ConfigError, Error, Result};
use crate::executor::Executor;
use crate::pool::ObjectPool;
use crate::sequence::AssignmentSequence;
use crate::sink::ResultSink;

/// Settings of a single mixed benchmark run.
#[derive(Clone, Debug)]
pub struct MixedConfig {
    /// Number of objects uploaded before the mix starts.
    pub create_objects: usize,
    /// Number of concurrent workers.
    pub concurrency: usize,
    /// Stop the mixed phase after this long, even if slots remain.
    pub duration: Option<Duration>,
    /// How long workers may take to finish their in-flight call after a stop signal.
    pub grace_period: Duration,
}

impl Default for MixedConfig {
    fn default() -> Self {
        Self {
            create_objects: 2500,
            concurrency: 20,
            duration: None,
            grace_period: Duration::from_secs(30),
        }
    }
}

/// The phase a [`Mixed`] run is in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    /// Not started yet.
    Idle,
    /// Creating the baseline objects.
    Warming,
    /// Executing the operation mix.
    Running,
    /// Waiting for in-flight operations after the mix ended.
    Draining,
    /// All workers joined and all results flushed.
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Warming => "warming",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Why the mixed phase ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// Every slot of the sequence was executed.
    Exhausted,
    /// The configured duration elapsed.
    Deadline,
    /// The run was cancelled from outside.
    Cancelled,
}

/// Summary of a completed run.
#[derive(Clone, Debug)]
pub struct RunReport {
    /// Baseline objects created during warming.
    pub prepared: usize,
    /// Baseline uploads that failed.
    pub prepare_failures: usize,
    /// Size of the object pool when the mix started.
    pub pool_after_warming: usize,
    /// Number of slots in the assignment sequence.
    pub slots_total: usize,
    /// Number of slots claimed by workers.
    pub slots_claimed: usize,
    /// Size of the object pool after all workers finished.
    pub final_pool_size: usize,
    /// Why the mixed phase ended.
    pub stop_reason: StopReason,
    /// Time spent warming.
    pub warming: Duration,
    /// Time spent in the mixed phase, including draining.
    pub running: Duration,
}

/// Summary of the cleanup after a run.
#[derive(Clone, Debug, Default)]
pub struct CleanupReport {
    /// Objects deleted successfully.
    pub deleted: usize,
    /// Deletes that failed.
    pub failures: usize,
    /// Total time spent.
    pub elapsed: Duration,
}

/// Orchestrates warming, the mixed phase and shutdown.
pub struct Mixed {
    config: MixedConfig,
    executor: Arc<Executor>,
    sequence: Arc<AssignmentSequence>,
    sink: Arc<dyn ResultSink>,
    state: watch::Sender<RunState>,
    in_flight: Arc<AtomicUsize>,
}

impl fmt::Debug for Mixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mixed")
            .field("config", &self.config)
            .field("executor", &self.executor)
            .field("slots", &self.sequence.len())
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl Mixed {
    /// Creates a driver for the given sequence.
    pub fn new(
        config: MixedConfig,
        executor: Executor,
        sequence: AssignmentSequence,
        sink: Arc<dyn ResultSink>,
    ) -> Result<Self, ConfigError> {
        if config.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if sequence.is_empty() {
            return Err(ConfigError::NoSlots);
        }

        let (state, _) = watch::channel(RunState::Idle);
        Ok(Self {
            config,
            executor: Arc::new(executor),
            sequence: Arc::new(sequence),
            sink,
            state,
            in_flight: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Subscribes to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    /// The current state.
    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    /// The shared working set.
    pub fn pool(&self) -> &Arc<ObjectPool> {
        self.executor.pool()
    }

    /// The assignment sequence driving the mixed phase.
    pub fn sequence(&self) -> &AssignmentSequence {
        &self.sequence
    }

    /// Number of storage calls currently executing.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    fn transition(&self, state: RunState) {
        tracing::info!(%state, "benchmark state changed");
        self.state.send_replace(state);
    }

    /// Runs the benchmark to completion.
    ///
    /// Cancelling `cancel` stops warming or the mixed phase; workers finish their in-flight
    /// operation and exit. Per-operation failures never fail the run.
    pub async fn run(&self, cancel: CancellationToken) -> Result<RunReport> {
        self.transition(RunState::Warming);
        let start = Instant::now();
        let (prepared, prepare_failures) = self.prepare(&cancel).await;
        let warming = start.elapsed();

        let pool_after_warming = self.pool().size();
        tracing::info!(
            prepared,
            prepare_failures,
            pool_size = pool_after_warming,
            elapsed = ?warming,
            "warming finished"
        );

        let start = Instant::now();
        let stop_reason = if cancel.is_cancelled() {
            StopReason::Cancelled
        } else {
            self.transition(RunState::Running);
            self.run_mixed(&cancel).await?
        };
        let running = start.elapsed();

        self.sink.flush();
        self.transition(RunState::Done);

        let report = RunReport {
            prepared,
            prepare_failures,
            pool_after_warming,
            slots_total: self.sequence.len(),
            slots_claimed: self.sequence.claimed(),
            final_pool_size: self.pool().size(),
            stop_reason,
            warming,
            running,
        };
        tracing::info!(?report, "benchmark finished");

        Ok(report)
    }

    /// Uploads the baseline objects and returns the number of successes and failures.
    async fn prepare(&self, cancel: &CancellationToken) -> (usize, usize) {
        let executor = &self.executor;

        futures::stream::iter(0..self.config.create_objects)
            .take_until(cancel.cancelled())
            .map(|_| executor.put())
            .buffer_unordered(self.config.concurrency)
            .fold((0, 0), |(ok, failed), result| async move {
                match result.outcome {
                    Outcome::Success => (ok + 1, failed),
                    Outcome::Failed { reason, .. } => {
                        tracing::warn!(object = result.object, reason, "failed to create object");
                        (ok, failed + 1)
                    }
                }
            })
            .await
    }

    async fn run_mixed(&self, cancel: &CancellationToken) -> Result<StopReason> {
        let stop = cancel.child_token();

        let mut workers = JoinSet::new();
        for worker in 0..self.config.concurrency {
            workers.spawn(run_worker(
                worker,
                Arc::clone(&self.executor),
                Arc::clone(&self.sequence),
                Arc::clone(&self.sink),
                stop.clone(),
                Arc::clone(&self.in_flight),
            ));
        }

        let deadline = async {
            match self.config.duration {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending().await,
            }
        };

        let joined = join_workers(&mut workers);
        tokio::pin!(joined);

        let reason = tokio::select! {
            result = &mut joined => {
                result?;
                self.transition(RunState::Draining);
                return Ok(StopReason::Exhausted);
            }
            _ = deadline => StopReason::Deadline,
            _ = cancel.cancelled() => StopReason::Cancelled,
        };

        tracing::info!(?reason, in_flight = self.in_flight(), "stopping workers");
        stop.cancel();
        self.transition(RunState::Draining);

        match tokio::time::timeout(self.config.grace_period, &mut joined).await {
            Ok(result) => result.map(|()| reason),
            // Dropping the join set aborts the remaining workers.
            Err(_) => Err(Error::ShutdownTimeout {
                grace: self.config.grace_period,
                in_flight: self.in_flight(),
            }),
        }
    }

    /// Deletes every object left in the pool.
    ///
    /// Cleanup deletes are not reported to the result sink.
    pub async fn cleanup(&self) -> CleanupReport {
        let start = Instant::now();
        let records = self.pool().drain();
        tracing::info!(objects = records.len(), "deleting remaining objects");

        let backend = self.executor.backend();
        let (deleted, failures) = futures::stream::iter(records)
            .map(|record| async move {
                let result = backend.delete_object(&record.name).await;
                if let Err(ref err) = result {
                    tracing::warn!(object = record.name, error = %err, "failed to delete object");
                }
                result.is_ok()
            })
            .buffer_unordered(self.config.concurrency)
            .fold((0, 0), |(deleted, failures), ok| async move {
                if ok {
                    (deleted + 1, failures)
                } else {
                    (deleted, failures + 1)
                }
            })
            .await;

        CleanupReport {
            deleted,
            failures,
            elapsed: start.elapsed(),
        }
    }
}

async fn run_worker(
    worker: usize,
    executor: Arc<Executor>,
    sequence: Arc<AssignmentSequence>,
    sink: Arc<dyn ResultSink>,
    stop: CancellationToken,
    in_flight: Arc<AtomicUsize>,
) -> usize {
    let mut executed = 0;

    while !stop.is_cancelled() {
        let Some(slot) = sequence.claim() else {
            break;
        };

        in_flight.fetch_add(1, Ordering::Relaxed);
        let result = executor.execute(slot.kind).await;
        in_flight.fetch_sub(1, Ordering::Relaxed);

        sink.record(result);
        executed += 1;
    }

    tracing::trace!(worker, executed, "worker finished");
    executed
}

async fn join_workers(workers: &mut JoinSet<usize>) -> Result<()> {
    while let Some(result) = workers.join_next().await {
        result?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use mixbench_types::{ErrorClass, OperationKind};

    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::payload::RandomPayloads;
    use crate::sink::Collector;

    fn driver(
        config: MixedConfig,
        ops: Vec<OperationKind>,
    ) -> (InMemoryBackend, Arc<Collector>, Mixed) {
        let backend = InMemoryBackend::new();
        let executor = Executor::new(
            Arc::new(backend.clone()),
            Arc::new(ObjectPool::with_seed(1)),
            Arc::new(RandomPayloads::fixed(16).with_seed(1)),
            "test",
        );
        let collector = Arc::new(Collector::new());
        let mixed = Mixed::new(
            config,
            executor,
            AssignmentSequence::new(ops),
            collector.clone(),
        )
        .unwrap();
        (backend, collector, mixed)
    }

    #[test]
    fn rejects_zero_concurrency() {
        let executor = Executor::new(
            Arc::new(InMemoryBackend::new()),
            Arc::new(ObjectPool::new()),
            Arc::new(RandomPayloads::fixed(1)),
            "test",
        );
        let config = MixedConfig {
            concurrency: 0,
            ..Default::default()
        };
        let result = Mixed::new(
            config,
            executor,
            AssignmentSequence::new(vec![OperationKind::Put]),
            Arc::new(Collector::new()),
        );
        assert_eq!(result.unwrap_err(), ConfigError::ZeroConcurrency);
    }

    #[tokio::test]
    async fn warming_fills_the_pool() {
        let config = MixedConfig {
            create_objects: 25,
            concurrency: 4,
            ..Default::default()
        };
        let (backend, collector, mixed) = driver(config, vec![OperationKind::Stat; 10]);

        let report = mixed.run(CancellationToken::new()).await.unwrap();

        assert_eq!(report.prepared, 25);
        assert_eq!(report.pool_after_warming, 25);
        assert_eq!(report.final_pool_size, 25);
        assert_eq!(backend.len(), 25);
        assert_eq!(report.stop_reason, StopReason::Exhausted);
        // Warming uploads are not part of the results.
        assert_eq!(collector.len(), 10);
        assert_eq!(mixed.state(), RunState::Done);
    }

    #[tokio::test]
    async fn empty_pool_races_are_recorded() {
        let config = MixedConfig {
            create_objects: 1,
            concurrency: 1,
            ..Default::default()
        };
        let ops = vec![OperationKind::Delete, OperationKind::Get, OperationKind::Delete];
        let (_backend, collector, mixed) = driver(config, ops);

        let report = mixed.run(CancellationToken::new()).await.unwrap();
        assert_eq!(report.final_pool_size, 0);

        let results = collector.take();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_success());
        for result in &results[1..] {
            assert_eq!(
                result.outcome.error_class(),
                Some(ErrorClass::TargetUnavailable)
            );
        }
    }

    #[tokio::test]
    async fn cleanup_deletes_remaining_objects() {
        let config = MixedConfig {
            create_objects: 5,
            concurrency: 2,
            ..Default::default()
        };
        let (backend, _collector, mixed) = driver(config, vec![OperationKind::Put; 3]);

        mixed.run(CancellationToken::new()).await.unwrap();
        assert_eq!(backend.len(), 8);

        let cleanup = mixed.cleanup().await;
        assert_eq!(cleanup.deleted, 8);
        assert_eq!(cleanup.failures, 0);
        assert!(backend.is_empty());
        assert!(mixed.pool().is_empty());
    }

    #[tokio::test]
    async fn cancelled_before_start_skips_the_mix() {
        let config = MixedConfig {
            create_objects: 10,
            concurrency: 2,
            ..Default::default()
        };
        let (_backend, collector, mixed) = driver(config, vec![OperationKind::Get; 10]);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = mixed.run(cancel).await.unwrap();

        assert_eq!(report.prepared, 0);
        assert_eq!(report.slots_claimed, 0);
        assert_eq!(report.stop_reason, StopReason::Cancelled);
        assert!(collector.is_empty());
        assert_eq!(mixed.state(), RunState::Done);
    }
}
