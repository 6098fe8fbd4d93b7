//! Blackbox tests for the mixed benchmark driver.
//!
//! These run complete benchmarks against the in-memory backend and assert the relation between
//! the working set, the backend contents and the recorded results.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use mixbench_engine::backend::InMemoryBackend;
use mixbench_engine::{
    Collector, Executor, Mixed, MixedConfig, MixedDistribution, ObjectPool, RandomPayloads,
    SharedBackend, StopReason, Weights,
};
use mixbench_types::{ErrorClass, OperationKind, OperationResult};
use mixbench_test::backend::FaultyBackend;
use tokio_util::sync::CancellationToken;

fn count(results: &[OperationResult], kind: OperationKind, success: bool) -> usize {
    results
        .iter()
        .filter(|r| r.kind == kind && r.is_success() == success)
        .count()
}

fn build(
    backend: SharedBackend,
    config: MixedConfig,
    slots: usize,
    seed: u64,
) -> Result<(Arc<Collector>, Mixed)> {
    let sequence = MixedDistribution::new(Weights::default())
        .with_seed(seed)
        .generate(slots)?;
    let executor = Executor::new(
        backend,
        Arc::new(ObjectPool::with_seed(seed)),
        Arc::new(RandomPayloads::fixed(1024).with_seed(seed)),
        "mixbench",
    );
    let collector = Arc::new(Collector::new());
    let mixed = Mixed::new(config, executor, sequence, collector.clone())?;
    Ok((collector, mixed))
}

#[tokio::test]
async fn default_mix_end_to_end() -> Result<()> {
    mixbench_test::tracing::init();

    let backend = InMemoryBackend::new();
    let config = MixedConfig {
        create_objects: 10,
        concurrency: 4,
        ..Default::default()
    };
    let (collector, mixed) = build(Arc::new(backend.clone()), config, 20, 42)?;

    let report = mixed.run(CancellationToken::new()).await?;
    let results = collector.take();

    assert_eq!(report.prepared, 10);
    assert_eq!(report.pool_after_warming, 10);
    assert_eq!(report.slots_total, 20);
    assert_eq!(report.slots_claimed, 20);
    assert_eq!(report.stop_reason, StopReason::Exhausted);
    assert_eq!(results.len(), 20);

    // Every operation that found a target succeeded against the fault-free backend.
    for result in &results {
        match result.outcome.error_class() {
            None => assert!(result.object.is_some()),
            Some(class) => assert_eq!(class, ErrorClass::TargetUnavailable, "{result:?}"),
        }
    }

    let puts = count(&results, OperationKind::Put, true);
    let deletes = count(&results, OperationKind::Delete, true);
    assert_eq!(report.final_pool_size, 10 + puts - deletes);
    assert_eq!(backend.len(), report.final_pool_size);

    Ok(())
}

#[tokio::test]
async fn results_carry_timing_and_bytes() -> Result<()> {
    let backend = InMemoryBackend::new();
    let config = MixedConfig {
        create_objects: 5,
        concurrency: 2,
        ..Default::default()
    };
    let (collector, mixed) = build(Arc::new(backend), config, 50, 7)?;

    let run_start = std::time::SystemTime::now();
    mixed.run(CancellationToken::new()).await?;

    for result in collector.take() {
        assert!(result.start >= run_start);
        if !result.is_success() {
            continue;
        }
        let expected = match result.kind {
            OperationKind::Get | OperationKind::Put => 1024,
            OperationKind::Stat | OperationKind::Delete => 0,
        };
        assert_eq!(result.bytes, expected, "{result:?}");
    }

    Ok(())
}

#[tokio::test]
async fn transport_failures_do_not_stop_the_run() -> Result<()> {
    let faulty = Arc::new(FaultyBackend::new(InMemoryBackend::new(), 5));
    let config = MixedConfig {
        create_objects: 10,
        concurrency: 4,
        ..Default::default()
    };
    let (collector, mixed) = build(faulty.clone(), config, 40, 3)?;

    let report = mixed.run(CancellationToken::new()).await?;
    let results = collector.take();

    assert_eq!(results.len(), 40);
    assert_eq!(report.prepare_failures, 2);
    assert_eq!(report.prepared, 8);

    let transport = results
        .iter()
        .filter(|r| r.outcome.error_class() == Some(ErrorClass::Transport))
        .count();
    assert!(transport > 0);
    assert_eq!(transport + report.prepare_failures, faulty.failures());

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pool_matches_backend_under_contention() -> Result<()> {
    let backend = InMemoryBackend::new();
    let config = MixedConfig {
        create_objects: 50,
        concurrency: 16,
        ..Default::default()
    };
    let (collector, mixed) = build(Arc::new(backend.clone()), config, 2000, 11)?;

    let report = mixed.run(CancellationToken::new()).await?;
    let results = collector.take();
    assert_eq!(results.len(), 2000);

    let puts = count(&results, OperationKind::Put, true);
    let deletes = count(&results, OperationKind::Delete, true);
    assert_eq!(report.final_pool_size, 50 + puts - deletes);
    assert_eq!(backend.len(), report.final_pool_size);

    let cleanup = mixed.cleanup().await;
    assert_eq!(cleanup.deleted, report.final_pool_size);
    assert!(backend.is_empty());

    Ok(())
}

#[tokio::test]
async fn same_seed_same_mix() -> Result<()> {
    let run = |seed| async move {
        let config = MixedConfig {
            create_objects: 5,
            concurrency: 1,
            ..Default::default()
        };
        let (collector, mixed) = build(Arc::new(InMemoryBackend::new()), config, 100, seed)?;
        mixed.run(CancellationToken::new()).await?;
        let kinds: Vec<_> = collector.take().into_iter().map(|r| r.kind).collect();
        anyhow::Ok(kinds)
    };

    assert_eq!(run(5).await?, run(5).await?);
    Ok(())
}

#[tokio::test]
async fn duration_bounds_the_mix() -> Result<()> {
    let backend = mixbench_test::backend::SlowBackend::new(
        InMemoryBackend::new(),
        Duration::from_millis(10),
    );
    let config = MixedConfig {
        create_objects: 2,
        concurrency: 2,
        duration: Some(Duration::from_millis(200)),
        ..Default::default()
    };
    let (collector, mixed) = build(Arc::new(backend), config, 100_000, 1)?;

    let report = mixed.run(CancellationToken::new()).await?;

    assert_eq!(report.stop_reason, StopReason::Deadline);
    assert!(report.slots_claimed < 100_000);
    assert_eq!(collector.len(), report.slots_claimed);

    Ok(())
}
