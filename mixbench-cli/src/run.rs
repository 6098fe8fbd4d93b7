//! Wires configuration, storage and the engine together for a single benchmark run.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use mixbench_engine::backend::{InMemoryBackend, S3CompatibleBackend};
use mixbench_engine::{
    Executor, Mixed, MixedDistribution, ObjectPool, RandomPayloads, SharedBackend,
};
use mixbench_types::OperationKind;
use rand::distr::{Alphanumeric, SampleString};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;
use yansi::Paint;

use crate::config::{Config, Storage};
use crate::report::{self, Metrics};

/// Seeds for every random decision of a run, derived from one root seed.
#[derive(Debug)]
struct Seeds {
    root: u64,
    sequence: u64,
    pool: u64,
    payloads: u64,
    prefix: u64,
}

impl Seeds {
    fn new(root: Option<u64>) -> Self {
        let root = root.unwrap_or_else(rand::random);
        let mut rng = SmallRng::seed_from_u64(root);
        Self {
            root,
            sequence: rng.random(),
            pool: rng.random(),
            payloads: rng.random(),
            prefix: rng.random(),
        }
    }
}

fn distribution(config: &Config, seed: u64) -> MixedDistribution {
    MixedDistribution::new(config.distribution)
        .with_seed(seed)
        .with_sampling(config.sampling)
}

fn backend(storage: &Storage) -> Result<SharedBackend> {
    let backend: SharedBackend = match storage {
        Storage::Memory {} => Arc::new(InMemoryBackend::new()),
        s3 @ Storage::S3Compatible { .. } => {
            let config = s3
                .s3_config()
                .context("missing S3-compatible storage settings")?;
            Arc::new(S3CompatibleBackend::new(config).context("failed to create S3 client")?)
        }
    };

    Ok(backend)
}

/// Validates the configuration and prints the resulting operation mix without touching storage.
pub fn validate(config: &Config) -> Result<()> {
    let seeds = Seeds::new(config.seed);
    config.sizes()?;
    let distribution = distribution(config, seeds.sequence);
    let probabilities = distribution.probabilities()?;
    let sequence = distribution.generate(config.slots()?)?;
    let counts = sequence.counts();

    println!(
        "{} {} slots, {} baseline objects, concurrency {}",
        "## MIX".bold(),
        sequence.len().bold(),
        config.objects,
        config.concurrency
    );
    for kind in OperationKind::ALL {
        println!(
            "  {:<8} p = {:.4}, {} slots",
            kind.as_str(),
            probabilities[kind.index()],
            counts[kind.index()].bold()
        );
    }

    Ok(())
}

/// Runs the full benchmark: warming, the mixed phase and the optional cleanup.
pub async fn run(config: Config) -> Result<()> {
    let seeds = Seeds::new(config.seed);
    tracing::info!(seed = seeds.root, "starting benchmark");

    let sequence = distribution(&config, seeds.sequence).generate(config.slots()?)?;
    tracing::info!(
        slots = sequence.len(),
        counts = ?sequence.counts(),
        sampling = ?config.sampling,
        "operation mix generated"
    );
    let payloads = RandomPayloads::new(config.sizes()?).with_seed(seeds.payloads);

    let prefix = match &config.prefix {
        Some(prefix) => prefix.clone(),
        None => {
            let mut rng = SmallRng::seed_from_u64(seeds.prefix);
            format!("mixbench/{}", Alphanumeric.sample_string(&mut rng, 8))
        }
    };

    let backend = backend(&config.storage)?;
    tracing::info!(backend = backend.name(), %prefix, "storage configured");

    let pool = Arc::new(ObjectPool::with_seed(seeds.pool));
    let executor = Executor::new(backend, pool, Arc::new(payloads), prefix);
    let metrics = Arc::new(Metrics::new());
    let mixed = Mixed::new(config.mixed(), executor, sequence, metrics.clone())?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, stopping benchmark");
                cancel.cancel();
            }
        }
    });

    let bar = ProgressBar::new_spinner()
        .with_style(ProgressStyle::with_template("{spinner} {msg} {elapsed}")?)
        .with_message(format!("{}", mixed.state()));
    bar.enable_steady_tick(Duration::from_millis(100));

    let mut states = mixed.subscribe();
    let progress = tokio::spawn({
        let bar = bar.clone();
        async move {
            while states.changed().await.is_ok() {
                let state = *states.borrow_and_update();
                bar.set_message(format!("{state}"));
            }
        }
    });

    let result = mixed.run(cancel).await;
    bar.finish_and_clear();
    progress.abort();
    let report = result?;

    println!();
    report::print_run(&report);
    println!();
    metrics.print(report.running);

    if config.cleanup {
        println!();
        let bar = ProgressBar::new_spinner()
            .with_style(ProgressStyle::with_template("{spinner} {msg} {elapsed}")?)
            .with_message("Deleting remaining objects...");
        bar.enable_steady_tick(Duration::from_millis(100));
        let cleanup = mixed.cleanup().await;
        bar.finish_and_clear();
        report::print_cleanup(&cleanup);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use mixbench_engine::Sampling;

    use super::*;

    fn memory_config() -> Config {
        Config {
            storage: Storage::Memory {},
            objects: 20,
            object_size: bytesize::ByteSize::kib(1),
            concurrency: 4,
            duration: None,
            seed: Some(7),
            ..Config::default()
        }
    }

    #[test]
    fn seeds_are_derived_deterministically() {
        let a = Seeds::new(Some(42));
        let b = Seeds::new(Some(42));

        assert_eq!(a.root, 42);
        assert_eq!(a.sequence, b.sequence);
        assert_eq!(a.pool, b.pool);
        assert_eq!(a.payloads, b.payloads);
        assert_ne!(a.sequence, a.pool);
    }

    #[test]
    fn validate_rejects_bad_weights() {
        let mut config = memory_config();
        config.distribution.delete = 50.0;

        assert!(validate(&config).is_err());
    }

    #[test]
    fn validate_accepts_defaults() {
        let mut config = memory_config();
        config.sampling = Sampling::Exact;

        validate(&config).unwrap();
    }

    #[tokio::test]
    async fn runs_against_memory() {
        run(memory_config()).await.unwrap();
    }

    #[tokio::test]
    async fn runs_without_cleanup() {
        let config = Config {
            cleanup: false,
            prefix: Some("fixed".into()),
            ..memory_config()
        };

        run(config).await.unwrap();
    }
}
