//! Aggregation and printing of benchmark results.

use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use bytesize::ByteSize;
use mixbench_engine::{CleanupReport, ResultSink, RunReport};
use mixbench_types::{ErrorClass, OperationKind, OperationResult, Outcome};
use sketches_ddsketch::DDSketch;
use yansi::Paint;

/// Per-kind latency and throughput aggregates.
#[derive(Default)]
struct KindMetrics {
    timing: DDSketch,
    sizes: DDSketch,
    bytes: u64,
    target_unavailable: u64,
    transport: u64,
}

impl KindMetrics {
    fn failures(&self) -> u64 {
        self.target_unavailable + self.transport
    }
}

/// A [`ResultSink`] that folds results into latency sketches as they arrive.
#[derive(Default)]
pub struct Metrics {
    kinds: Mutex<[KindMetrics; 4]>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful operations of the given kind.
    pub fn successes(&self, kind: OperationKind) -> usize {
        self.lock()[kind.index()].timing.count()
    }

    /// Number of failed operations of the given kind.
    pub fn failures(&self, kind: OperationKind) -> u64 {
        self.lock()[kind.index()].failures()
    }

    /// Number of failures of the given kind and class.
    pub fn failures_of(&self, kind: OperationKind, class: ErrorClass) -> u64 {
        let kinds = self.lock();
        let metrics = &kinds[kind.index()];
        match class {
            ErrorClass::TargetUnavailable => metrics.target_unavailable,
            ErrorClass::Transport => metrics.transport,
        }
    }

    /// Bytes transferred by successful operations of the given kind.
    pub fn bytes(&self, kind: OperationKind) -> u64 {
        self.lock()[kind.index()].bytes
    }

    /// Prints a summary of all operations, using `duration` as the wall time for rates.
    pub fn print(&self, duration: Duration) {
        let kinds = self.lock();
        for kind in OperationKind::ALL {
            print_kind(kind, &kinds[kind.index()], duration);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, [KindMetrics; 4]> {
        self.kinds.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds = self.lock();
        let mut map = f.debug_map();
        for kind in OperationKind::ALL {
            let metrics = &kinds[kind.index()];
            map.entry(
                &kind.as_str(),
                &(metrics.timing.count(), metrics.failures(), metrics.bytes),
            );
        }
        map.finish()
    }
}

impl ResultSink for Metrics {
    fn record(&self, result: OperationResult) {
        let mut kinds = self.lock();
        let metrics = &mut kinds[result.kind.index()];
        match result.outcome {
            Outcome::Success => {
                metrics.timing.add(result.duration.as_secs_f64());
                metrics.bytes += result.bytes;
                if result.kind == OperationKind::Put {
                    metrics.sizes.add(result.bytes as f64);
                }
            }
            Outcome::Failed { class, .. } => match class {
                ErrorClass::TargetUnavailable => metrics.target_unavailable += 1,
                ErrorClass::Transport => metrics.transport += 1,
            },
        }
    }
}

/// Prints the phase summary of a finished run.
pub fn print_run(report: &RunReport) {
    println!(
        "{} {} objects in {:.2?}",
        "## WARMING:".bold(),
        report.prepared.bold(),
        report.warming
    );
    if report.prepare_failures > 0 {
        println!(
            "  {}",
            format!("{} UPLOAD FAILURES", report.prepare_failures)
                .bold()
                .red()
        );
    }
    println!(
        "{} {}/{} slots in {:.2?} (stopped: {:?})",
        "## MIXED:".bold(),
        report.slots_claimed.bold(),
        report.slots_total,
        report.running,
        report.stop_reason
    );
    println!(
        "  pool: {} objects at start, {} at end",
        report.pool_after_warming,
        report.final_pool_size.bold()
    );
}

/// Prints the summary of the cleanup phase.
pub fn print_cleanup(report: &CleanupReport) {
    print!(
        "{} ({} objects",
        "## CLEANUP".bold(),
        report.deleted.blue()
    );
    if report.failures > 0 {
        print!(
            ", {}",
            format!("{} FAILURES", report.failures).bold().red()
        );
    }
    println!(") in {:.2?}", report.elapsed);
}

fn print_kind(kind: OperationKind, metrics: &KindMetrics, duration: Duration) {
    let label = format!("{kind}:");
    let ops = metrics.timing.count();
    if ops == 0 {
        if metrics.failures() > 0 {
            println!(
                "{}",
                format!("{} {kind} FAILURES", metrics.failures())
                    .bold()
                    .red()
            );
        }
        return;
    }

    print!("{} ({} ops", label.bold().green(), ops.bold());
    if metrics.failures() > 0 {
        print!(
            ", {}",
            format!(
                "{} FAILURES ({} no target, {} transport)",
                metrics.failures(),
                metrics.target_unavailable,
                metrics.transport
            )
            .bold()
            .red()
        );
    }
    println!(")");

    if metrics.sizes.count() > 0 {
        print_sizes(&metrics.sizes);
    }

    print_ops(&metrics.timing, duration);
    if metrics.bytes > 0 {
        print_throughput(metrics.bytes, duration);
    } else {
        println!();
    }
    print_percentiles(&metrics.timing, Duration::from_secs_f64);
}

fn quantile(sketch: &DDSketch, q: f64) -> f64 {
    sketch.quantile(q).ok().flatten().unwrap_or_default()
}

fn average(sketch: &DDSketch) -> f64 {
    match sketch.count() {
        0 => 0.0,
        count => sketch.sum().unwrap_or_default() / count as f64,
    }
}

fn print_sizes(sketch: &DDSketch) {
    let avg = ByteSize::b(average(sketch) as u64);
    let p50 = ByteSize::b(quantile(sketch, 0.5) as u64);
    let p90 = ByteSize::b(quantile(sketch, 0.9) as u64);
    let p99 = ByteSize::b(quantile(sketch, 0.99) as u64);
    println!(
        "  size avg: {}; p50: {p50:.2}; p90: {p90:.2}; p99: {p99:.2}",
        avg.bold()
    );
}

fn print_percentiles<T: fmt::Debug>(sketch: &DDSketch, map: impl Fn(f64) -> T) {
    let avg = map(average(sketch));
    let p50 = map(quantile(sketch, 0.5));
    let p90 = map(quantile(sketch, 0.9));
    let p99 = map(quantile(sketch, 0.99));
    println!(
        "  avg: {:.2?}; p50: {p50:.2?}; p90: {p90:.2?}; p99: {p99:.2?}",
        avg.bold()
    );
}

fn print_ops(sketch: &DDSketch, duration: Duration) {
    let ops_ps = sketch.count() as f64 / duration.as_secs_f64().max(f64::EPSILON);
    print!("  {:.2} operations/s", ops_ps.bold());
}

fn print_throughput(total: u64, duration: Duration) {
    let throughput = (total as f64 / duration.as_secs_f64().max(f64::EPSILON)) as u64;
    println!(", {:.2}/s", ByteSize::b(throughput).bold());
}
