//! The `mixbench` command line tool.
//!
//! Drives a mixed `GET`/`STAT`/`PUT`/`DELETE` workload against an object storage bucket and
//! prints latency and throughput per operation kind.

fn main() -> anyhow::Result<()> {
    mixbench_cli::cli::execute()
}
