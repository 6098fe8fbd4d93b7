//! Command line driver for the mixed-workload benchmark.
//!
//! See [`config::Config`] for the available settings.

pub mod cli;
pub mod config;
pub mod observability;
pub mod report;
pub mod run;
