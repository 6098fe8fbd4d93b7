//! Test utilities for the mixed benchmark engine.
//!
//! This crate provides utilities to facilitate testing of the engine and its frontends. See the
//! modules for all available utilities.

pub mod backend;
pub mod tracing;
