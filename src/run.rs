//! Everything that happens to a run directory before it is handed to SLURM

/// Check proposed run names against the run store
pub mod name;
/// List the datasets a run can be pointed at
pub mod data;
/// Per-run configuration written into the run directory
pub mod config;
/// Copy the template bundle and write the run configuration
pub mod stage;
