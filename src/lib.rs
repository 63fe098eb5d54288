//! Provision an experiment run directory and submit it to SLURM
//!
//! A launch asks for a run name and a dataset, copies the project's template bundle into a new run
//! directory, writes `experiment.json` and a `slurm.job` script next to it and calls sbatch.

/// Project-wide cluster settings
pub mod settings;

/// Run names, datasets, run config and staging
pub mod run;

/// Interactive questions
pub mod prompt;

/// Job script rendering and submission
pub mod slurm;

/// The whole workflow
pub mod launch;
