//! Render SLURM job scripts and submit them

/// Render the job script from project settings and run paths
pub mod script;

/// Write the job script into the run directory and hand it to sbatch
pub mod submit;
