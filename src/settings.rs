//! Project-wide cluster and scheduler settings
//!
//! Settings are read once from a JSON file at startup, validated against a bundled JSON schema and
//! then deserialised into [ProjectSettings]. Nothing mutates them afterwards: every component
//! borrows the same struct.

use std::fs;
use std::path::{Path, PathBuf};

use jsonschema::JSONSchema;
use log::{info, warn};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Default settings file, looked up in the current working directory
pub static DEFAULT_SETTINGS_FILE: &str = "project_config.json";

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("can't read project settings at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("project settings at {path} are not valid JSON: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("project settings at {path} fail validation: {}", .reasons.join("; "))]
    Validation { path: PathBuf, reasons: Vec<String> },
    #[error("project settings at {path} can't be deserialised: {source}")]
    Deserialisation {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Cluster, scheduler and filesystem layout for one project
///
/// Field names on disk keep the layout of existing `project_config.json` files.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProjectSettings {
    /// sbatch (or a wrapper around it)
    #[serde(default = "default_scheduler_path")]
    pub scheduler_path: PathBuf,
    /// Template bundle copied into every run directory
    #[serde(rename = "resources_path")]
    pub template_bundle: PathBuf,
    /// Each immediate subdirectory is one selectable dataset
    #[serde(rename = "base_path_data")]
    pub dataset_root: PathBuf,
    /// Run directories live here as siblings
    #[serde(rename = "base_path_exp")]
    pub run_store: PathBuf,
    pub project_name: String,
    #[serde(rename = "slurm_logs")]
    pub log_dir: PathBuf,
    #[serde(rename = "time")]
    pub wall_time: String,
    #[serde(rename = "number_tasks")]
    pub tasks: u32,
    #[serde(rename = "number_nodes")]
    pub nodes: u32,
    #[serde(rename = "number_cpus")]
    pub cpus: u32,
    pub partition: String,
    pub gres: String,
    pub exclude: String,
    pub mem: String,
    pub export: String,
    #[serde(rename = "singularity_path")]
    pub container_image: PathBuf,
    /// Program inside the template bundle that the container runs
    #[serde(default = "default_entry_program")]
    pub entry_program: String,
    #[serde(default = "default_directive_prefix")]
    pub directive_prefix: String,
}

fn default_scheduler_path() -> PathBuf {
    PathBuf::from("sbatch")
}

fn default_entry_program() -> String {
    "main.py".to_string()
}

fn default_directive_prefix() -> String {
    "#SBATCH".to_string()
}

impl ProjectSettings {
    /// Read, validate and deserialise a settings file
    pub fn load(path: &Path) -> Result<ProjectSettings, ConfigLoadError> {
        info!("Reading project settings at {}", path.display());
        let json_string = fs::read_to_string(path).map_err(|source| ConfigLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json_string, path)
    }

    /// Parse settings from a string, `origin` is only used for error messages
    pub fn from_json_str(json_string: &str, origin: &Path) -> Result<ProjectSettings, ConfigLoadError> {
        let json: Value = serde_json::from_str(json_string).map_err(|source| ConfigLoadError::Decode {
            path: origin.to_path_buf(),
            source,
        })?;

        validate(&json).map_err(|reasons| {
            warn!("Project settings fail validation");
            ConfigLoadError::Validation { path: origin.to_path_buf(), reasons }
        })?;

        info!("Deserialising valid project settings");
        serde_json::from_value::<ProjectSettings>(json).map_err(|source| ConfigLoadError::Deserialisation {
            path: origin.to_path_buf(),
            source,
        })
    }
}

/// Check raw settings against the bundled schema, collecting every violation
fn validate(json: &Value) -> Result<(), Vec<String>> {
    /// included settings schema
    static SCHEMA: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/schema/project_config.json"));
    let schema: Value = serde_json::from_str(SCHEMA).map_err(|err| vec![format!("bundled schema: {err}")])?;
    let compiled = JSONSchema::compile(&schema).map_err(|err| vec![format!("bundled schema: {err}")])?;

    if let Err(errors) = compiled.validate(json) {
        let reasons: Vec<String> = errors.map(|err| err.to_string()).collect();
        return Err(reasons);
    }
    Ok(())
}
