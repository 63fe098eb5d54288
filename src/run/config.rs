use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use log::info;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;

/// File name of the run configuration inside a run directory
pub static CONFIG_FILE_NAME: &str = "experiment.json";

/// Key that always holds the run identifier
pub static RUN_NAME_KEY: &str = "exp_name";

/// Options passed to the in-container program via `--exp_config`
///
/// Keys are kept sorted so the serialised file is identical for identical input.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RunConfig {
    values: BTreeMap<String, Value>,
}

impl RunConfig {
    pub fn new(run_name: &str) -> RunConfig {
        let mut values = BTreeMap::new();
        values.insert(RUN_NAME_KEY.to_string(), Value::String(run_name.to_string()));
        RunConfig { values }
    }

    /// Add an option; the run identifier can't be replaced
    pub fn insert(&mut self, key: &str, value: Value) {
        if key == RUN_NAME_KEY {
            return;
        }
        self.values.insert(key.to_string(), value);
    }

    pub fn run_name(&self) -> &str {
        self.values
            .get(RUN_NAME_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Sorted keys, four space indent, no trailing newline
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let mut buffer = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        self.serialize(&mut serializer)?;
        // serde_json only writes valid UTF-8
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Write the configuration into a run directory
    pub fn write(&self, run_path: &Path) -> io::Result<()> {
        let out_path = run_path.join(CONFIG_FILE_NAME);
        info!("Writing run config to {}", out_path.display());
        let json = self.to_json().map_err(io::Error::from)?;
        fs::write(out_path, json)
    }
}
