use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

use serde_json::Value;

use crate::run::config::{RunConfig, RUN_NAME_KEY};
use crate::run::name::RunStore;

/// Answer name of the run identifier question
pub static RUN_NAME: &str = "exp_name";
/// Answer name of the dataset question
pub static DATA_PATH: &str = "data_path";

/// Checks a free text answer
///
/// The outer error aborts the prompt, the inner one is shown to the operator before asking again.
pub trait Validate {
    fn validate(&self, candidate: &str) -> io::Result<Result<(), String>>;
}

impl Validate for RunStore {
    fn validate(&self, candidate: &str) -> io::Result<Result<(), String>> {
        Ok(self.check_name(candidate)?.map_err(|err| err.to_string()))
    }
}

pub enum QuestionKind<'a> {
    /// Free text, optionally validated
    Input { validator: Option<&'a dyn Validate> },
    /// Pick one of a fixed list
    List { choices: Vec<String> },
}

pub struct Question<'a> {
    pub name: &'static str,
    pub message: String,
    pub kind: QuestionKind<'a>,
    /// Copy the answer into the run config under this key
    pub config_key: Option<&'static str>,
}

/// Answers keyed by question name
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Answers {
    pub values: BTreeMap<String, String>,
}

impl Answers {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Build the run config from the answers of questions that feed it
    pub fn run_config(&self, questions: &[Question]) -> Option<RunConfig> {
        let mut config = RunConfig::new(self.get(RUN_NAME)?);
        for question in questions {
            match (question.config_key, self.get(question.name)) {
                (Some(key), Some(answer)) if key != RUN_NAME_KEY => {
                    config.insert(key, Value::String(answer.to_string()));
                }
                _ => {}
            }
        }
        Some(config)
    }
}

/// The questions asked before every launch: run name, then dataset
pub fn experiment_questions<'a>(store: &'a RunStore, datasets: &[PathBuf]) -> Vec<Question<'a>> {
    vec![
        Question {
            name: RUN_NAME,
            message: "Experiment name:".to_string(),
            kind: QuestionKind::Input { validator: Some(store as &dyn Validate) },
            config_key: Some(RUN_NAME_KEY),
        },
        Question {
            name: DATA_PATH,
            message: "Data path:".to_string(),
            kind: QuestionKind::List {
                choices: datasets.iter().map(|path| path.display().to_string()).collect(),
            },
            config_key: None,
        },
    ]
}
