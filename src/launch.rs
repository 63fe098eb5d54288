//! One launch, start to finish: ask, stage, render, submit
//!
//! Every step blocks until it is done. Nothing is rolled back when a later step fails.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use log::info;
use thiserror::Error;

use crate::prompt::collect::{ask, PromptError};
use crate::prompt::question::{experiment_questions, DATA_PATH, RUN_NAME};
use crate::run::data::{list_datasets, NoDataAvailableError};
use crate::run::name::RunStore;
use crate::run::stage::{stage_run, CreateMode, RunDirectory, StagingError};
use crate::settings::ProjectSettings;
use crate::slurm::script::render_script;
use crate::slurm::submit::{set_permissions, submit_run, write_script, CommandRunner, SubmissionError, SubmittedJob};

/// Exit status used when the operator cancels at a prompt
pub const CANCELLED_EXIT_CODE: i32 = 130;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error(transparent)]
    NoDataAvailable(#[from] NoDataAvailableError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error("No answer for {0}")]
    MissingAnswer(&'static str),
    #[error(transparent)]
    Staging(#[from] StagingError),
    #[error("Can't render job script: {0}")]
    Render(#[from] tinytemplate::error::Error),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
}

impl LaunchError {
    pub fn exit_code(&self) -> i32 {
        match self {
            LaunchError::Prompt(PromptError::Cancelled) => CANCELLED_EXIT_CODE,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LaunchOptions {
    /// Stage and write the job script but don't call sbatch
    pub dry_run: bool,
    pub create_mode: CreateMode,
}

#[derive(Debug)]
pub enum Outcome {
    Submitted { run: RunDirectory, job: SubmittedJob },
    DryRun { run: RunDirectory, script_path: PathBuf, container_cmd: String },
}

/// Collect input, stage the run directory and submit it
pub fn launch<R: BufRead, W: Write>(settings: &ProjectSettings,
                                    options: LaunchOptions,
                                    input: &mut R,
                                    output: &mut W,
                                    runner: &dyn CommandRunner) -> Result<Outcome, LaunchError> {
    let datasets = list_datasets(&settings.dataset_root)?;
    let store = RunStore::new(&settings.run_store);
    let questions = experiment_questions(&store, &datasets);
    let answers = ask(&questions, input, output)?;

    let config = answers.run_config(&questions).ok_or(LaunchError::MissingAnswer(RUN_NAME))?;
    let data_path = answers.get(DATA_PATH).ok_or(LaunchError::MissingAnswer(DATA_PATH))?;

    let run = stage_run(settings, &config, options.create_mode)?;
    let script = render_script(settings, &run.path, Path::new(data_path))?;

    if options.dry_run {
        info!("--dry-run set, not submitting");
        let job = write_script(&run, &script)?;
        set_permissions(&run.path)?;
        return Ok(Outcome::DryRun {
            run,
            script_path: job.path,
            container_cmd: script.container_command().to_string(),
        });
    }

    let job = submit_run(settings, &run, &script, runner)?;
    Ok(Outcome::Submitted { run, job })
}
