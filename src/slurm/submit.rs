use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info, warn};
use thiserror::Error;
use walkdir::WalkDir;

use crate::run::stage::RunDirectory;
use crate::settings::ProjectSettings;
use crate::slurm::script::SubmissionScript;

/// File name of the job script inside a run directory
pub static SCRIPT_FILE_NAME: &str = "slurm.job";

/// rwxrwxr-x, so cluster processes running as another user in the group can use the run
pub const RUN_DIR_MODE: u32 = 0o775;

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Can't write job script {path}: {source}")]
    WriteScript {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Can't set permissions on {path}: {source}")]
    Permissions {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Can't run {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{program} rejected the job (exit code {}): {stderr}", .code.map_or("none".to_string(), |c| c.to_string()))]
    Rejected {
        program: PathBuf,
        code: Option<i32>,
        stderr: String,
    },
}

/// Exit status and captured output of an external command
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// `None` if the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs an external program to completion
pub trait CommandRunner {
    fn run(&self, program: &Path, args: &[&OsStr]) -> io::Result<CommandOutput>;
}

/// Blocking [std::process::Command], no timeout
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &Path, args: &[&OsStr]) -> io::Result<CommandOutput> {
        let mut command = Command::new(program);
        let cmd = command.args(args);
        info!("{:?}", &cmd);
        let output = cmd.output()?;
        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// A job script written to disk
#[derive(Debug, Clone, PartialEq)]
pub struct JobPath {
    pub path: PathBuf,
}

/// A job sbatch accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedJob {
    /// From "Submitted batch job <id>", if sbatch printed it
    pub job_id: Option<String>,
    pub stdout: String,
}

/// Write the script, open up permissions on the run directory and call sbatch
///
/// The run directory is left alone when sbatch fails, so the job can be resubmitted by hand.
pub fn submit_run(settings: &ProjectSettings,
                  run: &RunDirectory,
                  script: &SubmissionScript,
                  runner: &dyn CommandRunner) -> Result<SubmittedJob, SubmissionError> {
    let job = write_script(run, script)?;
    set_permissions(&run.path)?;
    run_sbatch(settings, &job, runner)
}

/// Write the rendered script verbatim, replacing any previous one
pub fn write_script(run: &RunDirectory, script: &SubmissionScript) -> Result<JobPath, SubmissionError> {
    let path = run.path.join(SCRIPT_FILE_NAME);
    info!("Writing job script to {}", path.display());
    fs::write(&path, script.content()).map_err(|source| SubmissionError::WriteScript { path: path.clone(), source })?;
    Ok(JobPath { path })
}

/// Recursively set [RUN_DIR_MODE] on a directory and everything in it
///
/// Symlinks are neither followed nor changed, like `chmod -R`.
pub fn set_permissions(run_path: &Path) -> Result<(), SubmissionError> {
    info!("Setting permissions {:o} on {}", RUN_DIR_MODE, run_path.display());
    for entry in WalkDir::new(run_path) {
        let entry = entry.map_err(|err| SubmissionError::Permissions {
            path: err.path().unwrap_or(run_path).to_path_buf(),
            source: err.into(),
        })?;
        if entry.path_is_symlink() {
            debug!("Leaving symlink {} alone", entry.path().display());
            continue;
        }
        set_mode(entry.path()).map_err(|source| SubmissionError::Permissions {
            path: entry.path().to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(RUN_DIR_MODE))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Call sbatch with the job script as the only argument
fn run_sbatch(settings: &ProjectSettings,
              job: &JobPath,
              runner: &dyn CommandRunner) -> Result<SubmittedJob, SubmissionError> {
    let program = &settings.scheduler_path;
    info!("Running sbatch process");
    let output = runner
        .run(program, &[job.path.as_os_str()])
        .map_err(|source| SubmissionError::Spawn { program: program.clone(), source })?;

    if !output.success() {
        warn!("sbatch failed, run directory {} is kept", job.path.parent().unwrap_or(&job.path).display());
        return Err(SubmissionError::Rejected {
            program: program.clone(),
            code: output.code,
            stderr: output.stderr.trim().to_string(),
        });
    }

    let job_id = parse_job_id(&output.stdout);
    match &job_id {
        Some(id) => info!("SLURM job id: {id}"),
        None => warn!("No job id in sbatch output: {}", output.stdout.trim()),
    }
    Ok(SubmittedJob { job_id, stdout: output.stdout })
}

/// Job id from "Submitted batch job 1234" or `--parsable` style "1234;cluster"
pub fn parse_job_id(stdout: &str) -> Option<String> {
    let line = stdout.lines().map(str::trim).find(|line| !line.is_empty())?;
    let id = match line.strip_prefix("Submitted batch job") {
        Some(rest) => rest.trim(),
        None => line.split(';').next().unwrap_or(line),
    };
    if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
        Some(id.to_string())
    } else {
        None
    }
}
