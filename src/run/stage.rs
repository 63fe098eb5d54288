use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};
use thiserror::Error;
use walkdir::WalkDir;

use crate::run::config::RunConfig;
use crate::settings::ProjectSettings;

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("Template bundle {0} doesn't exist")]
    MissingBundle(PathBuf),
    #[error("Template bundle {bundle} doesn't contain the entry program {program}")]
    MissingEntryProgram { bundle: PathBuf, program: String },
    #[error("Run directory {0} already exists")]
    AlreadyExists(PathBuf),
    #[error("Can't create run directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Can't copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Can't walk template bundle {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("Can't write run config into {path}: {source}")]
    WriteConfig {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// How the run directory itself is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CreateMode {
    /// Reuse an existing directory. The name was checked at prompt time only, so a run created by
    /// someone else in the meantime gets overwritten.
    #[default]
    Shared,
    /// Fail if the directory appeared after the name was validated
    Exclusive,
}

/// A staged run directory, ready for a job script
#[derive(Debug, Clone, PartialEq)]
pub struct RunDirectory {
    pub path: PathBuf,
}

/// Create `run_store/run_name`, copy the template bundle into it and write the run config
///
/// Nothing is cleaned up on failure: a half copied directory stays on disk.
pub fn stage_run(settings: &ProjectSettings,
                 config: &RunConfig,
                 mode: CreateMode) -> Result<RunDirectory, StagingError> {
    let run_path = settings.run_store.join(config.run_name());
    info!("Staging run {} in {}", config.run_name(), run_path.display());

    check_bundle(&settings.template_bundle, &settings.entry_program)?;
    create_run_dir(&run_path, mode)?;
    copy_tree(&settings.template_bundle, &run_path)?;
    config.write(&run_path).map_err(|source| StagingError::WriteConfig { path: run_path.clone(), source })?;

    Ok(RunDirectory { path: run_path })
}

fn check_bundle(bundle: &Path, entry_program: &str) -> Result<(), StagingError> {
    if !bundle.is_dir() {
        return Err(StagingError::MissingBundle(bundle.to_path_buf()));
    }
    if !bundle.join(entry_program).is_file() {
        return Err(StagingError::MissingEntryProgram {
            bundle: bundle.to_path_buf(),
            program: entry_program.to_string(),
        });
    }
    Ok(())
}

fn create_run_dir(run_path: &Path, mode: CreateMode) -> Result<(), StagingError> {
    let create_error = |source| StagingError::CreateDir { path: run_path.to_path_buf(), source };
    match mode {
        CreateMode::Shared => {
            if run_path.exists() {
                warn!("Run directory {} already exists, files will be overwritten", run_path.display());
            }
            fs::create_dir_all(run_path).map_err(create_error)
        }
        CreateMode::Exclusive => {
            if let Some(parent) = run_path.parent() {
                fs::create_dir_all(parent).map_err(create_error)?;
            }
            match fs::create_dir(run_path) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    Err(StagingError::AlreadyExists(run_path.to_path_buf()))
                }
                Err(err) => Err(create_error(err)),
            }
        }
    }
}

/// Recursively copy `from` into `to`, keeping relative paths and overwriting files
///
/// Entries are copied in file name order. Symlinks are followed, so a linked directory is copied
/// as a real directory with its contents; a dangling or looping link fails the copy.
pub fn copy_tree(from: &Path, to: &Path) -> Result<(), StagingError> {
    info!("Copying template bundle {} to {}", from.display(), to.display());
    for entry in WalkDir::new(from).min_depth(1).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|source| StagingError::Walk { path: from.to_path_buf(), source })?;
        let relative = entry.path().strip_prefix(from).unwrap_or(entry.path());
        let target = to.join(relative);
        let copy_error = |source| StagingError::Copy {
            from: entry.path().to_path_buf(),
            to: target.clone(),
            source,
        };

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(copy_error)?;
        } else {
            fs::copy(entry.path(), &target).map_err(copy_error)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::tests::settings_json;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        settings: ProjectSettings,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let bundle = dir.path().join("resources");
        fs::create_dir_all(bundle.join("lib")).unwrap();
        fs::write(bundle.join("main.py"), "print('hello')\n").unwrap();
        fs::write(bundle.join("lib").join("util.py"), "X = 1\n").unwrap();

        let mut json = settings_json();
        json["resources_path"] = bundle.to_str().unwrap().into();
        json["base_path_exp"] = dir.path().join("experiments").to_str().unwrap().into();
        let settings: ProjectSettings = serde_json::from_value(json).unwrap();
        Fixture { _dir: dir, settings }
    }

    #[test]
    fn stages_bundle_and_config() {
        let fx = fixture();
        let run = stage_run(&fx.settings, &RunConfig::new("exp1"), CreateMode::Shared).unwrap();

        assert_eq!(run.path, fx.settings.run_store.join("exp1"));
        assert_eq!(fs::read_to_string(run.path.join("main.py")).unwrap(), "print('hello')\n");
        assert_eq!(fs::read_to_string(run.path.join("lib/util.py")).unwrap(), "X = 1\n");
        assert!(run.path.join("experiment.json").is_file());
    }

    #[test]
    fn shared_mode_overwrites_an_existing_run() {
        let fx = fixture();
        let run_path = fx.settings.run_store.join("exp1");
        fs::create_dir_all(&run_path).unwrap();
        fs::write(run_path.join("main.py"), "stale").unwrap();
        fs::write(run_path.join("keep.txt"), "mine").unwrap();

        stage_run(&fx.settings, &RunConfig::new("exp1"), CreateMode::Shared).unwrap();
        assert_eq!(fs::read_to_string(run_path.join("main.py")).unwrap(), "print('hello')\n");
        assert_eq!(fs::read_to_string(run_path.join("keep.txt")).unwrap(), "mine");
    }

    #[test]
    fn exclusive_mode_refuses_an_existing_run() {
        let fx = fixture();
        let run_path = fx.settings.run_store.join("exp1");
        fs::create_dir_all(&run_path).unwrap();

        let result = stage_run(&fx.settings, &RunConfig::new("exp1"), CreateMode::Exclusive);
        assert!(matches!(result, Err(StagingError::AlreadyExists(path)) if path == run_path));
        assert!(!run_path.join("main.py").exists());
    }

    #[test]
    fn exclusive_mode_creates_a_new_run() {
        let fx = fixture();
        let run = stage_run(&fx.settings, &RunConfig::new("exp2"), CreateMode::Exclusive).unwrap();
        assert!(run.path.join("main.py").is_file());
    }

    #[test]
    fn missing_bundle_fails_before_creating_the_run() {
        let mut fx = fixture();
        fx.settings.template_bundle = fx.settings.template_bundle.join("nope");
        let result = stage_run(&fx.settings, &RunConfig::new("exp1"), CreateMode::Shared);
        assert!(matches!(result, Err(StagingError::MissingBundle(_))));
        assert!(!fx.settings.run_store.join("exp1").exists());
    }

    #[test]
    fn bundle_without_entry_program_is_rejected() {
        let mut fx = fixture();
        fx.settings.entry_program = "train.py".to_string();
        let result = stage_run(&fx.settings, &RunConfig::new("exp1"), CreateMode::Shared);
        assert!(matches!(result, Err(StagingError::MissingEntryProgram { .. })));
    }

    #[test]
    fn failed_copy_keeps_what_was_already_copied() {
        let fx = fixture();
        let bundle = &fx.settings.template_bundle;
        fs::write(bundle.join("a_first.txt"), "1").unwrap();
        fs::write(bundle.join("b_blocked.txt"), "2").unwrap();
        fs::write(bundle.join("c_never.txt"), "3").unwrap();

        // a directory where a file has to go makes the copy fail half way
        let run_path = fx.settings.run_store.join("exp1");
        fs::create_dir_all(run_path.join("b_blocked.txt")).unwrap();

        let result = stage_run(&fx.settings, &RunConfig::new("exp1"), CreateMode::Shared);
        assert!(matches!(result, Err(StagingError::Copy { .. })), "{result:?}");
        assert_eq!(fs::read_to_string(run_path.join("a_first.txt")).unwrap(), "1");
        assert!(!run_path.join("c_never.txt").exists());
        assert!(!run_path.join("experiment.json").exists());
    }

    #[cfg(unix)]
    #[test]
    fn linked_directories_are_copied_with_their_contents() {
        let fx = fixture();
        let shared = fx.settings.template_bundle.parent().unwrap().join("shared_lib");
        fs::create_dir_all(shared.join("nested")).unwrap();
        fs::write(shared.join("nested").join("layers.py"), "DEPTH = 4\n").unwrap();
        std::os::unix::fs::symlink(&shared, fx.settings.template_bundle.join("shared")).unwrap();
        std::os::unix::fs::symlink(fx.settings.template_bundle.join("main.py"), fx.settings.template_bundle.join("entry.py")).unwrap();

        let run = stage_run(&fx.settings, &RunConfig::new("exp1"), CreateMode::Shared).unwrap();
        let copied = run.path.join("shared");
        assert!(copied.is_dir());
        assert!(!fs::symlink_metadata(&copied).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(copied.join("nested").join("layers.py")).unwrap(), "DEPTH = 4\n");
        assert_eq!(fs::read_to_string(run.path.join("entry.py")).unwrap(), "print('hello')\n");
    }

    #[cfg(unix)]
    #[test]
    fn dangling_link_in_bundle_stops_staging() {
        let fx = fixture();
        std::os::unix::fs::symlink(fx.settings.template_bundle.join("gone"), fx.settings.template_bundle.join("b_link")).unwrap();
        fs::write(fx.settings.template_bundle.join("a_first.txt"), "1").unwrap();

        let result = stage_run(&fx.settings, &RunConfig::new("exp1"), CreateMode::Shared);
        assert!(matches!(result, Err(StagingError::Walk { .. })), "{result:?}");
        let run_path = fx.settings.run_store.join("exp1");
        assert!(run_path.join("a_first.txt").is_file());
        assert!(!run_path.join("main.py").exists());
    }
}
