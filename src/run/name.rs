use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use log::debug;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("An experiment with this name already exists ({0}). Please choose another name.")]
    Duplicate(String),
    #[error("The experiment name can't be empty.")]
    Empty,
    #[error("The experiment name {0:?} must be a single directory name.")]
    Invalid(String),
}

/// The directory that holds all run directories as siblings
#[derive(Debug, Clone)]
pub struct RunStore {
    pub path: PathBuf,
}

impl RunStore {
    pub fn new(path: &Path) -> RunStore {
        RunStore { path: path.to_path_buf() }
    }

    /// Names of the entries directly under the run store
    ///
    /// A run store that doesn't exist yet has no runs. Names are kept as the OS returns them, so
    /// a non UTF-8 entry never collides with a typed name by accident.
    pub fn existing_names(&self) -> io::Result<Vec<OsString>> {
        let entries = match fs::read_dir(&self.path) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("Run store {} doesn't exist yet", self.path.display());
                return Ok(Vec::new());
            }
            Err(err) => return Err(err),
        };

        let mut names = Vec::new();
        for entry in entries {
            names.push(entry?.file_name());
        }
        Ok(names)
    }

    /// Validate a candidate against a fresh listing of the run store
    pub fn check_name(&self, candidate: &str) -> io::Result<Result<(), NameError>> {
        let existing = self.existing_names()?;
        Ok(validate_run_name(candidate, &existing))
    }
}

/// Accept a candidate run name if it is a new, non-empty, single path segment
pub fn validate_run_name<S: AsRef<OsStr>>(candidate: &str, existing: &[S]) -> Result<(), NameError> {
    if candidate.is_empty() {
        return Err(NameError::Empty);
    }

    let mut components = Path::new(candidate).components();
    let single_segment = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(segment)), None) if segment == candidate
    );
    if !single_segment {
        return Err(NameError::Invalid(candidate.to_string()));
    }

    if existing.iter().any(|name| name.as_ref() == OsStr::new(candidate)) {
        return Err(NameError::Duplicate(candidate.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn existing() -> Vec<String> {
        vec!["exp1".to_string(), "baseline".to_string(), "exp1-rerun".to_string()]
    }

    #[test]
    fn every_existing_name_is_rejected() {
        let names = existing();
        for name in &names {
            assert_eq!(validate_run_name(name, &names), Err(NameError::Duplicate(name.clone())));
        }
    }

    #[test]
    fn new_names_are_accepted() {
        let names = existing();
        for candidate in ["exp2", "exp", "Exp1", "baseline2", "exp1-rerun-2"] {
            assert_eq!(validate_run_name(candidate, &names), Ok(()), "{candidate}");
        }
    }

    #[test]
    fn empty_name_is_rejected() {
        assert_eq!(validate_run_name("", &existing()), Err(NameError::Empty));
    }

    #[test]
    fn names_that_leave_the_run_store_are_rejected() {
        for candidate in ["a/b", "..", ".", "/abs", "exp1/"] {
            assert_eq!(
                validate_run_name::<&str>(candidate, &[]),
                Err(NameError::Invalid(candidate.to_string())),
                "{candidate}"
            );
        }
    }

    #[test]
    fn duplicate_message_names_the_run() {
        let err = validate_run_name("exp1", &existing()).unwrap_err();
        assert!(err.to_string().contains("exp1"));
    }

    #[test]
    fn listing_covers_files_and_directories() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("exp1")).unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let store = RunStore::new(dir.path());
        let mut names = store.existing_names().unwrap();
        names.sort();
        assert_eq!(names, vec![OsString::from("exp1"), OsString::from("notes.txt")]);
        assert_eq!(store.check_name("exp1").unwrap(), Err(NameError::Duplicate("exp1".to_string())));
        assert_eq!(store.check_name("exp2").unwrap(), Ok(()));
    }

    #[test]
    fn missing_run_store_has_no_runs() {
        let dir = TempDir::new().unwrap();
        let store = RunStore::new(&dir.path().join("not-created"));
        assert!(store.existing_names().unwrap().is_empty());
        assert_eq!(store.check_name("exp1").unwrap(), Ok(()));
    }

    #[test]
    fn validation_sees_runs_created_after_the_store_was_opened() {
        let dir = TempDir::new().unwrap();
        let store = RunStore::new(dir.path());
        assert_eq!(store.check_name("late").unwrap(), Ok(()));
        fs::create_dir(dir.path().join("late")).unwrap();
        assert_eq!(store.check_name("late").unwrap(), Err(NameError::Duplicate("late".to_string())));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_run_does_not_block_its_lossy_name() {
        use std::os::unix::ffi::OsStrExt;

        let dir = TempDir::new().unwrap();
        // "exp\xff" would read back as "exp\u{fffd}" through a lossy conversion
        fs::create_dir(dir.path().join(OsStr::from_bytes(b"exp\xff"))).unwrap();

        let store = RunStore::new(dir.path());
        assert_eq!(store.existing_names().unwrap(), vec![OsStr::from_bytes(b"exp\xff").to_os_string()]);
        assert_eq!(store.check_name("exp\u{fffd}").unwrap(), Ok(()));
    }
}
