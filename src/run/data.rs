use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NoDataAvailableError {
    #[error("No training data available in {0}")]
    Empty(PathBuf),
    #[error("Can't list training data in {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// List the immediate subdirectories of the dataset root, sorted by path
///
/// Files and other non-directory entries are skipped. Directories whose path isn't valid UTF-8
/// are skipped with a warning, since the path has to be shown in a menu and written into the job
/// script unchanged. At least one directory is required.
pub fn list_datasets(dataset_root: &Path) -> Result<Vec<PathBuf>, NoDataAvailableError> {
    let unreadable = |source| NoDataAvailableError::Unreadable { path: dataset_root.to_path_buf(), source };

    let mut datasets: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dataset_root).map_err(unreadable)? {
        let path = entry.map_err(unreadable)?.path();
        if !path.is_dir() {
            continue;
        }
        if path.to_str().is_none() {
            warn!("Skipping dataset {}: path isn't valid UTF-8", path.display());
            continue;
        }
        datasets.push(path);
    }

    if datasets.is_empty() {
        return Err(NoDataAvailableError::Empty(dataset_root.to_path_buf()));
    }

    datasets.sort();
    info!("Found {} datasets in {}", datasets.len(), dataset_root.display());
    Ok(datasets)
}
