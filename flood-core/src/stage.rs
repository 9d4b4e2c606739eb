use crate::boundary_condition;
use crate::error::{FloodError, Result};
use crate::job::JobContext;
use log::{debug, info};
use std::path::{Path, PathBuf};

/// Prepares a run's working directory: the solver model files plus the
/// user's boundary-condition file.
#[derive(Debug, Clone)]
pub struct JobStager {
    /// Directory holding the solver project and its static inputs.
    pub model_template: PathBuf,
}

impl JobStager {
    pub fn new(model_template: impl Into<PathBuf>) -> Self {
        JobStager {
            model_template: model_template.into(),
        }
    }

    /// Copy the model template into the working directory, then the boundary
    /// file, and check the copy is a complete boundary-condition file.
    ///
    /// Returns the number of hydrograph records staged.
    pub fn stage(&self, context: &JobContext, boundary_file: &Path) -> Result<usize> {
        let target = &context.working_directory;
        std::fs::create_dir_all(target).map_err(|e| FloodError::io(target, e))?;
        let copied = copy_dir(&self.model_template, target)?;
        debug!(
            "Copied {} model files from {} to {}",
            copied,
            self.model_template.display(),
            target.display()
        );

        let file_name = boundary_file.file_name().ok_or_else(|| {
            FloodError::io(
                boundary_file,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "no file name"),
            )
        })?;
        let staged = target.join(file_name);
        std::fs::copy(boundary_file, &staged).map_err(|e| FloodError::io(boundary_file, e))?;
        let records = boundary_condition::read(&staged)?.len();

        info!(
            "Staged job {} in {} ({} hydrograph records)",
            context.job_id,
            target.display(),
            records
        );
        Ok(records)
    }
}

/// Recursively copy the contents of `from` into `to`. Returns files copied.
pub fn copy_dir(from: &Path, to: &Path) -> Result<usize> {
    let mut copied = 0;
    let entries = std::fs::read_dir(from).map_err(|e| FloodError::io(from, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| FloodError::io(from, e))?;
        let source = entry.path();
        let destination = to.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| FloodError::io(&source, e))?;
        if file_type.is_dir() {
            std::fs::create_dir_all(&destination).map_err(|e| FloodError::io(&destination, e))?;
            copied += copy_dir(&source, &destination)?;
        } else {
            std::fs::copy(&source, &destination).map_err(|e| FloodError::io(&source, e))?;
            copied += 1;
        }
    }
    Ok(copied)
}
