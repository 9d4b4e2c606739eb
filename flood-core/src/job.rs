use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix shared by every file and remote resource produced for a run.
pub const FLOOD_MAP_PREFIX: &str = "max_flood";

/// `max_flood_<job_id>`, the stem of the raster, sidecar, archive, store and layer.
pub fn flood_map_name(job_id: &str) -> String {
    format!("{FLOOD_MAP_PREFIX}_{job_id}")
}

/// One pipeline run.
///
/// The working directory is exclusive to the run; concurrent runs are kept
/// apart only by distinct job identifiers.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct JobContext {
    pub job_id: String,
    pub working_directory: PathBuf,
    pub username: String,
}

impl JobContext {
    pub fn new(
        job_id: impl Into<String>,
        working_directory: impl Into<PathBuf>,
        username: impl Into<String>,
    ) -> Self {
        JobContext {
            job_id: job_id.into(),
            working_directory: working_directory.into(),
            username: username.into(),
        }
    }

    /// Context rooted at `<workspace_root>/<username>/jobs/<job_id>`.
    pub fn in_workspace(workspace_root: &Path, username: &str, job_id: &str) -> Self {
        let working_directory = workspace_root.join(username).join("jobs").join(job_id);
        JobContext::new(job_id, working_directory, username)
    }

    pub fn flood_map_name(&self) -> String {
        flood_map_name(&self.job_id)
    }

    pub fn raster_path(&self) -> PathBuf {
        self.working_directory
            .join(format!("{}.txt", self.flood_map_name()))
    }

    pub fn sidecar_path(&self) -> PathBuf {
        self.working_directory
            .join(format!("{}.prj", self.flood_map_name()))
    }

    pub fn archive_path(&self) -> PathBuf {
        self.working_directory
            .join(format!("{}.zip", self.flood_map_name()))
    }
}
