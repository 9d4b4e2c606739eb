//! Pipeline configuration.
//!
//! Loaded from an optional JSON file; anything not given falls back to the
//! Provo dam-break deployment. GeoServer connection settings can be
//! overridden from the environment (a `.env` file is honoured).

use anyhow::Context;
use flood_core::boundary_condition::DEFAULT_FILE_NAME;
use flood_core::publish::geoserver::GeoServerConfig;
use flood_core::publish::PublishSettings;
use flood_core::raster::{GridLayout, RasterGridHeader, DEFAULT_THRESHOLD};
use flood_core::runner::{DEFAULT_EXECUTABLE, DEFAULT_PROJECT_FILE};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_GEOSERVER_URL: &str = "FLOOD_GEOSERVER_URL";
pub const ENV_GEOSERVER_USER: &str = "FLOOD_GEOSERVER_USER";
pub const ENV_GEOSERVER_PASSWORD: &str = "FLOOD_GEOSERVER_PASSWORD";

/// Solver model and how to run it.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory copied into every run's working directory.
    pub template_dir: PathBuf,
    pub executable: PathBuf,
    pub project_file: String,
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            template_dir: Path::new("data").join("gssha_provo_flood"),
            executable: PathBuf::from(DEFAULT_EXECUTABLE),
            project_file: DEFAULT_PROJECT_FILE.to_string(),
            timeout_secs: 6 * 60 * 60,
        }
    }
}

/// Raw output layout and raster georeferencing.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterConfig {
    pub layout: GridLayout,
    pub header: RasterGridHeader,
    pub threshold: f64,
    /// Projection sidecar bundled with every raster.
    pub projection_file: PathBuf,
}

impl Default for RasterConfig {
    fn default() -> Self {
        RasterConfig {
            layout: GridLayout::default(),
            header: RasterGridHeader::default(),
            threshold: DEFAULT_THRESHOLD,
            projection_file: Path::new("data").join("Max Flood").join("max_flood_1.prj"),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root of the per-user workspaces.
    pub workspace_root: PathBuf,
    pub boundary_file_name: String,
    pub model: ModelConfig,
    pub raster: RasterConfig,
    pub geoserver: GeoServerConfig,
    pub publish: PublishSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            workspace_root: PathBuf::from("workspace"),
            boundary_file_name: DEFAULT_FILE_NAME.to_string(),
            model: ModelConfig::default(),
            raster: RasterConfig::default(),
            geoserver: GeoServerConfig::default(),
            publish: PublishSettings::default(),
        }
    }
}

impl PipelineConfig {
    /// Read `path` if given, else start from defaults, then apply environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
        let mut config = match path {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };
        dotenvy::dotenv().ok();
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<PipelineConfig> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Override GeoServer connection settings from `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_GEOSERVER_URL) {
            self.geoserver.endpoint = url;
        }
        if let Some(user) = lookup(ENV_GEOSERVER_USER) {
            self.geoserver.username = user;
        }
        if let Some(password) = lookup(ENV_GEOSERVER_PASSWORD) {
            self.geoserver.password = password;
        }
    }

    /// The configuration with the GeoServer password masked, for display.
    pub fn redacted(&self) -> PipelineConfig {
        let mut shown = self.clone();
        if !shown.geoserver.password.is_empty() {
            shown.geoserver.password = "********".to_string();
        }
        shown
    }
}
