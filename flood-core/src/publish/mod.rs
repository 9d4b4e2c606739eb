//! Publishing flood maps to the GIS service.
//!
//! [`PublishClient`] holds the per-run publish sequence and the one-time
//! workspace bootstrap. It talks to the service through [`GisService`], which
//! [`geoserver::GeoServerClient`] implements over the GeoServer REST API.

pub mod geoserver;
pub mod retry;

use crate::error::{FloodError, Result};
use crate::job::flood_map_name;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Coverage format of the flood raster archive.
pub const ARCGRID: &str = "arcgrid";

/// A remote resource name, optionally scoped to a workspace (`ws:name`).
#[derive(Debug, PartialEq, Eq, Clone, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ResourceId {
    pub workspace: Option<String>,
    pub name: String,
}

impl ResourceId {
    pub fn new(workspace: &str, name: &str) -> Self {
        ResourceId {
            workspace: Some(workspace.to_string()),
            name: name.to_string(),
        }
    }

    pub fn global(name: &str) -> Self {
        ResourceId {
            workspace: None,
            name: name.to_string(),
        }
    }
}

impl From<&str> for ResourceId {
    fn from(value: &str) -> Self {
        match value.split_once(':') {
            Some((workspace, name)) => ResourceId::new(workspace, name),
            None => ResourceId::global(value),
        }
    }
}

impl From<String> for ResourceId {
    fn from(value: String) -> Self {
        ResourceId::from(value.as_str())
    }
}

impl From<ResourceId> for String {
    fn from(value: ResourceId) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.workspace {
            Some(workspace) => write!(f, "{}:{}", workspace, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Remote identifiers of one run's flood map.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct PublishedResource {
    pub store_id: ResourceId,
    pub layer_id: ResourceId,
    pub style_id: ResourceId,
}

impl PublishedResource {
    /// Store and layer are `<workspace>:max_flood_<job_id>`; the style is shared.
    pub fn for_job(workspace: &str, job_id: &str, style_id: &ResourceId) -> Self {
        let name = flood_map_name(job_id);
        PublishedResource {
            store_id: ResourceId::new(workspace, &name),
            layer_id: ResourceId::new(workspace, &name),
            style_id: style_id.clone(),
        }
    }
}

/// A static shapefile layer published once per workspace.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ReferenceLayer {
    /// Store and layer name.
    pub store_id: ResourceId,
    /// Zipped shapefile.
    pub archive: PathBuf,
    pub style_id: ResourceId,
    /// SLD document for the style.
    pub style_file: PathBuf,
}

/// Names and files the publisher works with.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishSettings {
    pub workspace: String,
    pub namespace_uri: String,
    /// Style shared by every flood map layer.
    pub flood_style: ResourceId,
    pub flood_style_file: PathBuf,
    pub reference_layers: Vec<ReferenceLayer>,
}

impl Default for PublishSettings {
    fn default() -> Self {
        let workspace = "dambreak";
        let reference = |store: &str, dir: &str, archive: &str| ReferenceLayer {
            store_id: ResourceId::new(workspace, store),
            archive: Path::new("data").join(dir).join(archive),
            style_id: ResourceId::new(workspace, store),
            style_file: Path::new("data").join(dir).join(format!("{store}.sld")),
        };
        PublishSettings {
            workspace: workspace.to_string(),
            namespace_uri: "tethys.ci-water.org/dam-break".to_string(),
            flood_style: ResourceId::global("provo_max_flood"),
            flood_style_file: Path::new("data")
                .join("Max Flood")
                .join("provo_max_flood.sld"),
            reference_layers: vec![
                reference(
                    "provo_address_points",
                    "Provo Address Points",
                    "Provo Address Points.zip",
                ),
                reference("provo_boundary", "Provo Boundary", "Provo Boundary.zip"),
            ],
        }
    }
}

/// Management operations consumed from the remote GIS service.
///
/// Every call either succeeds or returns the remote failure; nothing is
/// swallowed.
#[allow(async_fn_in_trait)]
pub trait GisService {
    async fn list_workspaces(&self) -> Result<Vec<String>>;

    /// Create a workspace together with its namespace URI.
    async fn create_workspace(&self, workspace: &str, uri: &str) -> Result<()>;

    /// Layer names (without workspace prefix) inside `workspace`.
    async fn list_layers(&self, workspace: &str) -> Result<Vec<String>>;

    /// Style names, global when `workspace` is `None`.
    async fn list_styles(&self, workspace: Option<&str>) -> Result<Vec<String>>;

    async fn create_style(&self, style: &ResourceId, sld: &str) -> Result<()>;

    async fn create_coverage_resource(
        &self,
        store: &ResourceId,
        coverage_type: &str,
        archive: Vec<u8>,
        overwrite: bool,
    ) -> Result<()>;

    async fn create_shapefile_resource(
        &self,
        store: &ResourceId,
        archive: Vec<u8>,
        overwrite: bool,
    ) -> Result<()>;

    async fn update_layer_style(&self, layer: &ResourceId, style: &ResourceId) -> Result<()>;
}

/// What [`PublishClient::ensure_workspace`] had to create.
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct BootstrapReport {
    pub workspace_created: bool,
    pub layers_created: Vec<String>,
}

impl BootstrapReport {
    pub fn is_noop(&self) -> bool {
        !self.workspace_created && self.layers_created.is_empty()
    }
}

/// Publishes flood maps and bootstraps the shared remote workspace.
pub struct PublishClient<S> {
    service: S,
    settings: PublishSettings,
    // check-then-create sequences on the shared registry run one at a time
    registry: Mutex<()>,
}

impl<S: GisService> PublishClient<S> {
    pub fn new(service: S, settings: PublishSettings) -> Self {
        PublishClient {
            service,
            settings,
            registry: Mutex::new(()),
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn settings(&self) -> &PublishSettings {
        &self.settings
    }

    /// Upload the run's archive as a coverage layer, make sure the shared
    /// style exists and bind it to the layer.
    pub async fn publish(&self, job_id: &str, archive: &Path) -> Result<PublishedResource> {
        let resource =
            PublishedResource::for_job(&self.settings.workspace, job_id, &self.settings.flood_style);
        let bytes = tokio::fs::read(archive)
            .await
            .map_err(|e| FloodError::io(archive, e))?;

        info!("Uploading {} as {}", archive.display(), resource.store_id);
        self.service
            .create_coverage_resource(&resource.store_id, ARCGRID, bytes, true)
            .await?;

        self.ensure_style(&resource.style_id, &self.settings.flood_style_file)
            .await?;

        self.service
            .update_layer_style(&resource.layer_id, &resource.style_id)
            .await?;
        info!(
            "Published layer {} with style {}",
            resource.layer_id, resource.style_id
        );
        Ok(resource)
    }

    /// Create `style` from `sld_file` unless it is already registered.
    /// Returns whether it was created.
    pub async fn ensure_style(&self, style: &ResourceId, sld_file: &Path) -> Result<bool> {
        let _registry = self.registry.lock().await;
        let styles = self.service.list_styles(style.workspace.as_deref()).await?;
        if styles.iter().any(|s| *s == style.name) {
            debug!("Style {} already registered", style);
            return Ok(false);
        }

        let sld = read_sld(sld_file).await?;
        let created = created(self.service.create_style(style, &sld).await, style)?;
        if created {
            info!("Created style {}", style);
        }
        Ok(created)
    }

    /// Make sure the workspace and every reference layer exist.
    ///
    /// Issues no create call when they are all present already.
    pub async fn ensure_workspace(&self) -> Result<BootstrapReport> {
        let _registry = self.registry.lock().await;
        let workspace = &self.settings.workspace;
        let mut report = BootstrapReport::default();

        let workspaces = self.service.list_workspaces().await?;
        let existing_layers = if workspaces.iter().any(|w| w == workspace) {
            self.service.list_layers(workspace).await?
        } else {
            info!("Creating workspace {}", workspace);
            let result = self
                .service
                .create_workspace(workspace, &self.settings.namespace_uri)
                .await;
            report.workspace_created = created(result, &ResourceId::global(workspace))?;
            Vec::new()
        };

        for layer in &self.settings.reference_layers {
            if existing_layers.iter().any(|l| *l == layer.store_id.name) {
                debug!("Reference layer {} present", layer.store_id);
                continue;
            }

            info!("Uploading reference layer {}", layer.store_id);
            let archive = tokio::fs::read(&layer.archive)
                .await
                .map_err(|e| FloodError::io(&layer.archive, e))?;
            self.service
                .create_shapefile_resource(&layer.store_id, archive, true)
                .await?;

            let sld = read_sld(&layer.style_file).await?;
            created(self.service.create_style(&layer.style_id, &sld).await, &layer.style_id)?;
            self.service
                .update_layer_style(&layer.store_id, &layer.style_id)
                .await?;
            report.layers_created.push(layer.store_id.to_string());
        }

        if report.is_noop() {
            debug!("Workspace {} already bootstrapped", workspace);
        }
        Ok(report)
    }
}

async fn read_sld(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| FloodError::io(path, e))
}

/// Map a create result to "was created", treating "already exists" as done.
fn created(result: Result<()>, resource: &ResourceId) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_conflict() => {
            warn!("{} was created concurrently, reusing it", resource);
            Ok(false)
        }
        Err(e) => Err(e),
    }
}
