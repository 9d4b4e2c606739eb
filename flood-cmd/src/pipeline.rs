//! End-to-end run of one job: stage, simulate, reformat, package, publish.
//!
//! Stages run strictly one after another; the first failure aborts the run
//! and nothing downstream of it is attempted.

use crate::config::PipelineConfig;
use anyhow::Context;
use flood_core::archive::ArchivePackager;
use flood_core::boundary_condition::BoundaryConditionWriter;
use flood_core::hydrograph::{Hydrograph, HydrographParameters};
use flood_core::job::JobContext;
use flood_core::publish::geoserver::GeoServerClient;
use flood_core::publish::{BootstrapReport, GisService, PublishClient, PublishedResource};
use flood_core::raster::{flooded_fraction, GridReformatter};
use flood_core::runner::ModelRunner;
use flood_core::stage::JobStager;
use log::info;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

/// Everything a successful run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub context: JobContext,
    pub records: usize,
    pub raster: PathBuf,
    pub flooded_fraction: f64,
    pub archive: PathBuf,
    pub resource: PublishedResource,
}

pub struct Pipeline<S> {
    config: PipelineConfig,
    publisher: PublishClient<S>,
}

impl Pipeline<GeoServerClient> {
    /// Pipeline publishing to the configured GeoServer.
    pub fn from_config(config: PipelineConfig) -> anyhow::Result<Self> {
        let service = GeoServerClient::new(&config.geoserver)
            .context("Failed to build GeoServer client")?;
        Ok(Pipeline::new(config, service))
    }
}

impl<S: GisService> Pipeline<S> {
    pub fn new(config: PipelineConfig, service: S) -> Self {
        let publisher = PublishClient::new(service, config.publish.clone());
        Pipeline { config, publisher }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn publisher(&self) -> &PublishClient<S> {
        &self.publisher
    }

    pub fn context(&self, username: &str, job_id: &str) -> JobContext {
        JobContext::in_workspace(&self.config.workspace_root, username, job_id)
    }

    fn boundary_writer(&self) -> BoundaryConditionWriter {
        BoundaryConditionWriter::new(&self.config.workspace_root)
            .with_file_name(&self.config.boundary_file_name)
    }

    /// Generate the hydrograph and write it into the user's workspace.
    pub fn generate(
        &self,
        username: &str,
        params: &HydrographParameters,
    ) -> anyhow::Result<(Hydrograph, PathBuf)> {
        let hydrograph = Hydrograph::generate(params);
        let path = self
            .boundary_writer()
            .write(username, &hydrograph)
            .context("Failed to write boundary condition file")?;
        Ok((hydrograph, path))
    }

    pub fn stage(&self, context: &JobContext) -> anyhow::Result<usize> {
        let boundary = self.boundary_writer().input_file(&context.username);
        JobStager::new(&self.config.model.template_dir)
            .stage(context, &boundary)
            .context("Failed to stage job")
    }

    pub async fn simulate<C>(&self, context: &JobContext, cancel: C) -> anyhow::Result<()>
    where
        C: Future<Output = ()>,
    {
        let model = &self.config.model;
        ModelRunner::new(
            &model.executable,
            &model.project_file,
            Duration::from_secs(model.timeout_secs),
        )
        .run_until(context, cancel)
        .await
        .context("Solver run failed")
    }

    pub fn reformat(&self, context: &JobContext) -> anyhow::Result<PathBuf> {
        let raster = &self.config.raster;
        GridReformatter::new(raster.layout, raster.header, raster.threshold)
            .reformat(
                &context.working_directory,
                &self.config.model.project_file,
                &context.job_id,
            )
            .context("Failed to reformat solver output")
    }

    pub fn package(&self, context: &JobContext) -> anyhow::Result<PathBuf> {
        ArchivePackager::new(&self.config.raster.projection_file)
            .package(context)
            .context("Failed to package flood map")
    }

    /// Bootstrap the remote workspace if needed, then publish the run's archive.
    pub async fn publish(&self, context: &JobContext) -> anyhow::Result<PublishedResource> {
        self.bootstrap().await?;
        self.publisher
            .publish(&context.job_id, &context.archive_path())
            .await
            .context("Failed to publish flood map")
    }

    pub async fn bootstrap(&self) -> anyhow::Result<BootstrapReport> {
        self.publisher
            .ensure_workspace()
            .await
            .context("Failed to bootstrap GIS workspace")
    }

    /// Run every stage for `context`.
    pub async fn run(&self, context: &JobContext) -> anyhow::Result<RunOutcome> {
        self.run_until(context, std::future::pending()).await
    }

    /// Run every stage, killing the solver if `cancel` resolves while it runs.
    pub async fn run_until<C>(&self, context: &JobContext, cancel: C) -> anyhow::Result<RunOutcome>
    where
        C: Future<Output = ()>,
    {
        info!("Job {}: staging", context.job_id);
        let records = self.stage(context)?;

        info!("Job {}: running solver", context.job_id);
        self.simulate(context, cancel).await?;

        info!("Job {}: reformatting output", context.job_id);
        let raster = self.reformat(context)?;
        let text = std::fs::read_to_string(&raster)
            .with_context(|| format!("Failed to read {}", raster.display()))?;
        let flooded_fraction = flooded_fraction(&text);

        info!("Job {}: packaging", context.job_id);
        let archive = self.package(context)?;

        info!("Job {}: publishing", context.job_id);
        let resource = self.publish(context).await?;

        info!(
            "Job {} complete: {:.1}% of cells flooded, layer {}",
            context.job_id,
            flooded_fraction * 100.0,
            resource.layer_id
        );
        Ok(RunOutcome {
            context: context.clone(),
            records,
            raster,
            flooded_fraction,
            archive,
            resource,
        })
    }
}
