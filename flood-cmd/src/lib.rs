//! Command implementations for the flood pipeline CLI.
//!
//! Each pipeline stage is exposed on its own so a failed run can be resumed
//! from the stage that broke, plus `run` for the whole sequence.

use clap::{Args, Subcommand};
use flood_core::hydrograph::HydrographParameters;
use flood_core::job::JobContext;
use log::info;
use std::path::{Path, PathBuf};

pub mod config;
pub mod export;
pub mod pipeline;

use config::PipelineConfig;
use pipeline::Pipeline;

/// Identifies one run inside a user's workspace.
#[derive(Args, Debug, Clone)]
pub struct JobArgs {
    /// Job identifier; names the flood map layer
    #[arg(short, long)]
    pub job_id: String,

    /// Owner of the job workspace
    #[arg(short, long)]
    pub username: String,

    /// Use this working directory instead of `<workspace>/<user>/jobs/<job>`
    #[arg(long)]
    pub dir: Option<PathBuf>,
}

impl JobArgs {
    fn context<S>(&self, pipeline: &Pipeline<S>) -> JobContext
    where
        S: flood_core::publish::GisService,
    {
        match &self.dir {
            Some(dir) => JobContext::new(&self.job_id, dir, &self.username),
            None => pipeline.context(&self.username, &self.job_id),
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a synthetic hydrograph and write the user's boundary condition file
    Hydrograph {
        /// Peak flow (cms)
        #[arg(long, default_value_t = 800.0)]
        peak_flow: f64,

        /// Hours from start of rise to peak
        #[arg(long, default_value_t = 6.0)]
        time_to_peak: f64,

        /// Hours the peak is held
        #[arg(long, default_value_t = 6.0)]
        peak_duration: f64,

        /// Hours from end of peak back to zero flow
        #[arg(long, default_value_t = 24.0)]
        falling_limb_duration: f64,

        /// Owner of the workspace the file is written to
        #[arg(short, long)]
        username: String,

        /// Also export the series as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Stage, simulate, reformat, package and publish one job
    Run {
        #[command(flatten)]
        job: JobArgs,
    },

    /// Turn a finished run's raw solver output into an ASCII raster
    Reformat {
        #[command(flatten)]
        job: JobArgs,
    },

    /// Zip a run's raster with its projection file
    Package {
        #[command(flatten)]
        job: JobArgs,
    },

    /// Publish a packaged run to GeoServer
    Publish {
        #[command(flatten)]
        job: JobArgs,
    },

    /// Create the GeoServer workspace and reference layers if missing
    Bootstrap,

    /// Print the effective configuration as JSON
    PrintConfig,
}

pub async fn run(command: Command, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = PipelineConfig::load(config_path)?;
    let pipeline = Pipeline::from_config(config)?;
    match command {
        Command::Hydrograph {
            peak_flow,
            time_to_peak,
            peak_duration,
            falling_limb_duration,
            username,
            csv,
        } => {
            let params = HydrographParameters {
                peak_flow,
                time_to_peak,
                peak_duration,
                falling_limb_duration,
            };
            let (hydrograph, path) = pipeline.generate(&username, &params)?;
            info!(
                "Wrote {} points (peak {:.2}) to {}",
                hydrograph.len(),
                hydrograph.peak(),
                path.display()
            );
            if let Some(csv) = csv {
                export::write_hydrograph_csv(&hydrograph, &csv)?;
            }
        }
        Command::Run { job } => {
            let context = job.context(&pipeline);
            let cancel = async {
                if tokio::signal::ctrl_c().await.is_err() {
                    std::future::pending::<()>().await;
                }
            };
            let outcome = pipeline.run_until(&context, cancel).await?;
            println!("{}", outcome.resource.layer_id);
        }
        Command::Reformat { job } => {
            let raster = pipeline.reformat(&job.context(&pipeline))?;
            println!("{}", raster.display());
        }
        Command::Package { job } => {
            let archive = pipeline.package(&job.context(&pipeline))?;
            println!("{}", archive.display());
        }
        Command::Publish { job } => {
            let resource = pipeline.publish(&job.context(&pipeline)).await?;
            println!("{}", resource.layer_id);
        }
        Command::Bootstrap => {
            let report = pipeline.bootstrap().await?;
            if report.is_noop() {
                info!("Nothing to create");
            } else {
                info!(
                    "Workspace created: {}, reference layers created: {:?}",
                    report.workspace_created, report.layers_created
                );
            }
        }
        Command::PrintConfig => {
            let shown = pipeline.config().redacted();
            println!("{}", serde_json::to_string_pretty(&shown)?);
        }
    }
    Ok(())
}
