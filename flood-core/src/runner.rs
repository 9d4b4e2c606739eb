//! Invocation of the external hydraulic solver.

use crate::error::{FloodError, Result};
use crate::job::JobContext;
use log::{info, warn};
use std::future::Future;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};

/// Default executable name of the solver.
pub const DEFAULT_EXECUTABLE: &str = "gssha.exe";

/// Default project file handed to the solver.
pub const DEFAULT_PROJECT_FILE: &str = "ProvoStochastic.prj";

/// Runs `<executable> <project_file>` inside a run's working directory.
#[derive(Debug, Clone)]
pub struct ModelRunner {
    pub executable: PathBuf,
    pub project_file: String,
    /// Wall-clock limit for one solver run.
    pub timeout: Duration,
}

impl ModelRunner {
    pub fn new(executable: impl Into<PathBuf>, project_file: impl Into<String>, timeout: Duration) -> Self {
        ModelRunner {
            executable: executable.into(),
            project_file: project_file.into(),
            timeout,
        }
    }

    /// Run the solver to completion or until the timeout elapses.
    pub async fn run(&self, context: &JobContext) -> Result<()> {
        self.run_until(context, std::future::pending()).await
    }

    /// Run the solver, killing it when `cancel` resolves first.
    ///
    /// A non-zero exit status is reported as [`FloodError::SolverFailed`].
    pub async fn run_until<C>(&self, context: &JobContext, cancel: C) -> Result<()>
    where
        C: Future<Output = ()>,
    {
        let program = self.executable.display().to_string();
        info!(
            "Starting solver {} {} in {}",
            program,
            self.project_file,
            context.working_directory.display()
        );
        let started = Instant::now();

        let mut child = Command::new(&self.executable)
            .arg(&self.project_file)
            .current_dir(&context.working_directory)
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| FloodError::SolverLaunch {
                program: program.clone(),
                source,
            })?;

        let status = tokio::select! {
            status = child.wait() => status.map_err(|e| FloodError::io(&context.working_directory, e))?,
            _ = tokio::time::sleep(self.timeout) => {
                terminate(&mut child, &program).await;
                return Err(FloodError::SolverTimeout {
                    after_secs: self.timeout.as_secs(),
                });
            }
            _ = cancel => {
                terminate(&mut child, &program).await;
                return Err(FloodError::SolverCancelled);
            }
        };

        check_status(status)?;
        info!(
            "Solver finished for job {} in {:.1}s",
            context.job_id,
            started.elapsed().as_secs_f64()
        );
        Ok(())
    }
}

async fn terminate(child: &mut Child, program: &str) {
    warn!("Killing solver {}", program);
    if let Err(e) = child.kill().await {
        warn!("Failed to kill solver {}: {}", program, e);
    }
}

fn check_status(status: ExitStatus) -> Result<()> {
    if status.success() {
        Ok(())
    } else {
        Err(FloodError::SolverFailed {
            code: status.code(),
        })
    }
}
