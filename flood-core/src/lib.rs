//! Core types and pipeline stages for the dam-break flood inundation model.
//!
//! Stages, in pipeline order:
//! - [`hydrograph`]: synthetic inflow hydrograph
//! - [`boundary_condition`]: the solver's point-source input file
//! - [`stage`]: per-run working directory
//! - [`runner`]: external solver invocation (feature `solver`)
//! - [`raster`]: raw solver output to ASCII grid raster
//! - [`archive`]: zip bundle for the map server
//! - [`publish`]: GeoServer publishing and workspace bootstrap (feature `api`)

pub mod archive;
pub mod boundary_condition;
pub mod error;
pub mod hydrograph;
pub mod job;
#[cfg(feature = "api")]
pub mod publish;
pub mod raster;
#[cfg(feature = "solver")]
pub mod runner;
pub mod stage;

pub use error::{FloodError, Result};
