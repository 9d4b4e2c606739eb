//! Packaging of the flood raster and its projection sidecar into the zip
//! archive the map server ingests.

use crate::error::{FloodError, Result};
use crate::job::JobContext;
use log::{info, warn};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Bundles `max_flood_<job>.txt` and `max_flood_<job>.prj` into
/// `max_flood_<job>.zip`.
#[derive(Debug, Clone)]
pub struct ArchivePackager {
    /// Projection description shared by every run of the model domain.
    pub projection_file: PathBuf,
}

impl ArchivePackager {
    pub fn new(projection_file: impl Into<PathBuf>) -> Self {
        ArchivePackager {
            projection_file: projection_file.into(),
        }
    }

    /// Copy the sidecar into the run directory and write the archive.
    /// Returns the archive path.
    pub fn package(&self, context: &JobContext) -> Result<PathBuf> {
        let sidecar = context.sidecar_path();
        std::fs::copy(&self.projection_file, &sidecar)
            .map_err(|e| FloodError::io(&self.projection_file, e))?;

        let raster = context.raster_path();
        let archive = context.archive_path();
        write_archive(&archive, &[&sidecar, &raster])?;

        info!(
            "Packaged {} for job {}",
            archive.display(),
            context.job_id
        );
        Ok(archive)
    }
}

/// Write `members` into a deflated zip at `archive`, stored by file name.
///
/// Every member is read before the archive is created, and a failed write
/// removes the partial archive, so `archive` only ever holds all members.
pub fn write_archive(archive: &Path, members: &[&Path]) -> Result<()> {
    let mut entries = Vec::with_capacity(members.len());
    for member in members {
        let name = member
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                FloodError::io(
                    *member,
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, "no file name"),
                )
            })?;
        let bytes = std::fs::read(member).map_err(|e| FloodError::io(*member, e))?;
        entries.push((name, bytes));
    }

    let file = File::create(archive).map_err(|e| FloodError::io(archive, e))?;
    let result = write_entries(ZipWriter::new(file), archive, &entries);
    if result.is_err() {
        if let Err(e) = std::fs::remove_file(archive) {
            warn!("Failed to remove partial archive {}: {}", archive.display(), e);
        }
    }
    result
}

fn write_entries(mut zip: ZipWriter<File>, archive: &Path, entries: &[(&str, Vec<u8>)]) -> Result<()> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, bytes) in entries {
        zip.start_file(*name, options)?;
        zip.write_all(bytes).map_err(|e| FloodError::io(archive, e))?;
    }
    zip.finish()?;
    Ok(())
}
