//! CSV export of a generated hydrograph.

use flood_core::hydrograph::Hydrograph;
use log::info;
use std::path::Path;

/// Write `timestamp,flow` rows, flow to two decimals.
pub fn write_hydrograph_csv(hydrograph: &Hydrograph, path: &Path) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["timestamp", "flow"])?;
    for point in &hydrograph.points {
        writer.write_record([
            point.timestamp.format("%Y-%m-%d %H:%M").to_string(),
            format!("{:.2}", point.flow),
        ])?;
    }
    writer.flush()?;
    info!("Wrote {} hydrograph points to {}", hydrograph.len(), path.display());
    Ok(())
}
