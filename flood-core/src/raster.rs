//! Conversion of the solver's raw maximum-flood-depth output into an ASCII
//! grid raster holding a binary flood mask.

use crate::error::{FloodError, Result};
use crate::job::flood_map_name;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Depth (m) above which a cell counts as flooded.
pub const DEFAULT_THRESHOLD: f64 = 0.03;

/// Raw outputs with this many lines or fewer come from a failed run.
pub const MIN_RAW_LINES: usize = 7;

/// Where the cell values sit in the raw output and how they fold into rows.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct GridLayout {
    /// Zero-based index of the first value line.
    pub start_offset: usize,
    pub columns: usize,
    pub rows: usize,
}

impl Default for GridLayout {
    fn default() -> Self {
        GridLayout {
            start_offset: 11720,
            columns: 122,
            rows: 96,
        }
    }
}

impl GridLayout {
    pub fn cell_count(&self) -> usize {
        self.columns * self.rows
    }
}

/// Georeferencing written ahead of the cell values.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterGridHeader {
    pub xllcenter: f64,
    pub yllcenter: f64,
    pub cellsize: f64,
    pub nodata_value: i32,
}

impl Default for RasterGridHeader {
    fn default() -> Self {
        RasterGridHeader {
            xllcenter: 437269.78,
            yllcenter: 4450221.00,
            cellsize: 90.00,
            nodata_value: 0,
        }
    }
}

impl RasterGridHeader {
    pub fn render(&self, layout: &GridLayout) -> String {
        format!(
            "ncols \t{}\nnrows \t{}\nxllcenter {:.2}\nyllcenter {:.2}\ncellsize     {:.2}\nNODATA_value {}\n",
            layout.columns, layout.rows, self.xllcenter, self.yllcenter, self.cellsize, self.nodata_value
        )
    }
}

/// Location of the raw output the solver writes for `project_file`.
///
/// `ProvoStochastic.prj` maps to `ProvoStochastic_StochOutput/ProvoStochastic.gfl`.
pub fn raw_output_path(project_file: &str) -> PathBuf {
    let project = project_file.strip_suffix(".prj").unwrap_or(project_file);
    PathBuf::from(format!("{project}_StochOutput")).join(format!("{project}.gfl"))
}

/// Turns raw solver output into a thresholded ASCII raster.
#[derive(Debug, Clone)]
pub struct GridReformatter {
    pub layout: GridLayout,
    pub header: RasterGridHeader,
    pub threshold: f64,
}

impl Default for GridReformatter {
    fn default() -> Self {
        GridReformatter::new(
            GridLayout::default(),
            RasterGridHeader::default(),
            DEFAULT_THRESHOLD,
        )
    }
}

impl GridReformatter {
    pub fn new(layout: GridLayout, header: RasterGridHeader, threshold: f64) -> Self {
        GridReformatter {
            layout,
            header,
            threshold,
        }
    }

    /// Reformat `<project>_StochOutput/<project>.gfl` under `working_dir` into
    /// `max_flood_<job_id>.txt` next to it. Returns the raster path.
    pub fn reformat(&self, working_dir: &Path, project_file: &str, job_id: &str) -> Result<PathBuf> {
        let raw_path = working_dir.join(raw_output_path(project_file));
        let text = std::fs::read_to_string(&raw_path).map_err(|e| FloodError::io(&raw_path, e))?;
        let lines: Vec<&str> = text.lines().collect();
        if lines.len() <= MIN_RAW_LINES {
            return Err(FloodError::RawOutputTooShort {
                path: raw_path,
                lines: lines.len(),
                min: MIN_RAW_LINES,
            });
        }

        let raster = self.render(&lines)?;
        let raster_path = working_dir.join(format!("{}.txt", flood_map_name(job_id)));
        std::fs::write(&raster_path, raster).map_err(|e| FloodError::io(&raster_path, e))?;
        info!(
            "Reformatted {} into {} ({}x{} cells)",
            raw_path.display(),
            raster_path.display(),
            self.layout.columns,
            self.layout.rows
        );
        Ok(raster_path)
    }

    /// Render the raster for the raw output `lines`.
    ///
    /// Values run from `start_offset` up to, but not including, the last line.
    pub fn render(&self, lines: &[&str]) -> Result<String> {
        let end = lines.len().saturating_sub(1);
        let start = self.layout.start_offset.min(end);
        let values = &lines[start..end];

        let expected = self.layout.cell_count();
        if values.len() < expected {
            return Err(FloodError::IncompleteGrid {
                expected,
                found: values.len(),
            });
        }
        if values.len() > expected {
            warn!(
                "Raw output has {} values, dropping {} beyond the {}x{} grid",
                values.len(),
                values.len() - expected,
                self.layout.columns,
                self.layout.rows
            );
        }

        let mut out = self.header.render(&self.layout);
        out.reserve(expected * 2);
        for (i, raw) in values.iter().take(expected).enumerate() {
            let value = raw
                .trim()
                .parse::<f64>()
                .map_err(|_| FloodError::InvalidGridValue {
                    line: start + i + 1,
                    value: raw.to_string(),
                })?;
            out.push(if value > self.threshold { '1' } else { '0' });
            out.push(if (i + 1) % self.layout.columns == 0 { '\n' } else { '\t' });
        }
        Ok(out)
    }
}

/// Cell values of a rendered raster, row by row, header skipped.
pub fn raster_rows(raster: &str) -> Vec<Vec<u8>> {
    raster
        .lines()
        .skip(6)
        .map(|row| {
            row.split('\t')
                .filter_map(|cell| cell.trim().parse::<u8>().ok())
                .collect()
        })
        .collect()
}

/// Fraction of flooded cells in a rendered raster.
pub fn flooded_fraction(raster: &str) -> f64 {
    let rows = raster_rows(raster);
    let total: usize = rows.iter().map(|r| r.len()).sum();
    if total == 0 {
        return 0.0;
    }
    let wet: usize = rows.iter().flatten().filter(|&&c| c == 1).count();
    wet as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_layout() -> GridLayout {
        GridLayout {
            start_offset: 10,
            columns: 4,
            rows: 3,
        }
    }

    fn raw_lines(layout: &GridLayout, values: &[f64]) -> Vec<String> {
        let mut lines: Vec<String> = (0..layout.start_offset).map(|i| format!("HEADER {i}")).collect();
        lines.extend(values.iter().map(|v| format!("{v}")));
        lines.push("END".to_string());
        lines
    }

    #[test]
    fn test_raw_output_path() {
        assert_eq!(
            raw_output_path("ProvoStochastic.prj"),
            PathBuf::from("ProvoStochastic_StochOutput").join("ProvoStochastic.gfl")
        );
        assert_eq!(
            raw_output_path("model"),
            PathBuf::from("model_StochOutput").join("model.gfl")
        );
    }

    #[test]
    fn test_header_block() {
        let header = RasterGridHeader::default().render(&GridLayout::default());
        assert_eq!(
            header,
            "ncols \t122\nnrows \t96\nxllcenter 437269.78\nyllcenter 4450221.00\ncellsize     90.00\nNODATA_value 0\n"
        );
    }

    #[test]
    fn test_render_shape_and_threshold() {
        let layout = small_layout();
        let values = [
            0.0, 0.03, 0.0301, 1.5, //
            0.029, 2.0, 0.031, -1.0, //
            0.03, 0.03, 0.04, 10.0,
        ];
        let lines = raw_lines(&layout, &values);
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        assert_eq!(refs.len(), layout.start_offset + layout.cell_count() + 1);

        let reformatter = GridReformatter::new(layout, RasterGridHeader::default(), DEFAULT_THRESHOLD);
        let raster = reformatter.render(&refs).unwrap();
        let rows = raster_rows(&raster);
        assert_eq!(rows.len(), layout.rows);
        assert!(rows.iter().all(|r| r.len() == layout.columns));
        assert_eq!(rows[0], vec![0, 0, 1, 1]);
        assert_eq!(rows[1], vec![0, 1, 1, 0]);
        assert_eq!(rows[2], vec![0, 0, 1, 1]);
        assert!(raster.ends_with("0\t0\t1\t1\n"));
        assert!((flooded_fraction(&raster) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_render_full_layout() {
        let layout = GridLayout::default();
        let values: Vec<f64> = (0..layout.cell_count())
            .map(|i| if i % 2 == 0 { 0.5 } else { 0.0 })
            .collect();
        let lines = raw_lines(&layout, &values);
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let raster = GridReformatter::default().render(&refs).unwrap();
        let rows = raster_rows(&raster);
        assert_eq!(rows.len(), 96);
        assert!(rows.iter().all(|r| r.len() == 122));
    }

    #[test]
    fn test_short_grid_is_an_error() {
        let layout = small_layout();
        let lines = raw_lines(&layout, &[1.0; 11]);
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let reformatter = GridReformatter::new(layout, RasterGridHeader::default(), DEFAULT_THRESHOLD);
        assert!(matches!(
            reformatter.render(&refs),
            Err(FloodError::IncompleteGrid {
                expected: 12,
                found: 11
            })
        ));
    }

    #[test]
    fn test_surplus_values_are_dropped() {
        let layout = small_layout();
        let lines = raw_lines(&layout, &[1.0; 15]);
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let reformatter = GridReformatter::new(layout, RasterGridHeader::default(), DEFAULT_THRESHOLD);
        let rows = raster_rows(&reformatter.render(&refs).unwrap());
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_invalid_value_reports_line() {
        let layout = small_layout();
        let mut lines = raw_lines(&layout, &[0.0; 12]);
        lines[12] = "oops".to_string();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let reformatter = GridReformatter::new(layout, RasterGridHeader::default(), DEFAULT_THRESHOLD);
        match reformatter.render(&refs) {
            Err(FloodError::InvalidGridValue { line, value }) => {
                assert_eq!(line, 13);
                assert_eq!(value, "oops");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_reformat_reads_and_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let layout = small_layout();
        let raw = dir.path().join(raw_output_path("Model.prj"));
        std::fs::create_dir_all(raw.parent().unwrap()).unwrap();
        std::fs::write(&raw, raw_lines(&layout, &[0.5; 12]).join("\n")).unwrap();

        let reformatter = GridReformatter::new(layout, RasterGridHeader::default(), DEFAULT_THRESHOLD);
        let raster_path = reformatter.reformat(dir.path(), "Model.prj", "42").unwrap();
        assert_eq!(raster_path, dir.path().join("max_flood_42.txt"));
        let raster = std::fs::read_to_string(raster_path).unwrap();
        assert_eq!(flooded_fraction(&raster), 1.0);
    }

    #[test]
    fn test_truncated_raw_output_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join(raw_output_path("Model.prj"));
        std::fs::create_dir_all(raw.parent().unwrap()).unwrap();
        std::fs::write(&raw, "1\n2\n3\n4\n5\n6\n7\n").unwrap();

        let result = GridReformatter::default().reformat(dir.path(), "Model.prj", "1");
        assert!(matches!(result, Err(FloodError::RawOutputTooShort { lines: 7, .. })));
        assert!(!dir.path().join("max_flood_1.txt").exists());
    }

    #[test]
    fn test_missing_raw_output_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = GridReformatter::default().reformat(dir.path(), "Model.prj", "1");
        assert!(matches!(result, Err(FloodError::Io { .. })));
    }
}
