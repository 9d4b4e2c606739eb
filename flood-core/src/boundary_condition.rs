//! Point-source inflow file (`.ihg`) read and written by the solver.
//!
//! ```text
//! NUMPT 1
//! POINT 1 1 0.0
//! NRPDS 514
//! INPUT 2010 06 07 12 00 0.000000
//! ...
//! ```
//!
//! Every line is terminated by CRLF.

use crate::error::{FloodError, Result};
use crate::hydrograph::{Hydrograph, HydrographPoint};
use chrono::{Datelike, NaiveDate, Timelike};
use log::info;
use std::path::{Path, PathBuf};

/// File name the solver project expects for its inflow hydrograph.
pub const DEFAULT_FILE_NAME: &str = "ProvoStochastic.ihg";

const LINE_END: &str = "\r\n";

/// Writes hydrographs into per-user workspaces under a common root.
#[derive(Debug, Clone)]
pub struct BoundaryConditionWriter {
    pub workspace_root: PathBuf,
    pub file_name: String,
}

impl BoundaryConditionWriter {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        BoundaryConditionWriter {
            workspace_root: workspace_root.into(),
            file_name: DEFAULT_FILE_NAME.to_string(),
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn user_workspace(&self, username: &str) -> PathBuf {
        self.workspace_root.join(username)
    }

    /// Path the user's boundary-condition file is written to.
    pub fn input_file(&self, username: &str) -> PathBuf {
        self.user_workspace(username).join(&self.file_name)
    }

    /// Create the user's workspace if needed and (over)write the input file.
    pub fn write(&self, username: &str, hydrograph: &Hydrograph) -> Result<PathBuf> {
        let user_workspace = self.user_workspace(username);
        std::fs::create_dir_all(&user_workspace)
            .map_err(|e| FloodError::io(&user_workspace, e))?;

        let input_file = self.input_file(username);
        std::fs::write(&input_file, render(hydrograph))
            .map_err(|e| FloodError::io(&input_file, e))?;

        info!(
            "Wrote {} hydrograph records to {}",
            hydrograph.len(),
            input_file.display()
        );
        Ok(input_file)
    }
}

/// Render a hydrograph in the solver's point-source input format.
pub fn render(hydrograph: &Hydrograph) -> String {
    let mut out = String::with_capacity(64 + hydrograph.len() * 36);
    out.push_str("NUMPT 1");
    out.push_str(LINE_END);
    out.push_str("POINT 1 1 0.0");
    out.push_str(LINE_END);
    out.push_str(&format!("NRPDS {}{}", hydrograph.len(), LINE_END));

    for point in &hydrograph.points {
        let date = point.timestamp;
        out.push_str(&format!(
            "INPUT {} {:02} {:02} {:02} {:02} {:.6}{}",
            date.year(),
            date.month(),
            date.day(),
            date.hour(),
            date.minute(),
            point.flow,
            LINE_END
        ));
    }
    out
}

/// Parse a point-source input file back into its points.
///
/// The record count declared by `NRPDS` must match the number of `INPUT`
/// records.
pub fn parse(text: &str) -> Result<Vec<HydrographPoint>> {
    let mut declared: Option<usize> = None;
    let mut points = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.first().copied() {
            None | Some("NUMPT") | Some("POINT") => {}
            Some("NRPDS") => {
                let count = fields
                    .get(1)
                    .and_then(|s| s.parse::<usize>().ok())
                    .ok_or_else(|| bad_line(index, line))?;
                declared = Some(count);
            }
            Some("INPUT") => points.push(parse_record(index, line, &fields)?),
            Some(_) => return Err(bad_line(index, line)),
        }
    }

    match declared {
        Some(count) if count == points.len() => Ok(points),
        Some(count) => Err(FloodError::BoundaryParse(format!(
            "NRPDS declares {} records, found {}",
            count,
            points.len()
        ))),
        None => Err(FloodError::BoundaryParse("missing NRPDS line".to_string())),
    }
}

/// Read and parse a boundary-condition file from disk.
pub fn read(path: &Path) -> Result<Vec<HydrographPoint>> {
    let text = std::fs::read_to_string(path).map_err(|e| FloodError::io(path, e))?;
    parse(&text)
}

fn parse_record(index: usize, line: &str, fields: &[&str]) -> Result<HydrographPoint> {
    if fields.len() != 7 {
        return Err(bad_line(index, line));
    }
    let number = |i: usize| fields[i].parse::<u32>().map_err(|_| bad_line(index, line));
    let year = fields[1]
        .parse::<i32>()
        .map_err(|_| bad_line(index, line))?;
    let timestamp = NaiveDate::from_ymd_opt(year, number(2)?, number(3)?)
        .and_then(|d| d.and_hms_opt(number(4).ok()?, number(5).ok()?, 0))
        .ok_or_else(|| bad_line(index, line))?;
    let flow = fields[6]
        .parse::<f64>()
        .map_err(|_| bad_line(index, line))?;
    Ok(HydrographPoint { timestamp, flow })
}

fn bad_line(index: usize, line: &str) -> FloodError {
    FloodError::BoundaryParse(format!("line {}: {:?}", index + 1, line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrograph::HydrographParameters;

    #[test]
    fn test_render_header_and_records() {
        let hydrograph = Hydrograph::generate(&HydrographParameters::default());
        let text = render(&hydrograph);
        let lines: Vec<&str> = text.split("\r\n").collect();
        assert_eq!(lines[0], "NUMPT 1");
        assert_eq!(lines[1], "POINT 1 1 0.0");
        assert_eq!(lines[2], format!("NRPDS {}", hydrograph.len()));
        assert_eq!(lines[3], "INPUT 2010 06 07 12 00 0.000000");
        assert_eq!(lines[3 + 5], "INPUT 2010 06 07 12 50 22.220000");
        // trailing CRLF leaves one empty piece
        assert_eq!(lines.len(), 3 + hydrograph.len() + 1);
        assert_eq!(*lines.last().unwrap(), "");
        assert!(!text.replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn test_write_then_parse() {
        let dir = tempfile::tempdir().unwrap();
        let writer = BoundaryConditionWriter::new(dir.path());
        let hydrograph = Hydrograph::generate(&HydrographParameters {
            peak_flow: 1234.5,
            time_to_peak: 3.0,
            peak_duration: 2.0,
            falling_limb_duration: 50.0,
        });

        let path = writer.write("alice", &hydrograph).unwrap();
        assert_eq!(path, dir.path().join("alice").join(DEFAULT_FILE_NAME));

        let parsed = read(&path).unwrap();
        assert_eq!(parsed.len(), hydrograph.len());
        for (original, reread) in hydrograph.points.iter().zip(&parsed) {
            assert_eq!(original.timestamp, reread.timestamp);
            assert!((original.flow - reread.flow).abs() < 1e-6);
        }
    }

    #[test]
    fn test_write_overwrites_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let writer = BoundaryConditionWriter::new(dir.path()).with_file_name("custom.ihg");
        let long = Hydrograph::generate(&HydrographParameters {
            falling_limb_duration: 96.0,
            ..HydrographParameters::default()
        });
        let short = Hydrograph::generate(&HydrographParameters::default());

        writer.write("bob", &long).unwrap();
        let path = writer.write("bob", &short).unwrap();
        assert_eq!(read(&path).unwrap().len(), short.len());
    }

    #[test]
    fn test_write_fails_when_workspace_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("carol"), "not a directory").unwrap();
        let writer = BoundaryConditionWriter::new(dir.path());
        let result = writer.write("carol", &Hydrograph::default());
        assert!(matches!(result, Err(FloodError::Io { .. })));
    }

    #[test]
    fn test_parse_rejects_count_mismatch() {
        let text = "NUMPT 1\r\nPOINT 1 1 0.0\r\nNRPDS 2\r\nINPUT 2010 06 07 12 00 0.000000\r\n";
        assert!(matches!(parse(text), Err(FloodError::BoundaryParse(_))));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let text = "NUMPT 1\r\nNRPDS 1\r\nINPUT 2010 13 07 12 00 0.0\r\n";
        assert!(parse(text).is_err());
        assert!(parse("").is_err());
    }
}
