use crate::boundary::curve::{BoundaryCurve, PhaseBoundary};
use crate::error::TracerResult;
use std::borrow::Cow;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const CSV_HEADER: &str =
    "branch,driving_phase,partner_phase,sweep_value,pressure,temperature,driving_fraction,partner_fraction";

/// Quote a text field that holds a separator, a quote or a line break.
fn quote_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Boundary CSV writer
///
/// Writes one row per converged point of every branch. The CSV includes:
/// - branch: index of the branch in the boundary
/// - driving_phase, partner_phase: phase names of the branch
/// - sweep_value: pinned composition of the driving phase
/// - pressure, temperature: the equilibrium macro state
/// - driving_fraction, partner_fraction: minor end-member fractions of both phases
pub struct BoundaryCsvWriter {
    /// Path to the CSV file to write
    pub file_path: PathBuf,

    /// Whether the header has been written
    header_written: bool,
}

impl BoundaryCsvWriter {
    /// Create a new writer; the file is created or truncated on first write
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
            header_written: false,
        }
    }

    /// Write the CSV header if not already written
    fn write_header(&mut self) -> TracerResult<()> {
        if self.header_written {
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.file_path)?;

        writeln!(file, "{}", CSV_HEADER)?;

        self.header_written = true;
        Ok(())
    }

    /// Append the points of one curve
    pub fn write_curve(&mut self, branch: usize, curve: &BoundaryCurve) -> TracerResult<()> {
        self.write_header()?;

        let mut file = OpenOptions::new().append(true).open(&self.file_path)?;
        let driving = quote_field(&curve.driving);
        let partner = quote_field(&curve.partner);
        for point in &curve.points {
            writeln!(
                file,
                "{},{},{},{:.6},{:.6},{:.6},{:.6},{:.6}",
                branch,
                driving,
                partner,
                point.sweep_value,
                point.pressure,
                point.temperature,
                point.driving_fraction,
                point.partner_fraction
            )?;
        }
        Ok(())
    }

    /// Write every branch of `boundary`; returns the number of rows written
    pub fn write_boundary(&mut self, boundary: &PhaseBoundary) -> TracerResult<usize> {
        self.write_header()?;
        for (branch, curve) in boundary.curves.iter().enumerate() {
            self.write_curve(branch, curve)?;
        }
        Ok(boundary.total_points())
    }
}
