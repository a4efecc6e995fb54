use std::ffi::OsString;
use std::fs;
use std::io::{self, prelude::*};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use mztransport::{write_peak_list, write_transport_plan, NumericalAnomaly, PointMeasure};

/// The score of one reference against the observed measure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceScore {
    pub path: PathBuf,
    pub peaks: usize,
    pub proportion: f64,
    pub distance: f64,
    pub anomalies: Vec<NumericalAnomaly>,
}

/// Everything `mztransporter` reports about a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportSummary {
    pub version: String,
    pub observed: PathBuf,
    pub observed_peaks: usize,
    pub references: Vec<ReferenceScore>,
    pub fitted_peaks: usize,
    pub fitted_distance: f64,
    pub fitted_anomalies: Vec<NumericalAnomaly>,
    pub transport_entries: usize,
}

impl TransportSummary {
    /// The reference closest to the observed measure
    pub fn best_reference(&self) -> Option<&ReferenceScore> {
        self.references
            .iter()
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}

/// Append `suffix` to the file name of `prefix`
pub(crate) fn output_path(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(prefix.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn create(path: &Path) -> io::Result<io::BufWriter<fs::File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    debug!("Writing {}", path.display());
    Ok(io::BufWriter::new(fs::File::create(path)?))
}

/// Write the fitted mixture and the transport plan from it to the observed measure,
/// keeping only plan entries that move at least `min_move` weight.
///
/// Returns the number of plan entries written.
pub(crate) fn write_fitted_outputs(
    prefix: &Path,
    fitted: &PointMeasure,
    observed: &PointMeasure,
    min_move: f64,
) -> io::Result<usize> {
    write_peak_list(create(&output_path(prefix, "_fitted.txt"))?, fitted)?;
    let mut plan = fitted
        .transport_plan(observed)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let n = write_transport_plan(
        create(&output_path(prefix, "_transport.txt"))?,
        plan.by_ref().filter(|step| step.weight >= min_move),
    )?;
    plan.check_balanced()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    info!("Wrote {n} transport plan entries");
    Ok(n)
}

pub(crate) fn write_summary<W: Write>(mut writer: W, summary: &TransportSummary) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut writer, summary)?;
    writeln!(writer)?;
    writer.flush()
}

pub(crate) fn write_summary_file(prefix: &Path, summary: &TransportSummary) -> io::Result<()> {
    write_summary(create(&output_path(prefix, "_summary.json"))?, summary)
}
