use std::fs;
use std::io;
use std::path::Path;

use flate2::read::GzDecoder;
use itertools::Itertools;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use mztransport::{
    read_peak_list, MeasureError, PointMeasure, ProportionEstimate, TransportDistance,
    TransportParams,
};

/// Read a peak list from `path`, decompressing it if the path ends in `.gz`
pub(crate) fn read_measure(path: &Path) -> Result<PointMeasure, MeasureError> {
    let handle = fs::File::open(path)?;
    let compressed = path.extension().is_some_and(|ext| ext == "gz");
    debug!("Reading {} (compressed? {compressed})", path.display());
    if compressed {
        read_peak_list(io::BufReader::new(GzDecoder::new(handle)))
    } else {
        read_peak_list(io::BufReader::new(handle))
    }
}

/// The cleanup steps applied to every input before scoring
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub(crate) struct PreprocessingSteps {
    pub prune_threshold: f64,
    pub bin_digits: Option<i32>,
    pub cut_smallest: Option<f64>,
    pub filter_margin: Option<f64>,
}

impl PreprocessingSteps {
    pub(crate) fn apply(
        &self,
        observed: &mut PointMeasure,
        references: &mut [PointMeasure],
    ) -> Result<(), MeasureError> {
        if let Some(digits) = self.bin_digits {
            observed.coarse_bin(digits);
            references.iter_mut().for_each(|r| r.coarse_bin(digits));
        }
        if let Some(proportion) = self.cut_smallest {
            let before = observed.len();
            observed.cut_smallest_peaks(proportion)?;
            debug!("Cut {} of {before} observed peaks", before - observed.len());
        }
        if let Some(margin) = self.filter_margin {
            let before = observed.len();
            *observed = observed.filter_against_references(references, margin)?;
            info!(
                "Removed {} observed peaks further than {margin} from every reference",
                before - observed.len()
            );
        }
        observed.canonicalize_with(self.prune_threshold);
        observed.normalize(1.0)?;
        for reference in references.iter_mut() {
            reference.canonicalize_with(self.prune_threshold);
            reference.normalize(1.0)?;
        }
        Ok(())
    }
}

/// Compute the distance from `observed` to every reference, in parallel on the current
/// rayon thread pool
pub(crate) fn score_references(
    observed: &PointMeasure,
    references: &[PointMeasure],
    params: &TransportParams,
) -> Result<Vec<TransportDistance>, MeasureError> {
    references
        .par_iter()
        .map(|reference| observed.distance_with(reference, params))
        .collect()
}

/// Resolve the proportions to mix `n_references` with, defaulting to equal proportions
pub(crate) fn make_estimate(proportions: &[f64], n_references: usize) -> Option<ProportionEstimate> {
    if proportions.is_empty() {
        Some(ProportionEstimate::new(vec![1.0; n_references], Vec::new()))
    } else if proportions.len() == n_references {
        Some(ProportionEstimate::new(proportions.to_vec(), Vec::new()))
    } else {
        None
    }
}

pub(crate) fn log_anomalies(label: &str, distance: &TransportDistance) {
    for anomaly in distance.anomalies.iter() {
        warn!(
            "{label}: {:.4} weight moved from {:.4} to {:.4}",
            anomaly.weight, anomaly.source, anomaly.target
        );
    }
}

pub(crate) fn describe_scores<'a>(
    labels: impl IntoIterator<Item = &'a Path>,
    scores: &[TransportDistance],
) {
    for (label, score) in labels.into_iter().zip_eq(scores.iter()) {
        info!("{}: {:.6}", label.display(), score.distance);
    }
}
