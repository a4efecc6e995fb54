//! Combining reference measures into candidate mixtures
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::debug;

use crate::error::MeasureError;
use crate::measure::{cmp_position, PointMeasure};
use crate::params::{NOISE_REMOVAL_TOLERANCE, PRUNE_THRESHOLD};
use crate::peak::Peak;
use crate::summation::fsum;

/// The read position within one input of [`weighted_sum`].
///
/// Ordered so that a [`BinaryHeap`] yields the lowest position first, and among
/// equal positions, the lowest measure index first.
#[derive(Debug, Clone, Copy)]
struct MeasureCursor {
    position: f64,
    measure: usize,
    index: usize,
}

impl MeasureCursor {
    fn new(position: f64, measure: usize, index: usize) -> Self {
        Self {
            position,
            measure,
            index,
        }
    }
}

impl PartialEq for MeasureCursor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MeasureCursor {}

impl PartialOrd for MeasureCursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MeasureCursor {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_position(other.position, self.position)
            .then_with(|| other.measure.cmp(&self.measure))
    }
}

/// Compute $`\sum_i w_i m_i`$ with a k-way merge over the inputs' sorted peaks.
///
/// The result is identical to folding `acc.add(&m.scale(w))` over the inputs in order:
/// scaled contributions below [`PRUNE_THRESHOLD`] are dropped, and a running sum that
/// cancels below the threshold restarts from zero.
///
/// # Errors
/// [`MeasureError::InvalidParameter`] if the number of weights does not match the number
/// of measures, or if any weight is negative or not finite.
pub fn weighted_sum(measures: &[PointMeasure], weights: &[f64]) -> Result<PointMeasure, MeasureError> {
    weighted_sum_with(measures, weights, PRUNE_THRESHOLD)
}

/// As [`weighted_sum`], dropping contributions and running sums below `prune_threshold`
/// instead of [`PRUNE_THRESHOLD`], usually [`TransportParams::prune_threshold`](crate::TransportParams::prune_threshold)
#[tracing::instrument(level = "debug", skip_all)]
pub fn weighted_sum_with(
    measures: &[PointMeasure],
    weights: &[f64],
    prune_threshold: f64,
) -> Result<PointMeasure, MeasureError> {
    if measures.len() != weights.len() {
        return Err(MeasureError::invalid(
            "weights",
            format!("expected {} weights, got {}", measures.len(), weights.len()),
        ));
    }
    if let Some(w) = weights.iter().find(|w| !(w.is_finite() && **w >= 0.0)) {
        return Err(MeasureError::invalid(
            "weights",
            format!("{w} is not a finite non-negative weight"),
        ));
    }

    let mut heap: BinaryHeap<MeasureCursor> = measures
        .iter()
        .enumerate()
        .filter_map(|(i, m)| m.first().map(|p| MeasureCursor::new(p.position, i, 0)))
        .collect();
    let mut peaks: Vec<Peak> = Vec::with_capacity(measures.iter().map(|m| m.len()).sum());

    while let Some(cursor) = heap.pop() {
        let source = &measures[cursor.measure];
        let peak = source[cursor.index];
        let weight = peak.weight * weights[cursor.measure];
        if weight.abs() >= prune_threshold {
            match peaks.last_mut() {
                Some(last) if last.position == peak.position => {
                    let total = last.weight + weight;
                    last.weight = if total.abs() < prune_threshold { 0.0 } else { total };
                }
                _ => peaks.push(Peak::new(peak.position + 0.0, weight)),
            }
        }
        if let Some(next) = source.get(cursor.index + 1) {
            heap.push(MeasureCursor::new(next.position, cursor.measure, cursor.index + 1));
        }
    }
    peaks.retain(|p| p.weight.abs() >= prune_threshold);
    debug!(
        "Merged {} measures into {} peaks",
        measures.len(),
        peaks.len()
    );
    Ok(PointMeasure { peaks })
}

/// The answer an external proportion optimizer gives: one mixing proportion per
/// reference measure, and the amount of each observed peak's weight attributed to noise
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProportionEstimate {
    pub proportions: Vec<f64>,
    pub noise: Vec<f64>,
}

impl ProportionEstimate {
    pub fn new(proportions: Vec<f64>, noise: Vec<f64>) -> Self {
        Self { proportions, noise }
    }

    pub fn total_noise(&self) -> f64 {
        fsum(self.noise.iter().copied())
    }

    /// The proportions rescaled to sum to `1.0`
    pub fn normalized_proportions(&self) -> Result<Vec<f64>, MeasureError> {
        let total = fsum(self.proportions.iter().copied());
        if total <= 0.0 {
            return Err(MeasureError::ZeroTotalWeight);
        }
        Ok(self.proportions.iter().map(|p| p / total).collect())
    }

    /// The normalized mixture of `references` under these proportions
    pub fn fitted(&self, references: &[PointMeasure]) -> Result<PointMeasure, MeasureError> {
        self.fitted_with(references, PRUNE_THRESHOLD)
    }

    pub fn fitted_with(
        &self,
        references: &[PointMeasure],
        prune_threshold: f64,
    ) -> Result<PointMeasure, MeasureError> {
        let weights = self.normalized_proportions()?;
        let mut fitted = weighted_sum_with(references, &weights, prune_threshold)?;
        fitted.normalize(1.0)?;
        Ok(fitted)
    }

    /// Subtract the noise allocation from `observed`, peak by peak.
    ///
    /// Peaks left within [`NOISE_REMOVAL_TOLERANCE`] of zero are dropped. The result
    /// is not renormalized and may carry slightly negative weights.
    pub fn denoise(&self, observed: &PointMeasure) -> Result<PointMeasure, MeasureError> {
        if self.noise.len() != observed.len() {
            return Err(MeasureError::invalid(
                "noise",
                format!(
                    "expected one noise value per observed peak ({}), got {}",
                    observed.len(),
                    self.noise.len()
                ),
            ));
        }
        Ok(observed
            .iter()
            .zip(self.noise.iter())
            .map(|(p, n)| Peak::new(p.position, p.weight - n))
            .filter(|p| p.weight.abs() > NOISE_REMOVAL_TOLERANCE)
            .collect())
    }

    /// The objective a denoising optimizer minimizes: transport distance plus
    /// `penalty` per unit of weight attributed to noise
    pub fn penalized_distance(&self, distance: f64, penalty: f64) -> f64 {
        distance + penalty * self.total_noise()
    }
}
