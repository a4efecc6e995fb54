//! Randomized distortions of a measure, used to simulate realistic spectra
use rand::distributions::Uniform;
use rand::Rng;
use rand_distr::{Binomial, Distribution, Gamma, Normal, StandardNormal};
use tracing::debug;

use crate::error::MeasureError;
use crate::measure::PointMeasure;
use crate::params::{NOISE_MIN_HALF_WIDTH, NOISE_SPAN_EXPANSION, NORMALIZATION_TOLERANCE};
use crate::peak::Peak;
use crate::summation::fsum;

use super::{check_finite_nonnegative, check_normalized};

/// The outcome of [`PointMeasure::sample_multinomial`]
#[derive(Debug, Clone, PartialEq)]
pub struct GainSample {
    /// The simulated signal. Peaks whose signal was clamped to zero are absent.
    pub measure: PointMeasure,
    /// The number of ions drawn for each peak of the reference
    pub counts: Vec<u64>,
    /// The deviation of each reference peak's signal from `count * gain`
    pub deviations: Vec<f64>,
}

impl PointMeasure {
    /// Add `count` peaks of chemical noise whose total weight is `fraction` times the current
    /// total weight.
    ///
    /// Noise positions are drawn uniformly over the current range of positions expanded by
    /// [`NOISE_SPAN_EXPANSION`] about its centre, and noise weights from a Gamma(2, 2)
    /// distribution. The range is at least `2 * NOISE_MIN_HALF_WIDTH` wide, so noise around a
    /// single peak does not land on it. The measure is not renormalized afterwards.
    ///
    /// Returns a mask aligned with the new peaks, `true` where a peak is made of injected noise.
    pub fn add_chemical_noise<R: Rng + ?Sized>(
        &mut self,
        count: usize,
        fraction: f64,
        rng: &mut R,
    ) -> Result<Vec<bool>, MeasureError> {
        check_finite_nonnegative("fraction", fraction)?;
        let (lo, hi) = self.span().ok_or(MeasureError::EmptyMeasure {
            operation: "add chemical noise to",
        })?;
        if count == 0 {
            return Ok(vec![false; self.len()]);
        }
        let centre = (lo + hi) / 2.0;
        let lo = centre + NOISE_SPAN_EXPANSION * (lo - centre);
        let hi = centre + NOISE_SPAN_EXPANSION * (hi - centre);
        let (lo, hi) = if hi - lo < 2.0 * NOISE_MIN_HALF_WIDTH {
            (centre - NOISE_MIN_HALF_WIDTH, centre + NOISE_MIN_HALF_WIDTH)
        } else {
            (lo, hi)
        };

        let positions = Uniform::new_inclusive(lo, hi);
        let weights = Gamma::new(2.0, 2.0).map_err(|e| MeasureError::invalid("gamma", e.to_string()))?;
        let mut noise: Vec<Peak> = (0..count)
            .map(|_| Peak::new(positions.sample(rng), weights.sample(rng)))
            .collect();

        let noise_total = fsum(noise.iter().map(|p| p.weight));
        let scale = fraction * self.total_weight() / noise_total;
        noise.iter_mut().for_each(|p| p.weight *= scale);
        let mut noise_positions: Vec<f64> = noise.iter().map(|p| p.position).collect();
        noise_positions.sort_by(|a, b| a.total_cmp(b));

        self.peaks.extend(noise);
        self.canonicalize();
        debug!("Added {count} noise peaks spanning {lo:.4}-{hi:.4}");
        Ok(self
            .positions()
            .map(|x| noise_positions.binary_search_by(|y| y.total_cmp(&x)).is_ok())
            .collect())
    }

    /// Perturb every weight by independent N(0, `sd`) noise, dropping peaks whose
    /// weight is no longer positive
    pub fn add_gaussian_noise<R: Rng + ?Sized>(&mut self, sd: f64, rng: &mut R) -> Result<(), MeasureError> {
        check_finite_nonnegative("sd", sd)?;
        for peak in self.peaks.iter_mut() {
            let z: f64 = rng.sample(StandardNormal);
            peak.weight += sd * z;
        }
        self.peaks.retain(|p| p.weight > 0.0);
        self.canonicalize();
        Ok(())
    }

    /// Simulate measuring `ions` ions with a detector whose per-ion signal has mean `gain`
    /// and standard deviation `sd`.
    ///
    /// Each peak with probability `p` is given the signal `ions * gain * p` plus a normal
    /// deviation with variance `ions * sd^2 * p + ions * gain^2 * p * (1 - p)`, clamped at
    /// zero. Returns the deviations, aligned with the peaks as they were before distortion.
    ///
    /// # Errors
    /// [`MeasureError::NotNormalized`] if the measure does not sum to `1.0`.
    pub fn distort_intensity<R: Rng + ?Sized>(
        &mut self,
        ions: u64,
        gain: f64,
        sd: f64,
        rng: &mut R,
    ) -> Result<Vec<f64>, MeasureError> {
        check_finite_nonnegative("gain", gain)?;
        check_finite_nonnegative("sd", sd)?;
        check_normalized(self, "measure", NORMALIZATION_TOLERANCE)?;
        let n = ions as f64;
        let deviations: Vec<f64> = self
            .peaks
            .iter()
            .map(|peak| {
                let p = peak.weight;
                let peak_sd = (n * sd.powi(2) * p + n * gain.powi(2) * p * (1.0 - p))
                    .max(0.0)
                    .sqrt();
                let z: f64 = rng.sample(StandardNormal);
                z * peak_sd
            })
            .collect();
        for (peak, u) in self.peaks.iter_mut().zip(deviations.iter()) {
            peak.weight = (n * gain * peak.weight + u).max(0.0);
        }
        self.canonicalize();
        Ok(deviations)
    }

    /// Draw `ions` ions from `reference` treated as a categorical distribution, then give
    /// each peak the signal N(`count * gain`, `sqrt(count) * sd`) clamped at zero.
    ///
    /// # Errors
    /// [`MeasureError::NotNormalized`] if `reference` does not sum to `1.0`, and
    /// [`MeasureError::NegativeWeight`] if it has a negative weight.
    pub fn sample_multinomial<R: Rng + ?Sized>(
        reference: &PointMeasure,
        ions: u64,
        gain: f64,
        sd: f64,
        rng: &mut R,
    ) -> Result<GainSample, MeasureError> {
        check_finite_nonnegative("gain", gain)?;
        check_finite_nonnegative("sd", sd)?;
        check_normalized(reference, "reference", NORMALIZATION_TOLERANCE)?;
        if let Some(p) = reference.iter().find(|p| p.weight < 0.0) {
            return Err(MeasureError::NegativeWeight {
                operand: "reference",
                position: p.position,
                weight: p.weight,
            });
        }

        let mut counts = Vec::with_capacity(reference.len());
        let mut remaining_ions = ions;
        let mut remaining_mass = 1.0;
        let last = reference.len().saturating_sub(1);
        for (i, peak) in reference.iter().enumerate() {
            let count = if i == last {
                remaining_ions
            } else if remaining_ions == 0 || remaining_mass <= 0.0 {
                0
            } else {
                let q = (peak.weight / remaining_mass).clamp(0.0, 1.0);
                Binomial::new(remaining_ions, q)
                    .map_err(|e| MeasureError::invalid("reference", e.to_string()))?
                    .sample(rng)
            };
            remaining_ions -= count;
            remaining_mass -= peak.weight;
            counts.push(count);
        }

        let mut deviations = Vec::with_capacity(counts.len());
        let mut peaks = Vec::with_capacity(counts.len());
        for (peak, count) in reference.iter().zip(counts.iter()) {
            let c = *count as f64;
            let z: f64 = rng.sample(StandardNormal);
            let deviation = z * c.sqrt() * sd;
            deviations.push(deviation);
            peaks.push(Peak::new(peak.position, (c * gain + deviation).max(0.0)));
        }
        Ok(GainSample {
            measure: PointMeasure::new(peaks),
            counts,
            deviations,
        })
    }

    /// Shift every position by an independent N(`mean`, `sd`) offset and return the shifts,
    /// aligned with the peaks as they were before the shift
    pub fn distort_positions<R: Rng + ?Sized>(
        &mut self,
        mean: f64,
        sd: f64,
        rng: &mut R,
    ) -> Result<Vec<f64>, MeasureError> {
        if !mean.is_finite() {
            return Err(MeasureError::invalid("mean", "must be finite"));
        }
        check_finite_nonnegative("sd", sd)?;
        let shift = Normal::new(mean, sd).map_err(|e| MeasureError::invalid("sd", e.to_string()))?;
        let shifts: Vec<f64> = (0..self.len()).map(|_| shift.sample(rng)).collect();
        for (peak, s) in self.peaks.iter_mut().zip(shifts.iter()) {
            peak.position += s;
        }
        self.canonicalize();
        Ok(shifts)
    }
}
