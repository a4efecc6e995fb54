//! Deterministic signal processing: peak picking, smoothing, binning and pruning
use std::f64::consts::PI;

use tracing::{debug, trace};

use crate::error::MeasureError;
use crate::measure::PointMeasure;
use crate::peak::Peak;

use super::check_finite_nonnegative;

/// Round `x` to `digits` decimal places, breaking ties to even
fn round_to(x: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (x * factor).round_ties_even() / factor
}

/// Trapezoid-rule integral of `y dx` and `x y dx` over a run of profile points
fn integrate(points: &[Peak]) -> (f64, f64) {
    points
        .windows(2)
        .fold((0.0, 0.0), |(area, moment), pair| {
            let (a, b) = (pair[0], pair[1]);
            let dx = b.position - a.position;
            (
                area + dx * (a.weight + b.weight) / 2.0,
                moment + dx * (a.position * a.weight + b.position * b.weight) / 2.0,
            )
        })
}

impl PointMeasure {
    fn local_maxima_indices(&self) -> Vec<usize> {
        self.peaks
            .windows(3)
            .enumerate()
            .filter(|(_, w)| w[1].weight - w[0].weight > 0.0 && w[2].weight - w[1].weight < 0.0)
            .map(|(i, _)| i + 1)
            .collect()
    }

    /// The peaks of a profile measure that are strictly higher than both of their neighbors.
    ///
    /// The first and last peaks are never reported.
    pub fn local_maxima(&self) -> Vec<Peak> {
        self.local_maxima_indices()
            .into_iter()
            .map(|i| self.peaks[i])
            .collect()
    }

    /// Reduce a profile measure to one peak per local maximum.
    ///
    /// Each maximum is integrated over the neighborhood where the signal stays above
    /// `height_fraction` of the apex and within `max_width / 2` of it. A maximum whose signal
    /// is still above the fraction where the walk stops is too wide, and is skipped. The
    /// emitted peak has the trapezoid area of the neighborhood as its weight and the
    /// area-weighted mean position as its position.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn centroid(&self, max_width: f64, height_fraction: f64) -> Result<PointMeasure, MeasureError> {
        check_finite_nonnegative("max_width", max_width)?;
        if !(0.0..=1.0).contains(&height_fraction) {
            return Err(MeasureError::invalid(
                "height_fraction",
                format!("{height_fraction} is not between 0 and 1"),
            ));
        }
        let peaks = &self.peaks;
        let n = peaks.len();
        let max_dist = max_width / 2.0;
        let mut centroids: Vec<Peak> = Vec::new();

        for p in self.local_maxima_indices() {
            let apex = peaks[p];
            let threshold = height_fraction * apex.weight;

            let mut right = p;
            while right < n - 1
                && peaks[right].position - apex.position < max_dist
                && peaks[right].weight > threshold
            {
                right += 1;
            }
            if peaks[right].weight > threshold {
                trace!("Skipping maximum at {} which is too wide on the right", apex.position);
                continue;
            }

            let mut left = p;
            while left > 0
                && apex.position - peaks[left].position < max_dist
                && peaks[left].weight > threshold
            {
                left -= 1;
            }
            if peaks[left].weight > threshold {
                trace!("Skipping maximum at {} which is too wide on the left", apex.position);
                continue;
            }

            let (area, moment) = integrate(&peaks[left..=right]);
            if area <= 0.0 {
                continue;
            }
            let position = moment / area;
            if !centroids.iter().any(|c| c.position == position) {
                centroids.push(Peak::new(position, area));
            }
        }
        debug!("Centroided {n} profile points into {} peaks", centroids.len());
        Ok(PointMeasure::new(centroids))
    }

    /// Convolve every peak with a normal density of standard deviation `sd`, sampled on a
    /// grid of spacing `step` that spans four standard deviations past either end.
    ///
    /// The result is a profile whose area, rather than whose sum, matches the input's total weight.
    pub fn gaussian_broaden(&self, sd: f64, step: f64) -> Result<PointMeasure, MeasureError> {
        if !(sd.is_finite() && sd > 0.0) {
            return Err(MeasureError::invalid("sd", format!("{sd} is not a positive number")));
        }
        if !(step.is_finite() && step > 0.0) {
            return Err(MeasureError::invalid("step", format!("{step} is not a positive number")));
        }
        let (first, last) = self.span().ok_or(MeasureError::EmptyMeasure {
            operation: "broaden",
        })?;
        let lower = first - 4.0 * sd;
        let upper = last + 4.0 * sd;
        let n = ((upper - lower) / step).ceil() as usize + 1;
        let mut grid = vec![0.0; n];
        let norm = 1.0 / (sd * (2.0 * PI).sqrt());

        for peak in self.iter() {
            let lo = (((peak.position - 4.0 * sd - lower) / step).floor().max(0.0)) as usize;
            let hi = (((peak.position + 4.0 * sd - lower) / step).ceil() as usize).min(n - 1);
            for (k, value) in grid.iter_mut().enumerate().take(hi + 1).skip(lo) {
                let z = (lower + k as f64 * step - peak.position) / sd;
                *value += peak.weight * norm * (-0.5 * z * z).exp();
            }
        }
        Ok(grid
            .into_iter()
            .enumerate()
            .map(|(k, w)| Peak::new(lower + k as f64 * step, w))
            .collect())
    }

    /// Round the positions of ions of the given `charge` to `digits` decimal places in
    /// mass units, merging peaks that collide
    pub fn bin_to_nominal(&mut self, digits: i32, charge: i32) -> Result<(), MeasureError> {
        if charge == 0 {
            return Err(MeasureError::invalid("charge", "must not be zero"));
        }
        let z = charge.abs() as f64;
        for peak in self.peaks.iter_mut() {
            peak.position = round_to(peak.position * z, digits) / z;
        }
        self.canonicalize();
        Ok(())
    }

    /// Round positions to `digits` decimal places, merging peaks that collide
    pub fn coarse_bin(&mut self, digits: i32) {
        for peak in self.peaks.iter_mut() {
            peak.position = round_to(peak.position, digits);
        }
        self.canonicalize();
    }

    /// Remove the smallest peaks while the total removed weight stays strictly below
    /// `proportion` of the total weight.
    ///
    /// Peaks are considered in ascending order of weight, and removal stops at the first
    /// peak that would reach the threshold.
    pub fn cut_smallest_peaks(&mut self, proportion: f64) -> Result<(), MeasureError> {
        if !(0.0..=1.0).contains(&proportion) {
            return Err(MeasureError::invalid(
                "proportion",
                format!("{proportion} is not between 0 and 1"),
            ));
        }
        let threshold = proportion * self.total_weight();
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|a, b| self.peaks[*a].weight.total_cmp(&self.peaks[*b].weight));

        let mut keep = vec![true; self.len()];
        let mut removed = 0.0;
        for i in order {
            let weight = self.peaks[i].weight;
            if removed + weight < threshold {
                removed += weight;
                keep[i] = false;
            } else {
                break;
            }
        }
        let mut flags = keep.into_iter();
        self.peaks.retain(|_| flags.next().unwrap_or(true));
        debug!("Removed {removed} weight of small peaks below {threshold}");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn profile() -> PointMeasure {
        // Two triangular peaks at 100.0 and 101.0
        let weights = [1.0, 3.0, 9.0, 3.0, 1.0, 0.5, 2.0, 6.0, 2.0, 0.5];
        weights
            .iter()
            .enumerate()
            .map(|(i, w)| {
                let base = if i < 5 { 99.8 } else { 100.0 };
                (base + i as f64 * 0.1, *w)
            })
            .collect()
    }

    #[test]
    fn test_local_maxima() {
        let maxima = profile().local_maxima();
        assert_eq!(maxima.len(), 2);
        assert!((maxima[0].position - 100.0).abs() < 1e-9);
        assert!((maxima[1].position - 100.7).abs() < 1e-9);
    }

    #[test]
    fn test_centroid() {
        let centroided = profile().centroid(1.0, 0.5).unwrap();
        assert_eq!(centroided.len(), 2);
        // Symmetric peaks are centred on their apex
        assert!((centroided[0].position - 100.0).abs() < 1e-9);
        assert!((centroided[1].position - 100.7).abs() < 1e-9);
        // Integrated between the apex's neighbors at a tenth of an m/z spacing
        assert!((centroided[0].weight - 1.2).abs() < 1e-9);
        assert!((centroided[1].weight - 0.8).abs() < 1e-9);

        // At a tenth of the apex the first peak is still too high where the walk stops
        let low_cut = profile().centroid(0.3, 0.1).unwrap();
        assert_eq!(low_cut.len(), 1);
        assert!((low_cut[0].position - 100.7).abs() < 1e-9);
        assert!((low_cut[0].weight - 1.05).abs() < 1e-9);

        assert!(profile().centroid(0.0, 0.5).unwrap().is_empty());
        assert!(profile().centroid(1.0, 1.5).is_err());
    }

    #[test]
    fn test_gaussian_broaden() {
        let measure: PointMeasure = vec![(100.0, 1.0)].into();
        let profile = measure.gaussian_broaden(0.1, 0.01).unwrap();
        let modal = profile.modal_peak().unwrap();
        assert!((modal.position - 100.0).abs() < 1e-6);
        let (area, _) = integrate(profile.as_slice());
        assert!((area - 1.0).abs() < 1e-3);
        assert!(PointMeasure::empty().gaussian_broaden(0.1, 0.01).is_err());
    }

    #[test]
    fn test_binning() {
        let mut measure: PointMeasure = vec![(100.24, 0.5), (100.26, 0.25), (100.74, 0.25)].into();
        measure.bin_to_nominal(0, 2).unwrap();
        assert_eq!(measure.len(), 2);
        assert_eq!(measure[0].position, 100.0);
        assert_eq!(measure[1].position, 100.5);
        assert_eq!(measure[1].weight, 0.5);
        assert!(measure.bin_to_nominal(0, 0).is_err());

        let mut measure: PointMeasure = vec![(100.24, 0.5), (100.26, 0.25), (100.74, 0.25)].into();
        measure.coarse_bin(0);
        assert_eq!(measure.len(), 2);
        assert_eq!(measure[0].position, 100.0);
        assert_eq!(measure[0].weight, 0.75);
        assert_eq!(measure[1].position, 101.0);
        let mut measure: PointMeasure = vec![(100.24, 0.5), (100.21, 0.25)].into();
        measure.coarse_bin(1);
        assert_eq!(measure.len(), 1);
    }

    #[test]
    fn test_cut_smallest_peaks() {
        let mut measure: PointMeasure = vec![(1.0, 0.01), (2.0, 0.04), (3.0, 0.95)].into();
        measure.cut_smallest_peaks(0.05).unwrap();
        assert_eq!(measure.len(), 2);
        assert_eq!(measure[0].position, 2.0);

        let mut measure: PointMeasure = vec![(1.0, 0.01), (2.0, 0.04), (3.0, 0.95)].into();
        measure.cut_smallest_peaks(0.0).unwrap();
        assert_eq!(measure.len(), 3);
        measure.cut_smallest_peaks(0.5).unwrap();
        assert_eq!(measure.len(), 1);
        assert!(measure.cut_smallest_peaks(-0.5).is_err());
    }
}
