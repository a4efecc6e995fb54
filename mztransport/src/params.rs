//! Numerical tolerances shared across the crate.

/// Peaks whose absolute weight falls below this value are removed during canonicalization
pub const PRUNE_THRESHOLD: f64 = 1e-12;

/// How far the total weight of a measure may stray from `1.0` and still count as normalized
pub const NORMALIZATION_TOLERANCE: f64 = 1e-9;

/// The transport distance beyond which a single plan entry is reported as a [`NumericalAnomaly`](crate::transport::NumericalAnomaly)
pub const DEFAULT_ANOMALY_DISTANCE: f64 = 10.0;

/// Weights this close to zero after subtracting a noise allocation are dropped
pub const NOISE_REMOVAL_TOLERANCE: f64 = 1e-8;

/// The factor by which the observed position range is widened before drawing synthetic noise positions
pub const NOISE_SPAN_EXPANSION: f64 = 1.2;

/// Half the width of the noise range drawn around a measure whose peaks share one position
pub const NOISE_MIN_HALF_WIDTH: f64 = 0.5;

/// A package of tolerances used when building and comparing measures
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransportParams {
    /// Peaks whose absolute weight falls below this value are dropped when measures are
    /// combined or re-canonicalized with these parameters
    pub prune_threshold: f64,
    /// The maximum deviation of a measure's total weight from `1.0` to still be
    /// considered normalized, and the relative tolerance on the residual weight
    /// when a transport plan is exhausted
    pub normalization_tolerance: f64,
    /// The transport distance above which a plan entry is flagged as anomalous
    pub anomaly_distance: f64,
}

impl Default for TransportParams {
    fn default() -> Self {
        Self {
            prune_threshold: PRUNE_THRESHOLD,
            normalization_tolerance: NORMALIZATION_TOLERANCE,
            anomaly_distance: DEFAULT_ANOMALY_DISTANCE,
        }
    }
}

impl TransportParams {
    pub fn new(prune_threshold: f64, normalization_tolerance: f64, anomaly_distance: f64) -> Self {
        Self {
            prune_threshold,
            normalization_tolerance,
            anomaly_distance,
        }
    }

    pub fn with_prune_threshold(mut self, prune_threshold: f64) -> Self {
        self.prune_threshold = prune_threshold;
        self
    }

    /// Replace the anomaly threshold, leaving the other tolerances untouched
    pub fn with_anomaly_distance(mut self, anomaly_distance: f64) -> Self {
        self.anomaly_distance = anomaly_distance;
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_builders() {
        let params = TransportParams::default();
        assert_eq!(params.prune_threshold, PRUNE_THRESHOLD);
        let params = params.with_prune_threshold(1e-6).with_anomaly_distance(2.0);
        assert_eq!(params, TransportParams::new(1e-6, NORMALIZATION_TOLERANCE, 2.0));
    }
}
