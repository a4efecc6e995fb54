use std::fmt::Display;

use mzpeaks::prelude::*;
use mzpeaks::{CentroidPeak, CoordinateLike, IntensityMeasurement, MZ};

/// A single unit of signal, a weight located at a position on the m/z axis.
///
/// Unlike [`CentroidPeak`], the weight is stored in double precision so that
/// normalized measures can be summed and compared at tolerances near `1e-12`.
#[derive(Debug, Default, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Peak {
    pub position: f64,
    pub weight: f64,
}

impl Peak {
    #[inline]
    pub fn new(position: f64, weight: f64) -> Self {
        Self { position, weight }
    }

    pub fn from_centroid<C: CentroidLike>(peak: &C) -> Self {
        Self::new(peak.mz(), peak.intensity() as f64)
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.weight.is_finite()
    }
}

impl Display for Peak {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\t{}", self.position, self.weight)
    }
}

impl CoordinateLike<MZ> for Peak {
    fn coordinate(&self) -> f64 {
        self.position
    }
}

impl IntensityMeasurement for Peak {
    fn intensity(&self) -> f32 {
        self.weight as f32
    }
}

impl From<(f64, f64)> for Peak {
    fn from((position, weight): (f64, f64)) -> Self {
        Self::new(position, weight)
    }
}

impl From<Peak> for (f64, f64) {
    fn from(value: Peak) -> Self {
        (value.position, value.weight)
    }
}

impl From<CentroidPeak> for Peak {
    fn from(value: CentroidPeak) -> Self {
        Self::from_centroid(&value)
    }
}

impl From<Peak> for CentroidPeak {
    fn from(value: Peak) -> Self {
        CentroidPeak::new(value.position, value.weight as f32, 0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_centroid_conversion() {
        let peak = Peak::new(500.25, 1200.5);
        let centroid: CentroidPeak = peak.into();
        assert_eq!(centroid.mz(), 500.25);
        assert_eq!(centroid.intensity(), 1200.5);
        let back: Peak = centroid.into();
        assert_eq!(back, peak);
        assert_eq!(peak.mz(), 500.25);
    }

    #[test]
    fn test_display() {
        assert_eq!(Peak::new(100.5, 0.25).to_string(), "100.5\t0.25");
    }
}
