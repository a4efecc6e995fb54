//! Building reference measures from theoretical isotopic patterns
use chemical_elements::isotopic_pattern::{
    BafflingRecursiveIsotopicPatternGenerator, TheoreticalIsotopicPattern,
};
use chemical_elements::{ChemicalComposition, PROTON};
use tracing::debug;

use crate::error::MeasureError;
use crate::measure::PointMeasure;
use crate::peak::Peak;

/// How much of a theoretical isotopic pattern to keep
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EnvelopeCutoff {
    /// Drop isotopic peaks whose relative abundance is below this value
    Threshold(f64),
    /// Keep the most abundant isotopic peaks until they account for this much of the
    /// total abundance
    TotalProbability(f64),
}

impl Default for EnvelopeCutoff {
    fn default() -> Self {
        Self::Threshold(0.001)
    }
}

impl EnvelopeCutoff {
    fn validate(&self) -> Result<(), MeasureError> {
        match self {
            Self::Threshold(t) if !(0.0..1.0).contains(t) => Err(MeasureError::invalid(
                "threshold",
                format!("{t} is not in [0, 1)"),
            )),
            Self::TotalProbability(p) if !(*p > 0.0 && *p <= 1.0) => Err(MeasureError::invalid(
                "total probability",
                format!("{p} is not in (0, 1]"),
            )),
            _ => Ok(()),
        }
    }

    fn apply(&self, pattern: TheoreticalIsotopicPattern) -> TheoreticalIsotopicPattern {
        match self {
            Self::Threshold(t) => pattern.ignore_below(*t),
            Self::TotalProbability(p) => pattern.truncate_after(*p),
        }
    }
}

impl PointMeasure {
    /// Convert a theoretical isotopic pattern into a normalized measure
    pub fn from_isotopic_pattern(pattern: &TheoreticalIsotopicPattern) -> Result<Self, MeasureError> {
        let mut measure: PointMeasure = pattern
            .iter()
            .map(|p| Peak::new(p.mz, p.intensity))
            .collect();
        measure.normalize(1.0)?;
        Ok(measure)
    }

    /// Generate the normalized isotopic envelope of `composition` carrying `charge` protons,
    /// keeping the peaks selected by `cutoff`.
    ///
    /// # Errors
    /// [`MeasureError::InvalidParameter`] if `charge` is zero or `cutoff` is out of range.
    pub fn from_composition(
        composition: ChemicalComposition<'_>,
        charge: i32,
        cutoff: EnvelopeCutoff,
    ) -> Result<Self, MeasureError> {
        if charge == 0 {
            return Err(MeasureError::invalid("charge", "must not be zero"));
        }
        cutoff.validate()?;
        let mut generator = BafflingRecursiveIsotopicPatternGenerator::new();
        let peaks = generator.isotopic_variants(composition, 0, charge, PROTON);
        let pattern = cutoff.apply(TheoreticalIsotopicPattern::from(peaks));
        debug!(
            "Generated {} isotopic peaks starting at {:.4}",
            pattern.len(),
            pattern.origin
        );
        Self::from_isotopic_pattern(&pattern)
    }
}
