//! Exact optimal transport between one-dimensional point measures.
//!
//! In one dimension the optimal coupling under the cost $`|x - y|`$ is the monotone
//! matching of the two cumulative distributions. [`TransportPlan`] realizes it as a
//! merge-like sweep over both sorted peak lists, moving as much weight as possible
//! from the current source peak to the current target peak and advancing whichever
//! side runs out first. Every step advances at least one cursor, so a plan between
//! measures with $`n`$ and $`m`$ peaks has at most $`n + m - 1`$ entries.
use std::cmp::Ordering;
use std::fmt::Display;
use std::iter::FusedIterator;

use tracing::{debug, trace, warn};

use crate::error::MeasureError;
use crate::measure::PointMeasure;
use crate::params::{TransportParams, NORMALIZATION_TOLERANCE};
use crate::peak::Peak;
use crate::summation::{fsum, ExactSum};

/// A single entry of a transport plan, `weight` moved from `source` to `target`
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransportMove {
    pub source: f64,
    pub target: f64,
    pub weight: f64,
}

impl TransportMove {
    pub fn new(source: f64, target: f64, weight: f64) -> Self {
        Self {
            source,
            target,
            weight,
        }
    }

    /// How far the weight travels
    #[inline]
    pub fn distance(&self) -> f64 {
        (self.source - self.target).abs()
    }

    /// The contribution of this entry to the total transport cost
    #[inline]
    pub fn cost(&self) -> f64 {
        self.distance() * self.weight
    }
}

impl Display for TransportMove {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\t{}\t{}", self.source, self.target, self.weight)
    }
}

/// A plan entry that moved weight further than [`TransportParams::anomaly_distance`],
/// which usually means one of the inputs was malformed.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NumericalAnomaly {
    pub source: f64,
    pub target: f64,
    pub weight: f64,
    pub distance: f64,
}

impl From<TransportMove> for NumericalAnomaly {
    fn from(value: TransportMove) -> Self {
        Self {
            source: value.source,
            target: value.target,
            weight: value.weight,
            distance: value.distance(),
        }
    }
}

/// The Wasserstein-1 distance between two normalized measures, along with any
/// suspicious plan entries encountered while computing it
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransportDistance {
    pub distance: f64,
    pub anomalies: Vec<NumericalAnomaly>,
}

impl TransportDistance {
    pub fn has_anomalies(&self) -> bool {
        !self.anomalies.is_empty()
    }
}

fn check_nonnegative(measure: &PointMeasure, operand: &'static str) -> Result<(), MeasureError> {
    match measure.iter().find(|p| p.weight < 0.0) {
        Some(p) => Err(MeasureError::NegativeWeight {
            operand,
            position: p.position,
            weight: p.weight,
        }),
        None => Ok(()),
    }
}

fn check_normalized(
    measure: &PointMeasure,
    operand: &'static str,
    tolerance: f64,
) -> Result<(), MeasureError> {
    if measure.is_normalized(tolerance) {
        Ok(())
    } else {
        Err(MeasureError::NotNormalized {
            operand,
            total: measure.total_weight(),
        })
    }
}

/// A lazily produced optimal transport plan between two measures of equal total weight.
///
/// The plan is a single pass [`Iterator`] of [`TransportMove`]. Dropping it part way
/// through abandons the remaining work. Once it is exhausted, [`TransportPlan::check_balanced`]
/// reports whether the two measures really had equal total weight.
#[derive(Debug, Clone)]
pub struct TransportPlan<'a> {
    source: &'a [Peak],
    target: &'a [Peak],
    source_index: usize,
    target_index: usize,
    source_left: f64,
    target_left: f64,
    tolerance: f64,
}

impl<'a> TransportPlan<'a> {
    /// Create a plan moving the weight of `source` onto `target`.
    ///
    /// # Errors
    /// [`MeasureError::NegativeWeight`] if either measure has a negative weight
    pub fn new(source: &'a PointMeasure, target: &'a PointMeasure) -> Result<Self, MeasureError> {
        Self::with_tolerance(source, target, NORMALIZATION_TOLERANCE)
    }

    /// As [`TransportPlan::new`], with `tolerance` bounding the untransported weight
    /// relative to the larger of the two total weights (or 1, if both are smaller).
    pub fn with_tolerance(
        source: &'a PointMeasure,
        target: &'a PointMeasure,
        tolerance: f64,
    ) -> Result<Self, MeasureError> {
        check_nonnegative(source, "source")?;
        check_nonnegative(target, "target")?;
        let scale = source
            .total_weight()
            .max(target.total_weight())
            .max(1.0);
        Ok(Self {
            source: source.as_slice(),
            target: target.as_slice(),
            source_index: 0,
            target_index: 0,
            source_left: source.first().map(|p| p.weight).unwrap_or_default(),
            target_left: target.first().map(|p| p.weight).unwrap_or_default(),
            tolerance: tolerance * scale,
        })
    }

    /// Whether either side has run out of peaks
    pub fn is_exhausted(&self) -> bool {
        self.source_index >= self.source.len() || self.target_index >= self.target.len()
    }

    /// The weight not yet assigned to any plan entry, summed over both sides
    pub fn residual(&self) -> f64 {
        fn outstanding(peaks: &[Peak], index: usize, left: f64) -> f64 {
            if index < peaks.len() {
                left + fsum(peaks[index + 1..].iter().map(|p| p.weight))
            } else {
                0.0
            }
        }
        outstanding(self.source, self.source_index, self.source_left)
            + outstanding(self.target, self.target_index, self.target_left)
    }

    /// Drain whatever remains of the plan and verify that nothing was left over.
    ///
    /// # Errors
    /// [`MeasureError::UnequalTotalWeight`] if one measure still had weight when the other
    /// ran out of peaks.
    pub fn check_balanced(&mut self) -> Result<(), MeasureError> {
        self.by_ref().for_each(drop);
        let residual = self.residual();
        if residual.abs() > self.tolerance {
            Err(MeasureError::UnequalTotalWeight { residual })
        } else {
            Ok(())
        }
    }

    fn advance_source(&mut self) {
        self.source_index += 1;
        self.source_left = self
            .source
            .get(self.source_index)
            .map(|p| p.weight)
            .unwrap_or_default();
    }

    fn advance_target(&mut self) {
        self.target_index += 1;
        self.target_left = self
            .target
            .get(self.target_index)
            .map(|p| p.weight)
            .unwrap_or_default();
    }
}

impl Iterator for TransportPlan<'_> {
    type Item = TransportMove;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_exhausted() {
            return None;
        }
        let source = self.source[self.source_index].position;
        let target = self.target[self.target_index].position;
        let step = match self.source_left.total_cmp(&self.target_left) {
            Ordering::Less => {
                let moved = self.source_left;
                self.target_left -= moved;
                self.advance_source();
                moved
            }
            Ordering::Greater => {
                let moved = self.target_left;
                self.source_left -= moved;
                self.advance_target();
                moved
            }
            Ordering::Equal => {
                let moved = self.source_left;
                self.advance_source();
                self.advance_target();
                moved
            }
        };
        trace!(
            "Moved {step} from {source} to {target}, at source {} target {}",
            self.source_index,
            self.target_index
        );
        Some(TransportMove::new(source, target, step))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.is_exhausted() {
            (0, Some(0))
        } else {
            let upper = (self.source.len() - self.source_index)
                + (self.target.len() - self.target_index)
                - 1;
            (1, Some(upper))
        }
    }
}

impl FusedIterator for TransportPlan<'_> {}

/// Compute the Wasserstein-1 distance between two normalized measures.
///
/// # Errors
/// - [`MeasureError::NotNormalized`] if either total weight is further than
///   [`TransportParams::normalization_tolerance`] from `1.0`
/// - [`MeasureError::NegativeWeight`] if either measure has a negative weight
/// - [`MeasureError::UnequalTotalWeight`] if the sweep ends with weight left over
#[tracing::instrument(level = "debug", skip_all)]
pub fn wasserstein_distance(
    first: &PointMeasure,
    second: &PointMeasure,
    params: &TransportParams,
) -> Result<TransportDistance, MeasureError> {
    check_normalized(first, "first", params.normalization_tolerance)?;
    check_normalized(second, "second", params.normalization_tolerance)?;

    // Each operand may deviate from 1 by the full tolerance
    let mut plan =
        TransportPlan::with_tolerance(first, second, 2.0 * params.normalization_tolerance)?;
    let mut acc = ExactSum::new();
    let mut anomalies = Vec::new();
    let mut n_moves = 0usize;
    for mv in plan.by_ref() {
        n_moves += 1;
        if mv.distance() > params.anomaly_distance {
            warn!(
                "Detected a large-distance transport of {} between {:.4} and {:.4}",
                mv.weight, mv.source, mv.target
            );
            anomalies.push(mv.into());
        }
        acc.add(mv.cost());
    }
    plan.check_balanced()?;
    let distance = acc.total();
    debug!(
        "Transported {} peaks onto {} peaks in {n_moves} moves, distance {distance}",
        first.len(),
        second.len()
    );
    Ok(TransportDistance {
        distance,
        anomalies,
    })
}

impl PointMeasure {
    /// The optimal transport plan moving the weight of `self` onto `other`
    pub fn transport_plan<'a>(&'a self, other: &'a Self) -> Result<TransportPlan<'a>, MeasureError> {
        TransportPlan::new(self, other)
    }

    /// The Wasserstein-1 distance to `other` using the default [`TransportParams`]
    pub fn distance(&self, other: &Self) -> Result<TransportDistance, MeasureError> {
        wasserstein_distance(self, other, &TransportParams::default())
    }

    pub fn distance_with(
        &self,
        other: &Self,
        params: &TransportParams,
    ) -> Result<TransportDistance, MeasureError> {
        wasserstein_distance(self, other, params)
    }
}
