//! Simulation and cleanup operations applied to measures before comparing them.
//!
//! Everything here is implemented as methods on [`PointMeasure`](crate::PointMeasure),
//! grouped by concern:
//!   - [`noise`]: synthetic chemical noise, measurement noise and detector gain simulation
//!   - [`signal`]: peak picking, smoothing, binning and low-intensity pruning
//!   - [`filter`]: removing signal that no reference could explain
pub mod filter;
pub mod noise;
pub mod signal;

pub use noise::GainSample;

use crate::error::MeasureError;
use crate::measure::PointMeasure;

pub(crate) fn check_finite_nonnegative(name: &'static str, value: f64) -> Result<(), MeasureError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(MeasureError::invalid(
            name,
            format!("{value} is not a finite non-negative number"),
        ))
    }
}

pub(crate) fn check_normalized(
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
