//! Compare mass spectra as one-dimensional probability measures.
//!
//! A spectrum is held as a [`PointMeasure`], a sorted list of `(position, weight)` [`Peak`]s.
//! Two normalized measures are compared by their Wasserstein-1 distance, computed exactly
//! by walking the optimal [`TransportPlan`] between them:
//!
//! ```rust
//! use mztransport::prelude::*;
//!
//! let observed: PointMeasure = vec![(100.0, 0.5), (101.0, 0.5)].into();
//! let reference: PointMeasure = vec![(100.0, 0.3), (101.0, 0.7)].into();
//! let distance = observed.distance(&reference).unwrap();
//! assert!((distance.distance - 0.2).abs() < 1e-12);
//! ```
//!
//! Mixtures of several references are built with [`weighted_sum`], and the [`preprocess`]
//! module provides the simulation and cleanup steps usually applied before comparing.
pub mod compose;
pub mod envelope;
pub mod error;
pub mod measure;
pub mod params;
pub mod peak;
pub mod peak_list;
pub mod preprocess;
pub mod summation;
pub mod transport;

pub use crate::compose::{weighted_sum, weighted_sum_with, ProportionEstimate};
pub use crate::envelope::EnvelopeCutoff;
pub use crate::error::{ErrorKind, MeasureError};
pub use crate::measure::PointMeasure;
pub use crate::params::{
    TransportParams, DEFAULT_ANOMALY_DISTANCE, NOISE_MIN_HALF_WIDTH, NOISE_REMOVAL_TOLERANCE,
    NOISE_SPAN_EXPANSION, NORMALIZATION_TOLERANCE, PRUNE_THRESHOLD,
};
pub use crate::peak::Peak;
pub use crate::peak_list::{read_peak_list, write_peak_list, write_transport_plan};
pub use crate::preprocess::GainSample;
pub use crate::summation::{fsum, ExactSum};
pub use crate::transport::{
    wasserstein_distance, NumericalAnomaly, TransportDistance, TransportMove, TransportPlan,
};

pub mod prelude {
    pub use crate::compose::weighted_sum;
    pub use crate::measure::PointMeasure;
    pub use crate::params::TransportParams;
    pub use crate::peak::Peak;
    pub use crate::transport::{TransportDistance, TransportMove};
}
