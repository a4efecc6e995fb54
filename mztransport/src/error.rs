//! Errors raised while building, reading or comparing measures
use std::io;

use thiserror::Error;

/// A coarse classification of [`MeasureError`] values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The inputs violated a requirement of the operation
    Precondition,
    /// A peak list could not be read
    Parse,
    /// The underlying reader or writer failed
    Io,
}

/// An error that might occur while operating on a [`PointMeasure`](crate::PointMeasure)
#[derive(Debug, Error)]
pub enum MeasureError {
    #[error("Cannot {operation} an empty measure")]
    EmptyMeasure { operation: &'static str },
    #[error("The total weight of the measure is zero")]
    ZeroTotalWeight,
    #[error("The {operand} measure is not normalized, its total weight is {total}")]
    NotNormalized { operand: &'static str, total: f64 },
    #[error("The measures do not have equal total weight, {residual} weight was left untransported")]
    UnequalTotalWeight { residual: f64 },
    #[error("The {operand} measure has a negative weight {weight} at {position}")]
    NegativeWeight {
        operand: &'static str,
        position: f64,
        weight: f64,
    },
    #[error("Invalid value for {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("Failed to parse line {line} ({content:?}): {reason}")]
    Parse {
        line: usize,
        content: String,
        reason: String,
    },
    #[error("An IO error occurred: {0}")]
    Io(
        #[source]
        #[from]
        io::Error,
    ),
}

impl MeasureError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Io(_) => ErrorKind::Io,
            _ => ErrorKind::Precondition,
        }
    }

    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
