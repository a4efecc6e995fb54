//! The canonical container for a discretized one-dimensional weighted point measure
use std::cmp::Ordering;
use std::mem;
use std::ops::{Add, Index, Mul, Neg, Sub};
use std::slice;

use itertools::Itertools;
use mzpeaks::CentroidLike;
use rand::Rng;
use tracing::{trace, warn};

use crate::error::MeasureError;
use crate::params::PRUNE_THRESHOLD;
use crate::peak::Peak;
use crate::summation::{fsum, isclose, ExactSum};

/// A sequence of [`Peak`]s sorted by strictly increasing position.
///
/// Every constructor and every structural mutation restores the canonical form:
///   1. peaks are sorted by position,
///   2. peaks sharing a position are merged by summing their weights,
///   3. peaks whose absolute weight is below [`PRUNE_THRESHOLD`] are removed.
///
/// The total weight is not required to be `1.0` unless [`PointMeasure::normalize`]
/// has been called.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "Vec<Peak>", into = "Vec<Peak>"))]
pub struct PointMeasure {
    pub(crate) peaks: Vec<Peak>,
}

/// Order positions so that values comparing `==`, such as `-0.0` and `0.0`, are equal
pub(crate) fn cmp_position(a: f64, b: f64) -> Ordering {
    if a == b {
        Ordering::Equal
    } else {
        a.total_cmp(&b)
    }
}

/// Merge two position-sorted peak sequences, summing the weights of shared positions
fn merge_sorted(a: &[Peak], b: &[Peak]) -> Vec<Peak> {
    let mut merged = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let (x, y) = (a[i], b[j]);
        match cmp_position(x.position, y.position) {
            Ordering::Less => {
                merged.push(x);
                i += 1;
            }
            Ordering::Greater => {
                merged.push(y);
                j += 1;
            }
            Ordering::Equal => {
                merged.push(Peak::new(x.position, x.weight + y.weight));
                i += 1;
                j += 1;
            }
        }
    }
    merged.extend_from_slice(&a[i..]);
    merged.extend_from_slice(&b[j..]);
    merged.retain(|p| p.weight.abs() >= PRUNE_THRESHOLD);
    merged
}

impl PointMeasure {
    /// Build a canonical measure from an arbitrary list of peaks
    pub fn new(peaks: Vec<Peak>) -> Self {
        let mut this = Self { peaks };
        this.canonicalize();
        this
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a measure from any `mzpeaks` centroid peak list
    pub fn from_centroids<C: CentroidLike>(peaks: &[C]) -> Self {
        peaks.iter().map(Peak::from_centroid).collect()
    }

    /// Draw `count` peaks with positions uniform over `domain` and weights uniform over `[0, 1)`
    pub fn from_random<R: Rng + ?Sized>(domain: (f64, f64), count: usize, rng: &mut R) -> Self {
        (0..count)
            .map(|_| {
                Peak::new(
                    rng.gen_range(domain.0..domain.1),
                    rng.gen_range(0.0..1.0),
                )
            })
            .collect()
    }

    /// Restore the canonical form. Calling this on a canonical measure changes nothing.
    pub fn canonicalize(&mut self) {
        self.canonicalize_with(PRUNE_THRESHOLD)
    }

    /// As [`PointMeasure::canonicalize`], removing peaks whose absolute weight is below
    /// `prune_threshold` instead of [`PRUNE_THRESHOLD`]
    pub fn canonicalize_with(&mut self, prune_threshold: f64) {
        let n_before = self.peaks.len();
        self.peaks.retain(Peak::is_finite);
        if self.peaks.len() != n_before {
            warn!(
                "Discarded {} peaks with a non-finite position or weight",
                n_before - self.peaks.len()
            );
        }
        for p in self.peaks.iter_mut() {
            // -0.0 + 0.0 == +0.0
            p.position += 0.0;
        }
        self.peaks.sort_by(|a, b| cmp_position(a.position, b.position));
        let peaks = mem::take(&mut self.peaks);
        self.peaks = peaks
            .into_iter()
            .coalesce(|a, b| {
                if a.position == b.position {
                    Ok(Peak::new(a.position, a.weight + b.weight))
                } else {
                    Err((a, b))
                }
            })
            .filter(|p| p.weight.abs() >= prune_threshold)
            .collect();
        trace!("Canonicalized {n_before} peaks into {}", self.peaks.len());
    }

    /// The exactly rounded sum of all weights
    pub fn total_weight(&self) -> f64 {
        fsum(self.peaks.iter().map(|p| p.weight))
    }

    /// Whether the total weight is within `tolerance` of `1.0`
    pub fn is_normalized(&self, tolerance: f64) -> bool {
        isclose(self.total_weight(), 1.0, tolerance)
    }

    /// Rescale all weights in place so that they sum to `target`.
    ///
    /// # Errors
    /// [`MeasureError::ZeroTotalWeight`] if the measure has no weight to rescale,
    /// including when it is empty.
    pub fn normalize(&mut self, target: f64) -> Result<(), MeasureError> {
        if !target.is_finite() {
            return Err(MeasureError::invalid("target", format!("{target} is not finite")));
        }
        let total = self.total_weight();
        if total == 0.0 {
            return Err(MeasureError::ZeroTotalWeight);
        }
        let factor = target / total;
        for p in self.peaks.iter_mut() {
            p.weight *= factor;
        }
        self.peaks.retain(|p| p.weight.abs() >= PRUNE_THRESHOLD);
        Ok(())
    }

    /// As [`PointMeasure::normalize`], but leave `self` untouched and return a normalized copy
    pub fn normalized(&self, target: f64) -> Result<Self, MeasureError> {
        let mut dup = self.clone();
        dup.normalize(target)?;
        Ok(dup)
    }

    /// The union of both measures' peaks, summing weights at shared positions
    pub fn add(&self, other: &Self) -> Self {
        Self {
            peaks: merge_sorted(&self.peaks, &other.peaks),
        }
    }

    /// Multiply every weight by `factor`. A negative factor is allowed,
    /// so subtraction is `a.add(&b.scale(-1.0))`.
    pub fn scale(&self, factor: f64) -> Self {
        Self::new(
            self.peaks
                .iter()
                .map(|p| Peak::new(p.position, p.weight * factor))
                .collect(),
        )
    }

    /// The peak with the greatest weight, preferring the lowest position on ties
    pub fn modal_peak(&self) -> Result<Peak, MeasureError> {
        self.peaks
            .iter()
            .copied()
            .reduce(|best, p| if p.weight > best.weight { p } else { best })
            .ok_or(MeasureError::EmptyMeasure {
                operation: "find the modal peak of",
            })
    }

    /// The weight-averaged position of the measure
    pub fn average_position(&self) -> Result<f64, MeasureError> {
        let total = self.total_weight();
        if total == 0.0 {
            return Err(MeasureError::ZeroTotalWeight);
        }
        Ok(fsum(self.peaks.iter().map(|p| p.position * p.weight)) / total)
    }

    /// The weight shared by both measures, the sum over common positions of the
    /// smaller of the two weights
    pub fn explained_weight(&self, other: &Self) -> f64 {
        let mut acc = ExactSum::new();
        let (mut i, mut j) = (0, 0);
        while i < self.len() && j < other.len() {
            let (x, y) = (self.peaks[i], other.peaks[j]);
            match x.position.total_cmp(&y.position) {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    acc.add(x.weight.min(y.weight));
                    i += 1;
                    j += 1;
                }
            }
        }
        acc.total()
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, Peak> {
        self.peaks.iter()
    }

    pub fn as_slice(&self) -> &[Peak] {
        &self.peaks
    }

    pub fn get(&self, index: usize) -> Option<&Peak> {
        self.peaks.get(index)
    }

    pub fn first(&self) -> Option<&Peak> {
        self.peaks.first()
    }

    pub fn last(&self) -> Option<&Peak> {
        self.peaks.last()
    }

    /// The lowest and highest positions in the measure
    pub fn span(&self) -> Option<(f64, f64)> {
        match (self.first(), self.last()) {
            (Some(a), Some(b)) => Some((a.position, b.position)),
            _ => None,
        }
    }

    pub fn positions(&self) -> impl Iterator<Item = f64> + '_ {
        self.peaks.iter().map(|p| p.position)
    }

    pub fn weights(&self) -> impl Iterator<Item = f64> + '_ {
        self.peaks.iter().map(|p| p.weight)
    }

    pub fn into_inner(self) -> Vec<Peak> {
        self.peaks
    }
}

impl From<Vec<Peak>> for PointMeasure {
    fn from(value: Vec<Peak>) -> Self {
        Self::new(value)
    }
}

impl From<Vec<(f64, f64)>> for PointMeasure {
    fn from(value: Vec<(f64, f64)>) -> Self {
        value.into_iter().collect()
    }
}

impl From<PointMeasure> for Vec<Peak> {
    fn from(value: PointMeasure) -> Self {
        value.peaks
    }
}

impl FromIterator<Peak> for PointMeasure {
    fn from_iter<T: IntoIterator<Item = Peak>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl FromIterator<(f64, f64)> for PointMeasure {
    fn from_iter<T: IntoIterator<Item = (f64, f64)>>(iter: T) -> Self {
        iter.into_iter().map(Peak::from).collect()
    }
}

impl<'a> IntoIterator for &'a PointMeasure {
    type Item = &'a Peak;

    type IntoIter = slice::Iter<'a, Peak>;

    fn into_iter(self) -> Self::IntoIter {
        self.peaks.iter()
    }
}

impl Index<usize> for PointMeasure {
    type Output = Peak;

    fn index(&self, index: usize) -> &Self::Output {
        &self.peaks[index]
    }
}

impl Add<&PointMeasure> for &PointMeasure {
    type Output = PointMeasure;

    fn add(self, rhs: &PointMeasure) -> Self::Output {
        PointMeasure::add(self, rhs)
    }
}

impl Sub<&PointMeasure> for &PointMeasure {
    type Output = PointMeasure;

    fn sub(self, rhs: &PointMeasure) -> Self::Output {
        PointMeasure::add(self, &rhs.scale(-1.0))
    }
}

impl Mul<f64> for &PointMeasure {
    type Output = PointMeasure;

    fn mul(self, rhs: f64) -> Self::Output {
        self.scale(rhs)
    }
}

impl Mul<&PointMeasure> for f64 {
    type Output = PointMeasure;

    fn mul(self, rhs: &PointMeasure) -> Self::Output {
        rhs.scale(self)
    }
}

impl Neg for &PointMeasure {
    type Output = PointMeasure;

    fn neg(self) -> Self::Output {
        self.scale(-1.0)
    }
}

#[cfg(test)]
mod test {
    use mzpeaks::CentroidPeak;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::error::ErrorKind;

    fn make_measure() -> PointMeasure {
        vec![(101.0, 0.25), (100.0, 0.5), (101.0, 0.25), (102.0, 1e-13)].into()
    }

    #[test]
    fn test_canonicalize() {
        let m = make_measure();
        assert_eq!(m.len(), 2);
        assert_eq!(m[0], Peak::new(100.0, 0.5));
        assert_eq!(m[1], Peak::new(101.0, 0.5));
        assert!(m.iter().tuple_windows().all(|(a, b)| a.position < b.position));
    }

    #[test]
    fn test_canonicalize_idempotent() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let m = PointMeasure::from_random((0.0, 10.0), 25, &mut rng);
            let mut dup = m.clone();
            dup.canonicalize();
            assert_eq!(dup, m);
        }
    }

    #[test]
    fn test_signed_zero_position() {
        let a: PointMeasure = vec![(-0.0, 0.5), (1.0, 0.5)].into();
        let b: PointMeasure = vec![(0.0, 0.5)].into();
        assert!(a[0].position.is_sign_positive());

        let total = a.add(&b);
        assert_eq!(total.len(), 2);
        assert_eq!(total[0], Peak::new(0.0, 1.0));
        let mut again = total.clone();
        again.canonicalize();
        assert_eq!(again, total);

        let raw = PointMeasure {
            peaks: vec![Peak::new(-0.0, 0.5), Peak::new(1.0, 0.5)],
        };
        let merged = raw.add(&b);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].weight, 1.0);
    }

    #[test]
    fn test_canonicalize_with_threshold() {
        let mut measure: PointMeasure = vec![(1.0, 1e-6), (2.0, 0.5), (2.0, 0.5)].into();
        assert_eq!(measure.len(), 2);
        measure.canonicalize_with(1e-3);
        assert_eq!(measure.len(), 1);
        assert_eq!(measure[0], Peak::new(2.0, 1.0));
    }

    #[test]
    fn test_negative_weights_survive() {
        let m: PointMeasure = vec![(1.0, -0.5), (2.0, 1.0), (1.0, 0.25)].into();
        assert_eq!(m.len(), 2);
        assert_eq!(m[0], Peak::new(1.0, -0.25));
    }

    #[test]
    fn test_non_finite_discarded() {
        let m: PointMeasure = vec![(1.0, f64::NAN), (f64::INFINITY, 1.0), (2.0, 1.0)].into();
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].position, 2.0);
    }

    #[test]
    fn test_normalize() {
        let mut rng = StdRng::seed_from_u64(11);
        for target in [1.0, 0.5, 100.0, 3.3] {
            let mut m = PointMeasure::from_random((100.0, 200.0), 50, &mut rng);
            m.normalize(target).unwrap();
            assert!(isclose(m.total_weight(), target, 1e-9));
        }
        let m = make_measure().normalized(2.0).unwrap();
        assert_eq!(m.total_weight(), 2.0);
    }

    #[test]
    fn test_normalize_zero_total() {
        let mut m = PointMeasure::empty();
        let err = m.normalize(1.0).unwrap_err();
        assert!(matches!(err, MeasureError::ZeroTotalWeight));
        assert_eq!(err.kind(), ErrorKind::Precondition);

        let mut m: PointMeasure = vec![(1.0, 1.0), (2.0, -1.0)].into();
        assert!(m.normalize(1.0).is_err());
    }

    #[test]
    fn test_add_and_scale() {
        let a: PointMeasure = vec![(1.0, 1.0), (2.0, 1.0)].into();
        let b: PointMeasure = vec![(2.0, 0.5), (3.0, 1.0)].into();
        let c = a.add(&b);
        assert_eq!(c.as_slice(), &[Peak::new(1.0, 1.0), Peak::new(2.0, 1.5), Peak::new(3.0, 1.0)]);
        assert_eq!(&a + &b, c);

        let d = c.scale(2.0);
        assert_eq!(d.total_weight(), 7.0);
        assert_eq!(&c * 2.0, d);
        assert_eq!(2.0 * &c, d);

        let e = &c - &b;
        assert_eq!(e, a);
        assert!((&a - &a).is_empty());
        assert!(c.scale(0.0).is_empty());
        assert_eq!((-&a)[0].weight, -1.0);
    }

    #[test]
    fn test_modal_peak() {
        let m: PointMeasure = vec![(3.0, 0.4), (1.0, 0.4), (2.0, 0.2)].into();
        assert_eq!(m.modal_peak().unwrap(), Peak::new(1.0, 0.4));
        let err = PointMeasure::empty().modal_peak().unwrap_err();
        assert!(matches!(err, MeasureError::EmptyMeasure { .. }));
    }

    #[test]
    fn test_average_position() {
        let m: PointMeasure = vec![(100.0, 1.0), (102.0, 3.0)].into();
        assert!(isclose(m.average_position().unwrap(), 101.5, 1e-12));
        assert!(PointMeasure::empty().average_position().is_err());
    }

    #[test]
    fn test_explained_weight() {
        let a: PointMeasure = vec![(1.0, 0.5), (2.0, 0.3), (3.0, 0.2)].into();
        let b: PointMeasure = vec![(1.0, 0.2), (3.0, 0.7), (4.0, 0.1)].into();
        assert!(isclose(a.explained_weight(&b), 0.4, 1e-12));
        assert!(isclose(b.explained_weight(&a), 0.4, 1e-12));
    }

    #[test]
    fn test_accessors() {
        let centroids = vec![CentroidPeak::new(200.0, 5.0, 0), CentroidPeak::new(100.0, 1.0, 1)];
        let m = PointMeasure::from_centroids(&centroids);
        assert_eq!(m.span(), Some((100.0, 200.0)));
        assert_eq!(m.positions().collect::<Vec<_>>(), vec![100.0, 200.0]);
        assert_eq!(m.weights().collect::<Vec<_>>(), vec![1.0, 5.0]);
        assert_eq!(PointMeasure::empty().span(), None);
        assert_eq!((&m).into_iter().count(), 2);
    }
}
