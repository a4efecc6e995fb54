//! Order-independent floating point summation.
//!
//! [`ExactSum`] keeps a list of non-overlapping partial sums (Shewchuk's algorithm) so
//! that the final total is the correctly rounded value of the exact sum of its inputs,
//! regardless of the order they were added in.
use std::mem;

use num_traits::Float;

pub(crate) fn isclose<T: Float>(a: T, b: T, delta: T) -> bool {
    (a - b).abs() <= delta
}

/// An accumulator whose result does not depend on the order of its inputs
#[derive(Debug, Default, Clone)]
pub struct ExactSum {
    partials: Vec<f64>,
    special: f64,
}

impl ExactSum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, mut x: f64) {
        if !x.is_finite() {
            self.special += x;
            return;
        }
        let mut i = 0;
        for j in 0..self.partials.len() {
            let mut y = self.partials[j];
            if x.abs() < y.abs() {
                mem::swap(&mut x, &mut y);
            }
            let hi = x + y;
            let lo = y - (hi - x);
            if lo != 0.0 {
                self.partials[i] = lo;
                i += 1;
            }
            x = hi;
        }
        self.partials.truncate(i);
        self.partials.push(x);
    }

    /// The correctly rounded sum of everything added so far
    pub fn total(&self) -> f64 {
        if self.special != 0.0 || self.special.is_nan() {
            return self.special;
        }
        let p = &self.partials;
        let mut n = p.len();
        if n == 0 {
            return 0.0;
        }
        n -= 1;
        let mut hi = p[n];
        let mut lo = 0.0;
        while n > 0 {
            let x = hi;
            n -= 1;
            let y = p[n];
            hi = x + y;
            let yr = hi - x;
            lo = y - yr;
            if lo != 0.0 {
                break;
            }
        }
        // Round half to even when the discarded tail sits exactly on a midpoint
        if n > 0 && ((lo < 0.0 && p[n - 1] < 0.0) || (lo > 0.0 && p[n - 1] > 0.0)) {
            let y = lo * 2.0;
            let x = hi + y;
            let yr = x - hi;
            if y == yr {
                hi = x;
            }
        }
        hi
    }
}

impl Extend<f64> for ExactSum {
    fn extend<T: IntoIterator<Item = f64>>(&mut self, iter: T) {
        for x in iter {
            self.add(x);
        }
    }
}

impl FromIterator<f64> for ExactSum {
    fn from_iter<T: IntoIterator<Item = f64>>(iter: T) -> Self {
        let mut this = Self::new();
        this.extend(iter);
        this
    }
}

/// Sum `values` with [`ExactSum`]
pub fn fsum<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    values.into_iter().collect::<ExactSum>().total()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_cancellation() {
        let values = [1e100, 1.0, -1e100, 1e-100, 1e50, -1.0, -1e50];
        assert_eq!(fsum(values), 1e-100);
        let naive: f64 = values.iter().sum();
        assert_ne!(naive, 1e-100);
    }

    #[test]
    fn test_order_independent() {
        let values = vec![0.1; 10];
        assert_eq!(fsum(values.iter().copied()), 1.0);
        let mut mixed = vec![1e16, 1.0, 1.0, -1e16, 0.3, 0.7];
        let forward = fsum(mixed.iter().copied());
        mixed.reverse();
        let backward = fsum(mixed.iter().copied());
        assert_eq!(forward, backward);
        assert_eq!(forward, 3.0);
    }

    #[test]
    fn test_empty_and_special() {
        assert_eq!(fsum(std::iter::empty()), 0.0);
        assert!(fsum([1.0, f64::NAN]).is_nan());
        assert_eq!(fsum([1.0, f64::INFINITY]), f64::INFINITY);
    }

    #[test]
    fn test_isclose() {
        assert!(isclose(1.0, 1.0 + 1e-12, 1e-9));
        assert!(!isclose(1.0f32, 1.1, 1e-3));
    }
}
