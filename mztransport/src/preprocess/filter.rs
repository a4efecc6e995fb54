//! Removing observed signal that lies too far from any reference to be explained by it
use itertools::Itertools;
use mzpeaks::coordinate::{SimpleInterval, Span1D};
use tracing::debug;

use crate::error::MeasureError;
use crate::measure::PointMeasure;

use super::check_finite_nonnegative;

/// Sort intervals by their start and merge those that overlap or touch
fn merge_intervals(mut intervals: Vec<SimpleInterval<f64>>) -> Vec<SimpleInterval<f64>> {
    intervals.sort_by(|a, b| a.start.total_cmp(&b.start));
    intervals
        .into_iter()
        .coalesce(|mut a, b| {
            if b.start <= a.end {
                a.end = a.end.max(b.end);
                Ok(a)
            } else {
                Err((a, b))
            }
        })
        .collect()
}

impl PointMeasure {
    /// Keep only the peaks within `margin` (inclusive) of some peak of some reference.
    ///
    /// The reference positions are merged into one sorted sequence and swept once,
    /// keeping track of the pair of reference positions bracketing each peak.
    pub fn filter_against_references(
        &self,
        references: &[PointMeasure],
        margin: f64,
    ) -> Result<PointMeasure, MeasureError> {
        check_finite_nonnegative("margin", margin)?;
        let targets: Vec<f64> = references
            .iter()
            .map(|r| r.positions())
            .kmerge_by(|a, b| a < b)
            .dedup()
            .collect();
        if targets.is_empty() {
            return Ok(PointMeasure::empty());
        }

        let mut index = 0;
        let kept: Vec<_> = self
            .iter()
            .filter(|peak| {
                let x = peak.position;
                while index + 1 < targets.len() && targets[index + 1] < x {
                    index += 1;
                }
                (x - targets[index]).abs() <= margin
                    || targets
                        .get(index + 1)
                        .is_some_and(|next| (x - next).abs() <= margin)
            })
            .copied()
            .collect();
        debug!(
            "Kept {} of {} peaks near {} reference positions",
            kept.len(),
            self.len(),
            targets.len()
        );
        Ok(PointMeasure { peaks: kept })
    }

    /// Keep only the peaks that fall inside the span of some reference, widened by `margin`
    /// on either side.
    pub fn filter_to_envelopes(
        &self,
        references: &[PointMeasure],
        margin: f64,
    ) -> Result<PointMeasure, MeasureError> {
        check_finite_nonnegative("margin", margin)?;
        let envelopes = merge_intervals(
            references
                .iter()
                .filter_map(|r| r.span())
                .map(|(first, last)| SimpleInterval::new(first - margin, last + margin))
                .collect(),
        );

        let mut current = envelopes.iter().peekable();
        let kept: Vec<_> = self
            .iter()
            .filter(|peak| {
                let x = peak.position;
                while current.next_if(|iv| iv.end < x).is_some() {}
                current.peek().is_some_and(|iv| iv.contains(&x))
            })
            .copied()
            .collect();
        debug!(
            "Kept {} of {} peaks inside {} envelopes",
            kept.len(),
            self.len(),
            envelopes.len()
        );
        Ok(PointMeasure { peaks: kept })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_filter_against_references() {
        let observed: PointMeasure = vec![(10.0, 0.2), (20.0, 0.3), (50.0, 0.5)].into();
        let refs: Vec<PointMeasure> = vec![vec![(10.1, 1.0)].into(), vec![(49.9, 1.0)].into()];
        let filtered = observed.filter_against_references(&refs, 0.2).unwrap();
        let positions: Vec<f64> = filtered.positions().collect();
        assert_eq!(positions, vec![10.0, 50.0]);

        let none = observed.filter_against_references(&[], 0.2).unwrap();
        assert!(none.is_empty());
        assert!(observed.filter_against_references(&refs, -1.0).is_err());
    }

    #[test]
    fn test_margin_is_inclusive() {
        let observed: PointMeasure = vec![(10.0, 0.5), (10.5, 0.5)].into();
        let refs: Vec<PointMeasure> = vec![vec![(10.25, 1.0)].into()];
        let filtered = observed.filter_against_references(&refs, 0.25).unwrap();
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn test_filter_to_envelopes() {
        let observed: PointMeasure = (0..30).map(|i| (100.0 + i as f64 * 0.5, 1.0)).collect();
        let refs: Vec<PointMeasure> = vec![
            vec![(101.0, 0.5), (102.0, 0.5)].into(),
            vec![(102.5, 0.5), (103.0, 0.5)].into(),
            vec![(110.0, 1.0)].into(),
            PointMeasure::empty(),
        ];
        let filtered = observed.filter_to_envelopes(&refs, 0.25).unwrap();
        let positions: Vec<f64> = filtered.positions().collect();
        assert_eq!(positions, vec![101.0, 101.5, 102.0, 102.5, 103.0, 110.0]);
    }

    #[test]
    fn test_merge_intervals() {
        let merged = merge_intervals(vec![
            SimpleInterval::new(5.0, 6.0),
            SimpleInterval::new(1.0, 2.0),
            SimpleInterval::new(2.0, 3.0),
            SimpleInterval::new(2.5, 2.7),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!((merged[0].start, merged[0].end), (1.0, 3.0));
        assert_eq!((merged[1].start, merged[1].end), (5.0, 6.0));
    }
}
