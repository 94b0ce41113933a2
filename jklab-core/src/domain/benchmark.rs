//! Benchmark index series (decimal returns), used only for comparison.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::returns::DecimalReturn;

#[derive(Debug, Error, PartialEq)]
pub enum BenchmarkError {
    #[error("benchmark dates must be strictly increasing: {previous} followed by {current}")]
    UnorderedDates {
        previous: NaiveDate,
        current: NaiveDate,
    },

    #[error("non-finite benchmark return on {0}")]
    NonFiniteValue(NaiveDate),
}

/// A single benchmark observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkPoint {
    pub date: NaiveDate,
    pub ret: DecimalReturn,
}

/// Date-ordered benchmark returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkSeries {
    points: Vec<BenchmarkPoint>,
}

impl BenchmarkSeries {
    pub fn new(points: Vec<BenchmarkPoint>) -> Result<Self, BenchmarkError> {
        for pair in points.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(BenchmarkError::UnorderedDates {
                    previous: pair[0].date,
                    current: pair[1].date,
                });
            }
        }
        if let Some(bad) = points.iter().find(|p| !p.ret.is_finite()) {
            return Err(BenchmarkError::NonFiniteValue(bad.date));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[BenchmarkPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, date: NaiveDate) -> Option<DecimalReturn> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|i| self.points[i].ret)
    }

    /// Points with `start <= date <= end`.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = &BenchmarkPoint> {
        self.points
            .iter()
            .filter(move |p| p.date >= start && p.date <= end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(m: u32, r: f64) -> BenchmarkPoint {
        BenchmarkPoint {
            date: NaiveDate::from_ymd_opt(2021, m, 28).unwrap(),
            ret: DecimalReturn(r),
        }
    }

    #[test]
    fn lookup_and_range() {
        let series = BenchmarkSeries::new(vec![pt(1, 0.01), pt(2, -0.02), pt(3, 0.03)]).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.get(pt(2, 0.0).date), Some(DecimalReturn(-0.02)));
        assert_eq!(series.between(pt(2, 0.0).date, pt(3, 0.0).date).count(), 2);
    }

    #[test]
    fn rejects_out_of_order_points() {
        let err = BenchmarkSeries::new(vec![pt(2, 0.01), pt(1, 0.01)]).unwrap_err();
        assert!(matches!(err, BenchmarkError::UnorderedDates { .. }));
    }

    #[test]
    fn rejects_nan() {
        let err = BenchmarkSeries::new(vec![pt(1, f64::NAN)]).unwrap_err();
        assert!(matches!(err, BenchmarkError::NonFiniteValue(_)));
    }
}
