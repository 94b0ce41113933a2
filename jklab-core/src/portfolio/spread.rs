//! Winner-minus-loser spread: leg join, summary statistics and the cumulative
//! comparison against a benchmark.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{mean_percent, BenchmarkSeries, DecimalReturn, PercentReturn, ReturnSeries};

/// One date on which both legs have a value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegRow {
    pub date: NaiveDate,
    pub winner: PercentReturn,
    pub loser: PercentReturn,
}

impl LegRow {
    /// Winner minus loser, in percent.
    pub fn spread(&self) -> PercentReturn {
        PercentReturn(self.winner.value() - self.loser.value())
    }
}

/// Inner join of the two leg series on date. Dates present in only one leg
/// are dropped; nothing is filled.
pub fn inner_join(winners: &ReturnSeries, losers: &ReturnSeries) -> Vec<LegRow> {
    winners
        .iter()
        .filter_map(|(date, winner)| {
            losers.get(date).map(|loser| LegRow {
                date,
                winner,
                loser,
            })
        })
        .collect()
}

/// Mean winner, mean loser and their difference over a set of joined rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpreadSummary {
    pub mean_winner: PercentReturn,
    pub mean_loser: PercentReturn,
    pub spread: PercentReturn,
    pub months: usize,
}

impl SpreadSummary {
    /// `None` when there are no rows.
    pub fn from_rows(rows: &[LegRow]) -> Option<Self> {
        let mean_winner = mean_percent(rows.iter().map(|r| r.winner))?;
        let mean_loser = mean_percent(rows.iter().map(|r| r.loser))?;
        Some(Self {
            mean_winner,
            mean_loser,
            spread: PercentReturn(mean_winner.value() - mean_loser.value()),
            months: rows.len(),
        })
    }
}

/// One month of the strategy vs benchmark comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparisonPoint {
    pub date: NaiveDate,
    pub spread: PercentReturn,
    pub benchmark: DecimalReturn,
    /// Growth of 1 unit invested in the spread: running `prod(1 + spread/100)`.
    pub cumulative_spread: f64,
    /// Growth of 1 unit invested in the benchmark: running `prod(1 + r)`.
    pub cumulative_benchmark: f64,
}

/// Compound the spread and the benchmark over their common dates.
///
/// The benchmark is first restricted to the span of `rows`; only dates found
/// in both survive.
pub fn cumulative_comparison(rows: &[LegRow], benchmark: &BenchmarkSeries) -> Vec<ComparisonPoint> {
    let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
        return Vec::new();
    };

    let mut cumulative_spread = 1.0;
    let mut cumulative_benchmark = 1.0;
    let mut out = Vec::new();

    let mut bench = benchmark.between(first.date, last.date).peekable();
    for row in rows {
        while bench.next_if(|p| p.date < row.date).is_some() {}
        let Some(point) = bench.next_if(|p| p.date == row.date) else {
            continue;
        };

        let spread = row.spread();
        cumulative_spread *= spread.growth();
        cumulative_benchmark *= point.ret.growth();
        out.push(ComparisonPoint {
            date: row.date,
            spread,
            benchmark: point.ret,
            cumulative_spread,
            cumulative_benchmark,
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BenchmarkPoint;

    fn d(m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, m, 1).unwrap()
    }

    fn series(points: &[(u32, f64)]) -> ReturnSeries {
        points
            .iter()
            .map(|&(m, v)| (d(m), PercentReturn(v)))
            .collect()
    }

    fn row(m: u32, w: f64, l: f64) -> LegRow {
        LegRow {
            date: d(m),
            winner: PercentReturn(w),
            loser: PercentReturn(l),
        }
    }

    #[test]
    fn join_keeps_only_common_dates() {
        let winners = series(&[(1, 1.0), (2, 2.0), (3, 3.0)]);
        let losers = series(&[(2, -1.0), (3, -2.0), (4, -3.0)]);
        let rows = inner_join(&winners, &losers);
        assert_eq!(rows, vec![row(2, 2.0, -1.0), row(3, 3.0, -2.0)]);
    }

    #[test]
    fn summary_means_and_spread() {
        let rows = vec![row(1, 2.0, 1.0), row(2, 4.0, -1.0)];
        let summary = SpreadSummary::from_rows(&rows).unwrap();
        assert_eq!(summary.mean_winner, PercentReturn(3.0));
        assert_eq!(summary.mean_loser, PercentReturn(0.0));
        assert_eq!(summary.spread, PercentReturn(3.0));
        assert_eq!(summary.months, 2);
        assert_eq!(rows[1].spread(), PercentReturn(5.0));
    }

    #[test]
    fn summary_of_nothing_is_none() {
        assert_eq!(SpreadSummary::from_rows(&[]), None);
    }

    #[test]
    fn comparison_compounds_both_series() {
        let rows = vec![row(2, 12.0, 2.0), row(3, 0.0, 10.0), row(5, 5.0, 0.0)];
        let bench = BenchmarkSeries::new(
            [(1, 0.5), (2, 0.10), (3, -0.10), (4, 0.2), (5, 0.0), (6, 0.3)]
                .iter()
                .map(|&(m, r)| BenchmarkPoint {
                    date: d(m),
                    ret: DecimalReturn(r),
                })
                .collect(),
        )
        .unwrap();

        let points = cumulative_comparison(&rows, &bench);
        let dates: Vec<_> = points.iter().map(|p| p.date).collect();
        assert_eq!(dates, vec![d(2), d(3), d(5)]);

        let last = points.last().unwrap();
        assert!((last.cumulative_spread - 1.1 * 0.9 * 1.05).abs() < 1e-12);
        assert!((last.cumulative_benchmark - 1.1 * 0.9).abs() < 1e-12);
    }

    #[test]
    fn comparison_skips_rows_without_benchmark() {
        let rows = vec![row(1, 1.0, 0.0), row(2, 1.0, 0.0)];
        let bench = BenchmarkSeries::new(vec![BenchmarkPoint {
            date: d(2),
            ret: DecimalReturn(0.01),
        }])
        .unwrap();
        let points = cumulative_comparison(&rows, &bench);
        assert_eq!(points.len(), 1);
        assert!((points[0].cumulative_spread - 1.01).abs() < 1e-12);
    }

    #[test]
    fn comparison_of_empty_rows_is_empty() {
        assert!(cumulative_comparison(&[], &BenchmarkSeries::default()).is_empty());
    }
}
