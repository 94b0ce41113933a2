//! Best pair vs benchmark: cumulative growth of the spread and the index.

use serde::{Deserialize, Serialize};

use jklab_core::domain::BenchmarkSeries;
use jklab_core::portfolio::{cumulative_comparison, ComparisonPoint};

use crate::sweep::SweepResults;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkComparison {
    pub formation: usize,
    pub holding: usize,
    pub points: Vec<ComparisonPoint>,
}

impl BenchmarkComparison {
    /// Compare the sweep's best pair against `benchmark`.
    ///
    /// `None` when the sweep has no best pair. The point list may be empty
    /// when no benchmark date lines up with the pair's months.
    pub fn for_best(sweep: &SweepResults, benchmark: &BenchmarkSeries) -> Option<Self> {
        let best = sweep.best()?;
        let points = cumulative_comparison(&best.rows, benchmark);
        if points.is_empty() {
            tracing::warn!(
                formation = best.formation,
                holding = best.holding,
                "benchmark shares no dates with the best pair"
            );
        }
        Some(Self {
            formation: best.formation,
            holding: best.holding,
            points,
        })
    }

    /// Final growth of 1 unit in the spread.
    pub fn final_spread_growth(&self) -> Option<f64> {
        self.points.last().map(|p| p.cumulative_spread)
    }

    /// Final growth of 1 unit in the benchmark.
    pub fn final_benchmark_growth(&self) -> Option<f64> {
        self.points.last().map(|p| p.cumulative_benchmark)
    }

    pub fn outperformed(&self) -> Option<bool> {
        Some(self.final_spread_growth()? > self.final_benchmark_growth()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use jklab_core::domain::{BenchmarkPoint, DecimalReturn, PercentReturn, ReturnPanel};
    use jklab_core::fingerprint::DatasetHash;

    use crate::sweep::{ParamGrid, ParamSweep};

    fn month(i: usize) -> NaiveDate {
        NaiveDate::from_ymd_opt(2018 + (i / 12) as i32, (i % 12) as u32 + 1, 1).unwrap()
    }

    /// Stock `s` earns `s / 10` percent every month.
    fn panel() -> ReturnPanel {
        let rows = (0..24)
            .map(|_| (0..50).map(|s| Some(PercentReturn(s as f64 / 10.0))).collect())
            .collect();
        ReturnPanel::new(
            (0..24).map(month).collect(),
            (0..50).map(|s| format!("S{s:02}")).collect(),
            rows,
        )
        .unwrap()
    }

    #[test]
    fn compares_best_pair_against_benchmark() {
        let panel = panel();
        let sweep = ParamSweep::new(&panel, DatasetHash::of_panel(&panel))
            .sweep(&ParamGrid::new(vec![3], vec![3]));
        let benchmark = BenchmarkSeries::new(
            (0..24)
                .map(|i| BenchmarkPoint {
                    date: month(i),
                    ret: DecimalReturn(0.0),
                })
                .collect(),
        )
        .unwrap();

        let comparison = BenchmarkComparison::for_best(&sweep, &benchmark).unwrap();

        assert_eq!((comparison.formation, comparison.holding), (3, 3));
        assert_eq!(comparison.points.len(), 24 - 3);
        // Winners S45..S49 average 4.7%, losers S00..S04 0.2%: spread 4.5% a month.
        let expected = 1.045_f64.powi(21);
        assert!((comparison.final_spread_growth().unwrap() - expected).abs() < 1e-9);
        assert_eq!(comparison.final_benchmark_growth(), Some(1.0));
        assert_eq!(comparison.outperformed(), Some(true));
    }

    #[test]
    fn no_best_pair_no_comparison() {
        let panel = panel();
        let sweep = ParamSweep::new(&panel, DatasetHash::of_panel(&panel))
            .sweep(&ParamGrid::new(vec![24], vec![3]));
        assert!(BenchmarkComparison::for_best(&sweep, &BenchmarkSeries::default()).is_none());
    }
}
