//! Summary matrix: one row per (J, K) pair with a usable spread.

use serde::{Deserialize, Serialize};

use crate::runner::JkResult;

/// One pair's summary statistics, in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    /// 1-based position in J-then-K order.
    pub serial: usize,
    pub formation: usize,
    pub holding: usize,
    pub mean_winner: f64,
    pub mean_loser: f64,
    pub spread: f64,
    pub months: usize,
    pub generations: usize,
}

/// Summary rows sorted by J then K.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryMatrix {
    rows: Vec<SummaryRow>,
}

impl SummaryMatrix {
    /// Build from sweep results, skipping pairs without a summary.
    pub fn from_results(results: &[JkResult]) -> Self {
        let mut rows: Vec<SummaryRow> = results
            .iter()
            .filter_map(|r| {
                r.summary.map(|s| SummaryRow {
                    serial: 0,
                    formation: r.formation,
                    holding: r.holding,
                    mean_winner: s.mean_winner.value(),
                    mean_loser: s.mean_loser.value(),
                    spread: s.spread.value(),
                    months: s.months,
                    generations: r.generation_count,
                })
            })
            .collect();

        rows.sort_by_key(|r| (r.formation, r.holding));
        for (i, row) in rows.iter_mut().enumerate() {
            row.serial = i + 1;
        }
        Self { rows }
    }

    pub fn rows(&self) -> &[SummaryRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, formation: usize, holding: usize) -> Option<&SummaryRow> {
        self.rows
            .iter()
            .find(|r| r.formation == formation && r.holding == holding)
    }

    /// Row with the largest spread. On ties the earliest row (lowest J, then
    /// K) wins.
    pub fn best(&self) -> Option<&SummaryRow> {
        self.rows.iter().reduce(|best, row| {
            if row.spread.total_cmp(&best.spread).is_gt() {
                row
            } else {
                best
            }
        })
    }
}

/// Round to 4 decimal places for display and export.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use jklab_core::domain::{PercentReturn, ReturnSeries};
    use jklab_core::portfolio::SpreadSummary;

    fn result(formation: usize, holding: usize, spread: Option<f64>) -> JkResult {
        JkResult {
            schema_version: 1,
            run_id: format!("{formation}x{holding}"),
            formation,
            holding,
            gap: 0,
            cutoff: None,
            generation_count: if spread.is_some() { 10 } else { 0 },
            holding_span: None,
            winners: ReturnSeries::new(),
            losers: ReturnSeries::new(),
            rows: Vec::new(),
            summary: spread.map(|s| SpreadSummary {
                mean_winner: PercentReturn(1.0 + s),
                mean_loser: PercentReturn(1.0),
                spread: PercentReturn(s),
                months: 12,
            }),
            dataset_hash: "h".into(),
            is_synthetic: false,
        }
    }

    #[test]
    fn rows_sorted_with_serials_and_empties_skipped() {
        let matrix = SummaryMatrix::from_results(&[
            result(6, 3, Some(0.5)),
            result(3, 6, Some(0.2)),
            result(3, 1, None),
            result(3, 3, Some(0.1)),
        ]);

        let keys: Vec<_> = matrix
            .rows()
            .iter()
            .map(|r| (r.serial, r.formation, r.holding))
            .collect();
        assert_eq!(keys, vec![(1, 3, 3), (2, 3, 6), (3, 6, 3)]);
        assert!(matrix.get(3, 1).is_none());
        assert_eq!(matrix.get(6, 3).unwrap().generations, 10);
    }

    #[test]
    fn best_is_max_spread_first_on_ties() {
        let matrix = SummaryMatrix::from_results(&[
            result(9, 3, Some(0.7)),
            result(3, 3, Some(0.7)),
            result(1, 1, Some(-0.2)),
        ]);
        let best = matrix.best().unwrap();
        assert_eq!((best.formation, best.holding), (3, 3));
    }

    #[test]
    fn empty_matrix_has_no_best() {
        let matrix = SummaryMatrix::from_results(&[result(3, 3, None)]);
        assert!(matrix.is_empty());
        assert!(matrix.best().is_none());
    }

    #[test]
    fn rounding_to_four_places() {
        assert_eq!(round4(1.234_56), 1.2346);
        assert_eq!(round4(-0.000_04), -0.0);
    }
}
