//! Formation-period scoring and decile partitioning.
//!
//! Ranking uses a total order: cumulative formation return first
//! (`f64::total_cmp`), then symbol identifier. Equal returns therefore always
//! land in the same group for the same inputs.

use std::cmp::Ordering;
use std::ops::Range;

use crate::domain::ReturnPanel;

/// One eligible stock's score for a formation window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormationScore<'a> {
    pub symbol: &'a str,
    pub col: usize,
    /// Compounded return over the window as a decimal fraction.
    pub formation_return: f64,
}

impl FormationScore<'_> {
    fn rank_cmp(&self, other: &Self) -> Ordering {
        self.formation_return
            .total_cmp(&other.formation_return)
            .then_with(|| self.symbol.cmp(other.symbol))
    }
}

/// Compounded return over `rows`: `prod(1 + r/100) - 1`.
///
/// Missing months are skipped; callers only score complete columns.
pub fn cumulative_return(panel: &ReturnPanel, col: usize, rows: Range<usize>) -> f64 {
    rows.filter_map(|row| panel.value(row, col))
        .map(|r| r.growth())
        .product::<f64>()
        - 1.0
}

/// Keep the `universe` best scores, order them ascending and split them into
/// `groups` equal buckets. Bucket 0 is the weakest, the last bucket the
/// strongest.
///
/// Returns an empty vector when fewer than `universe` scores are supplied or
/// when `universe` does not split evenly into `groups`.
pub fn partition_into_groups<'a>(
    mut scores: Vec<FormationScore<'a>>,
    universe: usize,
    groups: usize,
) -> Vec<Vec<FormationScore<'a>>> {
    if groups == 0 || universe == 0 || universe % groups != 0 || scores.len() < universe {
        return Vec::new();
    }

    scores.sort_by(|a, b| a.rank_cmp(b));
    let top = scores.split_off(scores.len() - universe);

    top.chunks(universe / groups).map(|c| c.to_vec()).collect()
}
