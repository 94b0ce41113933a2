//! Monthly leg aggregation across overlapping generations.
//!
//! On every panel date, each generation whose holding window covers that date
//! contributes the equal-weight mean of its winners and of its losers. The
//! leg's value for the date is the plain mean of those contributions. Dates
//! with no contribution do not appear in the output.

use crate::domain::{AggregatedReturns, Generation, PercentReturn, ReturnPanel};

/// Column indices for one generation's legs, resolved once up front.
///
/// `None` means at least one member symbol is not on the panel; such a leg
/// never contributes.
struct ResolvedLegs<'g> {
    generation: &'g Generation,
    winners: Option<Vec<usize>>,
    losers: Option<Vec<usize>>,
}

fn resolve(panel: &ReturnPanel, symbols: &[String]) -> Option<Vec<usize>> {
    if symbols.is_empty() {
        return None;
    }
    symbols.iter().map(|s| panel.symbol_index(s)).collect()
}

/// Equal-weight mean of `cols` on `row`. Requires every member's value.
fn leg_mean(panel: &ReturnPanel, row: usize, cols: &[usize]) -> Option<f64> {
    let mut sum = 0.0;
    for &col in cols {
        sum += panel.value(row, col)?.value();
    }
    Some(sum / cols.len() as f64)
}

#[derive(Default)]
struct Accumulator {
    sum: f64,
    count: usize,
}

impl Accumulator {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> Option<PercentReturn> {
        (self.count > 0).then(|| PercentReturn(self.sum / self.count as f64))
    }
}

/// Average active generations' leg means per panel date.
pub fn aggregate(panel: &ReturnPanel, generations: &[Generation]) -> AggregatedReturns {
    let resolved: Vec<ResolvedLegs<'_>> = generations
        .iter()
        .map(|generation| ResolvedLegs {
            generation,
            winners: resolve(panel, &generation.winners),
            losers: resolve(panel, &generation.losers),
        })
        .collect();

    let mut out = AggregatedReturns::default();

    for (row, &date) in panel.dates().iter().enumerate() {
        let mut winners = Accumulator::default();
        let mut losers = Accumulator::default();

        for legs in resolved.iter().filter(|l| l.generation.is_active_on(date)) {
            if let Some(m) = legs.winners.as_deref().and_then(|c| leg_mean(panel, row, c)) {
                winners.push(m);
            }
            if let Some(m) = legs.losers.as_deref().and_then(|c| leg_mean(panel, row, c)) {
                losers.push(m);
            }
        }

        if let Some(m) = winners.mean() {
            out.winners.insert(date, m);
        }
        if let Some(m) = losers.mean() {
            out.losers.insert(date, m);
        }
    }

    tracing::debug!(
        generations = generations.len(),
        winner_months = out.winners.len(),
        loser_months = out.losers.len(),
        "legs aggregated"
    );

    out
}
