//! Sparse date-indexed return series produced by aggregation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::returns::{mean_percent, PercentReturn};

/// Percent returns keyed by date. Dates with no contribution are absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnSeries {
    points: BTreeMap<NaiveDate, PercentReturn>,
}

impl ReturnSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, date: NaiveDate, value: PercentReturn) {
        self.points.insert(date, value);
    }

    pub fn get(&self, date: NaiveDate) -> Option<PercentReturn> {
        self.points.get(&date).copied()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.points.contains_key(&date)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterate in ascending date order.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, PercentReturn)> + '_ {
        self.points.iter().map(|(d, r)| (*d, *r))
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.points.keys().copied()
    }

    /// Mean over every recorded date.
    pub fn mean(&self) -> Option<PercentReturn> {
        mean_percent(self.points.values().copied())
    }
}

impl FromIterator<(NaiveDate, PercentReturn)> for ReturnSeries {
    fn from_iter<I: IntoIterator<Item = (NaiveDate, PercentReturn)>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

/// Winner and loser leg series for one (J, K) run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedReturns {
    pub winners: ReturnSeries,
    pub losers: ReturnSeries,
}
