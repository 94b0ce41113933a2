//! A portfolio generation: one formation window, one holding window, and the
//! winner/loser legs ranked at the end of formation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Symbol;

/// Inclusive row-index bounds of a window on the panel's date axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowBounds {
    pub start_idx: usize,
    pub end_idx: usize,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl WindowBounds {
    /// Number of months in the window.
    pub fn months(&self) -> usize {
        self.end_idx + 1 - self.start_idx
    }

    /// Inclusive date containment.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Immutable record produced once per qualifying window position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub formation: WindowBounds,
    pub holding: WindowBounds,
    /// Highest-ranked group, ascending by formation return.
    pub winners: Vec<Symbol>,
    /// Lowest-ranked group, ascending by formation return.
    pub losers: Vec<Symbol>,
    /// Size of the eligible universe this generation was ranked from.
    pub eligible_count: usize,
}

impl Generation {
    pub fn formation_start(&self) -> NaiveDate {
        self.formation.start
    }

    pub fn formation_end(&self) -> NaiveDate {
        self.formation.end
    }

    pub fn holding_start(&self) -> NaiveDate {
        self.holding.start
    }

    pub fn holding_end(&self) -> NaiveDate {
        self.holding.end
    }

    /// Whether the holding window covers `date` (both ends inclusive).
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.holding.contains(date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(start_idx: usize, end_idx: usize, start: (i32, u32), end: (i32, u32)) -> WindowBounds {
        WindowBounds {
            start_idx,
            end_idx,
            start: NaiveDate::from_ymd_opt(start.0, start.1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(end.0, end.1, 1).unwrap(),
        }
    }

    #[test]
    fn holding_window_is_inclusive() {
        let generation = Generation {
            formation: bounds(0, 5, (2020, 1), (2020, 6)),
            holding: bounds(6, 8, (2020, 7), (2020, 9)),
            winners: vec!["A".into()],
            losers: vec!["B".into()],
            eligible_count: 50,
        };

        assert_eq!(generation.formation.months(), 6);
        assert_eq!(generation.holding.months(), 3);
        assert!(generation.is_active_on(NaiveDate::from_ymd_opt(2020, 7, 1).unwrap()));
        assert!(generation.is_active_on(NaiveDate::from_ymd_opt(2020, 9, 1).unwrap()));
        assert!(!generation.is_active_on(NaiveDate::from_ymd_opt(2020, 6, 1).unwrap()));
        assert!(!generation.is_active_on(NaiveDate::from_ymd_opt(2020, 10, 1).unwrap()));
    }
}
