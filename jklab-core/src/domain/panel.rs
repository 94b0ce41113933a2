//! Monthly return panel: a common date axis with one (possibly missing)
//! percent return per symbol per date.

use chrono::NaiveDate;
use std::collections::HashSet;
use std::ops::Range;
use thiserror::Error;

use super::returns::PercentReturn;
use super::Symbol;

/// Invariant violations detected while building a [`ReturnPanel`].
#[derive(Debug, Error, PartialEq)]
pub enum PanelError {
    #[error("panel has no symbols")]
    NoSymbols,

    #[error("duplicate symbol '{0}'")]
    DuplicateSymbol(Symbol),

    #[error("{dates} dates but {rows} rows")]
    RowCountMismatch { dates: usize, rows: usize },

    #[error("row {row} has {actual} values, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("column '{symbol}' has {actual} values, expected {expected}")]
    ColumnLength {
        symbol: Symbol,
        expected: usize,
        actual: usize,
    },

    #[error("dates must be strictly increasing: {previous} followed by {current} at row {row}")]
    UnorderedDates {
        row: usize,
        previous: NaiveDate,
        current: NaiveDate,
    },

    #[error("non-finite return for '{symbol}' on {date}")]
    NonFiniteValue { date: NaiveDate, symbol: Symbol },
}

/// A read-only, date-sorted panel of monthly percent returns.
///
/// Row `i` holds the observation for `dates()[i]`; within a row, slot `j`
/// belongs to `symbols()[j]`. `None` marks a missing return.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnPanel {
    dates: Vec<NaiveDate>,
    symbols: Vec<Symbol>,
    rows: Vec<Vec<Option<PercentReturn>>>,
}

impl ReturnPanel {
    /// Build a panel from row-major data, validating every invariant.
    pub fn new(
        dates: Vec<NaiveDate>,
        symbols: Vec<Symbol>,
        rows: Vec<Vec<Option<PercentReturn>>>,
    ) -> Result<Self, PanelError> {
        if symbols.is_empty() {
            return Err(PanelError::NoSymbols);
        }

        let mut seen = HashSet::with_capacity(symbols.len());
        for symbol in &symbols {
            if !seen.insert(symbol.as_str()) {
                return Err(PanelError::DuplicateSymbol(symbol.clone()));
            }
        }

        if dates.len() != rows.len() {
            return Err(PanelError::RowCountMismatch {
                dates: dates.len(),
                rows: rows.len(),
            });
        }

        for (row, pair) in dates.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(PanelError::UnorderedDates {
                    row: row + 1,
                    previous: pair[0],
                    current: pair[1],
                });
            }
        }

        for (row_idx, row) in rows.iter().enumerate() {
            if row.len() != symbols.len() {
                return Err(PanelError::RowWidth {
                    row: row_idx,
                    expected: symbols.len(),
                    actual: row.len(),
                });
            }
            for (col, value) in row.iter().enumerate() {
                if let Some(v) = value {
                    if !v.is_finite() {
                        return Err(PanelError::NonFiniteValue {
                            date: dates[row_idx],
                            symbol: symbols[col].clone(),
                        });
                    }
                }
            }
        }

        Ok(Self {
            dates,
            symbols,
            rows,
        })
    }

    /// Build a panel from column-major data: one `(symbol, values)` pair per
    /// stock, each `values` aligned with `dates`. Non-finite values are
    /// treated as missing.
    pub fn from_columns(
        dates: Vec<NaiveDate>,
        columns: Vec<(Symbol, Vec<Option<f64>>)>,
    ) -> Result<Self, PanelError> {
        let mut rows: Vec<Vec<Option<PercentReturn>>> =
            (0..dates.len()).map(|_| Vec::with_capacity(columns.len())).collect();
        let mut symbols = Vec::with_capacity(columns.len());

        for (symbol, values) in columns {
            if values.len() != dates.len() {
                return Err(PanelError::ColumnLength {
                    symbol,
                    expected: dates.len(),
                    actual: values.len(),
                });
            }
            for (row, value) in rows.iter_mut().zip(values) {
                row.push(value.filter(|v| v.is_finite()).map(PercentReturn));
            }
            symbols.push(symbol);
        }

        Self::new(dates, symbols, rows)
    }

    /// Number of dates (rows).
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    pub fn date(&self, row: usize) -> NaiveDate {
        self.dates[row]
    }

    pub fn row(&self, row: usize) -> &[Option<PercentReturn>] {
        &self.rows[row]
    }

    pub fn value(&self, row: usize, col: usize) -> Option<PercentReturn> {
        self.rows[row][col]
    }

    /// Column index of a symbol.
    pub fn symbol_index(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }

    /// Row index of a date, if the date is on the panel's axis.
    pub fn date_index(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }

    /// First and last date, or `None` for an empty panel.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((*self.dates.first()?, *self.dates.last()?))
    }

    /// True when `col` has a value on every row of `rows`.
    pub fn is_complete(&self, col: usize, rows: Range<usize>) -> bool {
        self.rows[rows].iter().all(|row| row[col].is_some())
    }

    /// Number of missing cells across the whole panel.
    pub fn missing_count(&self) -> usize {
        self.rows
            .iter()
            .map(|row| row.iter().filter(|v| v.is_none()).count())
            .sum()
    }

    /// A new panel restricted to rows with `start <= date <= end`.
    pub fn slice_dates(&self, start: NaiveDate, end: NaiveDate) -> Self {
        let keep: Vec<usize> = self
            .dates
            .iter()
            .enumerate()
            .filter(|(_, d)| **d >= start && **d <= end)
            .map(|(i, _)| i)
            .collect();

        Self {
            dates: keep.iter().map(|&i| self.dates[i]).collect(),
            symbols: self.symbols.clone(),
            rows: keep.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn p(v: f64) -> Option<PercentReturn> {
        Some(PercentReturn(v))
    }

    fn small_panel() -> ReturnPanel {
        ReturnPanel::new(
            vec![d(2020, 1), d(2020, 2), d(2020, 3)],
            vec!["AAA".into(), "BBB".into()],
            vec![vec![p(1.0), p(2.0)], vec![p(-1.0), None], vec![p(0.5), p(3.0)]],
        )
        .unwrap()
    }

    #[test]
    fn accessors() {
        let panel = small_panel();
        assert_eq!(panel.len(), 3);
        assert_eq!(panel.symbol_count(), 2);
        assert_eq!(panel.value(1, 0), p(-1.0));
        assert_eq!(panel.value(1, 1), None);
        assert_eq!(panel.symbol_index("BBB"), Some(1));
        assert_eq!(panel.date_index(d(2020, 3)), Some(2));
        assert_eq!(panel.date_index(d(2021, 3)), None);
        assert_eq!(panel.date_range(), Some((d(2020, 1), d(2020, 3))));
        assert_eq!(panel.missing_count(), 1);
    }

    #[test]
    fn completeness_over_a_row_range() {
        let panel = small_panel();
        assert!(panel.is_complete(0, 0..3));
        assert!(!panel.is_complete(1, 0..3));
        assert!(panel.is_complete(1, 2..3));
    }

    #[test]
    fn rejects_unordered_dates() {
        let err = ReturnPanel::new(
            vec![d(2020, 2), d(2020, 1)],
            vec!["AAA".into()],
            vec![vec![p(1.0)], vec![p(1.0)]],
        )
        .unwrap_err();
        assert!(matches!(err, PanelError::UnorderedDates { row: 1, .. }));
    }

    #[test]
    fn rejects_duplicate_dates() {
        let err = ReturnPanel::new(
            vec![d(2020, 1), d(2020, 1)],
            vec!["AAA".into()],
            vec![vec![p(1.0)], vec![p(1.0)]],
        )
        .unwrap_err();
        assert!(matches!(err, PanelError::UnorderedDates { .. }));
    }

    #[test]
    fn rejects_ragged_rows() {
        let err = ReturnPanel::new(
            vec![d(2020, 1)],
            vec!["AAA".into(), "BBB".into()],
            vec![vec![p(1.0)]],
        )
        .unwrap_err();
        assert_eq!(
            err,
            PanelError::RowWidth {
                row: 0,
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn rejects_duplicate_symbols_and_empty_universe() {
        let err = ReturnPanel::new(vec![], vec!["A".into(), "A".into()], vec![]).unwrap_err();
        assert_eq!(err, PanelError::DuplicateSymbol("A".into()));

        let err = ReturnPanel::new(vec![], vec![], vec![]).unwrap_err();
        assert_eq!(err, PanelError::NoSymbols);
    }

    #[test]
    fn rejects_non_finite_values() {
        let err = ReturnPanel::new(
            vec![d(2020, 1)],
            vec!["AAA".into()],
            vec![vec![p(f64::INFINITY)]],
        )
        .unwrap_err();
        assert!(matches!(err, PanelError::NonFiniteValue { .. }));
    }

    #[test]
    fn from_columns_treats_nan_as_missing() {
        let panel = ReturnPanel::from_columns(
            vec![d(2020, 1), d(2020, 2)],
            vec![
                ("AAA".into(), vec![Some(1.0), Some(f64::NAN)]),
                ("BBB".into(), vec![None, Some(2.0)]),
            ],
        )
        .unwrap();
        assert_eq!(panel.value(1, 0), None);
        assert_eq!(panel.value(0, 1), None);
        assert_eq!(panel.value(1, 1), p(2.0));
    }

    #[test]
    fn slice_is_inclusive() {
        let panel = small_panel();
        let sliced = panel.slice_dates(d(2020, 2), d(2020, 3));
        assert_eq!(sliced.dates(), &[d(2020, 2), d(2020, 3)]);
        assert_eq!(sliced.value(0, 0), p(-1.0));
        assert_eq!(sliced.symbols(), panel.symbols());
    }
}
