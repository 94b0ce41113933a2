//! Panel and benchmark loading for the runner.
//!
//! Panels come from a wide CSV (a `Date` column plus one percent-return
//! column per stock) or from the synthetic generator. Resolution policy for
//! a CSV panel:
//! 1. If caching is on and the Parquet cache has the key → use it
//! 2. Otherwise parse the CSV and (if caching is on) store the result
//!
//! Synthetic panels are a developer mode. Results built on them are tagged.

use chrono::{NaiveDate, NaiveDateTime};
use jklab_core::domain::{
    BenchmarkError, BenchmarkPoint, BenchmarkSeries, DecimalReturn, PanelError, ReturnPanel,
};
use jklab_core::fingerprint::DatasetHash;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::panel_cache::{CacheError, PanelCache};
use crate::synthetic::{generate_synthetic_panel, SyntheticConfig};

/// Cell values read as "no observation".
const MISSING_TOKENS: [&str; 5] = ["", "na", "nan", "null", "-"];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d-%m-%Y", "%m/%d/%Y", "%Y/%m/%d"];
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Benchmark return column, matched case-insensitively.
const BENCHMARK_COLUMN: &str = "return decimal";

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{path}: no 'Date' column")]
    MissingDateColumn { path: PathBuf },

    #[error("{path}: unparseable date '{value}' on line {line}")]
    BadDate {
        path: PathBuf,
        line: usize,
        value: String,
    },

    #[error("{path}: no numeric return columns")]
    NoNumericColumns { path: PathBuf },

    #[error("no observations between {start} and {end}")]
    EmptyAfterFilter { start: NaiveDate, end: NaiveDate },

    #[error("invalid panel: {0}")]
    Panel(#[from] PanelError),

    #[error("invalid benchmark: {0}")]
    Benchmark(#[from] BenchmarkError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Options controlling how a panel is loaded.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// First date kept (inclusive).
    pub start: NaiveDate,
    /// Last date kept (inclusive).
    pub end: NaiveDate,
    /// Skip the cache read and rewrite the entry.
    pub force: bool,
    /// Read from and write to the Parquet cache.
    pub use_cache: bool,
}

/// Where a loaded panel came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    Csv,
    Cache,
    Synthetic,
}

/// A loaded panel plus provenance.
#[derive(Debug, Clone)]
pub struct LoadedPanel {
    pub panel: ReturnPanel,
    pub source: DataSource,
    /// BLAKE3 over every date, symbol and cell.
    pub dataset_hash: DatasetHash,
    pub is_synthetic: bool,
}

impl LoadedPanel {
    fn new(panel: ReturnPanel, source: DataSource) -> Self {
        Self {
            dataset_hash: DatasetHash::of_panel(&panel),
            is_synthetic: source == DataSource::Synthetic,
            panel,
            source,
        }
    }
}

/// Load a CSV panel, going through the Parquet cache when enabled.
pub fn load_panel(
    path: &Path,
    cache: &PanelCache,
    opts: &LoadOptions,
) -> Result<LoadedPanel, LoadError> {
    let key = if opts.use_cache {
        Some(PanelCache::key_for(path, opts.start, opts.end)?)
    } else {
        None
    };

    if let (Some(key), false) = (&key, opts.force) {
        if let Some(panel) = cache.load(key)? {
            return Ok(LoadedPanel::new(panel, DataSource::Cache));
        }
    }

    let panel = read_panel_csv(path, opts.start, opts.end)?;

    if let Some(key) = &key {
        if let Err(e) = cache.write(key, &panel, path, opts.start, opts.end) {
            tracing::warn!(error = %e, "could not cache panel; continuing without cache");
        }
    }

    Ok(LoadedPanel::new(panel, DataSource::Csv))
}

/// Generate a synthetic panel and restrict it to the requested range.
pub fn load_synthetic(config: &SyntheticConfig, opts: &LoadOptions) -> Result<LoadedPanel, LoadError> {
    tracing::warn!(
        symbols = config.n_symbols,
        months = config.n_months,
        "generating synthetic panel; results will be tagged as synthetic"
    );
    let panel = generate_synthetic_panel(config)?.slice_dates(opts.start, opts.end);
    if panel.is_empty() {
        return Err(LoadError::EmptyAfterFilter {
            start: opts.start,
            end: opts.end,
        });
    }
    Ok(LoadedPanel::new(panel, DataSource::Synthetic))
}

/// Parse a date cell in any of the accepted formats.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
                .ok()
                .map(|dt| dt.date())
        })
}

/// `Ok(None)` for a missing token, `Err(())` for a non-numeric cell.
fn parse_cell(s: &str) -> Result<Option<f64>, ()> {
    let s = s.trim();
    if MISSING_TOKENS.iter().any(|t| s.eq_ignore_ascii_case(t)) {
        return Ok(None);
    }
    s.parse::<f64>().map(Some).map_err(|_| ())
}

/// Header + rows of a CSV file with a parsed date per row.
struct DatedTable {
    headers: Vec<String>,
    date_col: usize,
    rows: Vec<(NaiveDate, csv::StringRecord)>,
}

fn read_dated_table(path: &Path) -> Result<DatedTable, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
    let date_col = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case("date"))
        .ok_or_else(|| LoadError::MissingDateColumn {
            path: path.to_path_buf(),
        })?;

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let raw = record.get(date_col).unwrap_or_default();
        let date = parse_date(raw).ok_or_else(|| LoadError::BadDate {
            path: path.to_path_buf(),
            line: i + 2,
            value: raw.to_string(),
        })?;
        rows.push((date, record));
    }
    // Stable: duplicate dates stay adjacent and are rejected by the panel.
    rows.sort_by_key(|(date, _)| *date);

    Ok(DatedTable {
        headers,
        date_col,
        rows,
    })
}

/// Parse column `col` across every row, or `None` if it is not numeric.
fn numeric_column(table: &DatedTable, col: usize) -> Option<Vec<Option<f64>>> {
    let values = table
        .rows
        .iter()
        .map(|(_, record)| parse_cell(record.get(col).unwrap_or_default()))
        .collect::<Result<Vec<_>, ()>>()
        .ok()?;
    values.iter().any(Option::is_some).then_some(values)
}

/// Read a wide CSV of monthly percent returns and keep `[start, end]`.
pub fn read_panel_csv(
    path: &Path,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<ReturnPanel, LoadError> {
    let table = read_dated_table(path)?;

    let mut columns = Vec::new();
    for (col, header) in table.headers.iter().enumerate() {
        if col == table.date_col {
            continue;
        }
        match numeric_column(&table, col) {
            Some(values) => columns.push((header.clone(), values)),
            None => tracing::warn!(column = %header, "dropping non-numeric column"),
        }
    }
    if columns.is_empty() {
        return Err(LoadError::NoNumericColumns {
            path: path.to_path_buf(),
        });
    }

    let keep: Vec<usize> = table
        .rows
        .iter()
        .enumerate()
        .filter(|(_, (date, _))| *date >= start && *date <= end)
        .map(|(i, _)| i)
        .collect();
    if keep.is_empty() {
        return Err(LoadError::EmptyAfterFilter { start, end });
    }

    let dates = keep.iter().map(|&i| table.rows[i].0).collect();
    let columns = columns
        .into_iter()
        .map(|(symbol, values)| (symbol, keep.iter().map(|&i| values[i]).collect()))
        .collect();

    let panel = ReturnPanel::from_columns(dates, columns)?;
    tracing::info!(
        path = %path.display(),
        rows = panel.len(),
        symbols = panel.symbol_count(),
        missing = panel.missing_count(),
        "panel loaded"
    );
    Ok(panel)
}

/// Read a benchmark CSV of monthly decimal returns and keep `[start, end]`.
///
/// Uses the `Return decimal` column when present, otherwise the first
/// numeric column. Rows with a missing return are skipped.
pub fn read_benchmark_csv(
    path: &Path,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<BenchmarkSeries, LoadError> {
    let table = read_dated_table(path)?;

    let named = table
        .headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(BENCHMARK_COLUMN))
        .and_then(|col| numeric_column(&table, col));
    let values = match named {
        Some(values) => values,
        None => (0..table.headers.len())
            .filter(|&col| col != table.date_col)
            .find_map(|col| numeric_column(&table, col))
            .ok_or_else(|| LoadError::NoNumericColumns {
                path: path.to_path_buf(),
            })?,
    };

    let points: Vec<BenchmarkPoint> = table
        .rows
        .iter()
        .zip(values)
        .filter(|((date, _), _)| *date >= start && *date <= end)
        .filter_map(|((date, _), value)| {
            value.map(|v| BenchmarkPoint {
                date: *date,
                ret: DecimalReturn(v),
            })
        })
        .collect();
    if points.is_empty() {
        return Err(LoadError::EmptyAfterFilter { start, end });
    }

    Ok(BenchmarkSeries::new(points)?)
}
