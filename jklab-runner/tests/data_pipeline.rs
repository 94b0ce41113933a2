//! Integration tests for the runner's data pipeline.
//!
//! CSV panels go through the Parquet cache; synthetic panels never touch it.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDate;
use jklab_core::domain::PercentReturn;
use jklab_runner::data_loader::{load_panel, load_synthetic, read_benchmark_csv, LoadOptions};
use jklab_runner::{DataSource, LoadError, PanelCache, SyntheticConfig};

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_cache_dir() -> PathBuf {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!(
        "jklab_runner_pipeline_{}_{id}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn opts(use_cache: bool, force: bool) -> LoadOptions {
    LoadOptions {
        start: d(2020, 1, 1),
        end: d(2020, 12, 31),
        force,
        use_cache,
    }
}

/// Three stocks, four months, one missing cell, one row outside 2020.
fn write_panel(dir: &Path) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join("panel.csv");
    std::fs::write(
        &path,
        "Date,AAA,BBB,CCC\n\
         2020-01-31,1.5,-2.0,0.25\n\
         2020-02-29,NA,3.0,-1.0\n\
         2020-03-31,0.5,0.0,4.0\n\
         2021-01-31,9.0,9.0,9.0\n",
    )
    .unwrap();
    path
}

#[test]
fn csv_panel_is_cached_then_served_from_cache() {
    let cache_dir = temp_cache_dir();
    let csv = write_panel(&cache_dir.join("input"));
    let cache = PanelCache::new(cache_dir.join("cache"));

    let first = load_panel(&csv, &cache, &opts(true, false)).unwrap();
    assert_eq!(first.source, DataSource::Csv);
    assert_eq!(first.panel.len(), 3);
    assert_eq!(cache.len().unwrap(), 1);

    let second = load_panel(&csv, &cache, &opts(true, false)).unwrap();
    assert_eq!(second.source, DataSource::Cache);
    assert_eq!(second.dataset_hash, first.dataset_hash);

    // Missing cells survive the Parquet round trip.
    let aaa = second.panel.symbol_index("AAA").unwrap();
    let bbb = second.panel.symbol_index("BBB").unwrap();
    assert_eq!(second.panel.value(1, aaa), None);
    assert_eq!(second.panel.value(1, bbb), Some(PercentReturn(3.0)));
    assert_eq!(second.panel.missing_count(), 1);

    let _ = std::fs::remove_dir_all(&cache_dir);
}

#[test]
fn cache_disabled_never_writes() {
    let cache_dir = temp_cache_dir();
    let csv = write_panel(&cache_dir.join("input"));
    let cache = PanelCache::new(cache_dir.join("cache"));

    let loaded = load_panel(&csv, &cache, &opts(false, false)).unwrap();
    assert_eq!(loaded.source, DataSource::Csv);
    assert!(cache.is_empty().unwrap());

    let _ = std::fs::remove_dir_all(&cache_dir);
}

#[test]
fn force_bypasses_cache_read() {
    let cache_dir = temp_cache_dir();
    let csv = write_panel(&cache_dir.join("input"));
    let cache = PanelCache::new(cache_dir.join("cache"));

    load_panel(&csv, &cache, &opts(true, false)).unwrap();
    let forced = load_panel(&csv, &cache, &opts(true, true)).unwrap();
    assert_eq!(forced.source, DataSource::Csv);
    assert_eq!(cache.len().unwrap(), 1);

    let _ = std::fs::remove_dir_all(&cache_dir);
}

#[test]
fn corrupt_cache_entry_falls_back_to_csv() {
    let cache_dir = temp_cache_dir();
    let csv = write_panel(&cache_dir.join("input"));
    let cache = PanelCache::new(cache_dir.join("cache"));
    load_panel(&csv, &cache, &opts(true, false)).unwrap();

    let key = PanelCache::key_for(&csv, d(2020, 1, 1), d(2020, 12, 31)).unwrap();
    let parquet = cache_dir
        .join("cache")
        .join(format!("panel={key}"))
        .join("panel.parquet");
    std::fs::write(&parquet, b"not parquet").unwrap();

    let loaded = load_panel(&csv, &cache, &opts(true, false)).unwrap();
    assert_eq!(loaded.source, DataSource::Csv);
    assert_eq!(loaded.panel.len(), 3);

    let _ = std::fs::remove_dir_all(&cache_dir);
}

#[test]
fn range_with_no_rows_is_an_error() {
    let cache_dir = temp_cache_dir();
    let csv = write_panel(&cache_dir.join("input"));
    let cache = PanelCache::new(cache_dir.join("cache"));
    let opts = LoadOptions {
        start: d(2030, 1, 1),
        end: d(2030, 12, 31),
        force: false,
        use_cache: false,
    };

    let err = load_panel(&csv, &cache, &opts).unwrap_err();
    assert!(matches!(err, LoadError::EmptyAfterFilter { .. }));

    let _ = std::fs::remove_dir_all(&cache_dir);
}

#[test]
fn synthetic_panel_is_sliced_and_tagged() {
    let config = SyntheticConfig {
        n_symbols: 20,
        n_months: 36,
        start: d(2019, 1, 31),
        ..SyntheticConfig::default()
    };

    let loaded = load_synthetic(&config, &opts(true, false)).unwrap();
    assert_eq!(loaded.source, DataSource::Synthetic);
    assert!(loaded.is_synthetic);
    assert_eq!(loaded.panel.len(), 12);
    assert_eq!(loaded.panel.symbol_count(), 20);
}

#[test]
fn benchmark_uses_return_decimal_column() {
    let dir = temp_cache_dir();
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("bench.csv");
    std::fs::write(
        &path,
        "Date,Price,Return decimal\n\
         2020-01-31,100,0.01\n\
         2020-02-29,98,\n\
         2020-03-31,101,-0.02\n",
    )
    .unwrap();

    let series = read_benchmark_csv(&path, d(2020, 1, 1), d(2020, 12, 31)).unwrap();
    assert_eq!(series.len(), 2);
    assert_eq!(series.get(d(2020, 3, 31)).map(|r| r.value()), Some(-0.02));
    assert!(series.get(d(2020, 2, 29)).is_none());

    let _ = std::fs::remove_dir_all(&dir);
}
