//! Parquet cache for parsed return panels.
//!
//! Layout: `{cache_dir}/panel={KEY}/panel.parquet` + `meta.json`
//!
//! - KEY = BLAKE3 over (canonical source path, file length, mtime, start, end),
//!   so editing the source file or changing the range is a miss
//! - Wide frame: a `date` column plus one nullable f64 column per symbol
//! - Atomic writes (write to .tmp, rename into place)
//! - Corrupt files are quarantined (`panel.parquet.quarantined`) and read as a miss

use chrono::NaiveDate;
use jklab_core::domain::{PanelError, ReturnPanel};
use jklab_core::fingerprint::DatasetHash;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use thiserror::Error;

const DATE_COLUMN: &str = "date";
const PANEL_FILE: &str = "panel.parquet";
const META_FILE: &str = "meta.json";
const ENTRY_PREFIX: &str = "panel=";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parquet error: {0}")]
    Parquet(String),

    #[error("cache metadata error: {0}")]
    Meta(#[from] serde_json::Error),

    #[error("cache validation failed: {0}")]
    Validation(String),

    #[error("cached panel is invalid: {0}")]
    Panel(#[from] PanelError),
}

/// Metadata sidecar for one cached panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelCacheMeta {
    pub key: String,
    pub source: PathBuf,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub rows: usize,
    pub symbols: usize,
    pub dataset_hash: String,
    pub cached_at: chrono::NaiveDateTime,
}

/// Status of one cache entry, as reported by `jklab cache status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntryStatus {
    pub key: String,
    pub meta: Option<PanelCacheMeta>,
    pub size_bytes: u64,
    pub quarantined: bool,
}

/// The panel cache.
#[derive(Debug, Clone)]
pub struct PanelCache {
    cache_dir: PathBuf,
}

impl PanelCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Cache key for a source file and date range.
    pub fn key_for(source: &Path, start: NaiveDate, end: NaiveDate) -> Result<String, CacheError> {
        let canonical = fs::canonicalize(source)?;
        let metadata = fs::metadata(&canonical)?;
        let modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos())
            .unwrap_or(0);

        let mut hasher = blake3::Hasher::new();
        hasher.update(canonical.to_string_lossy().as_bytes());
        hasher.update(&metadata.len().to_le_bytes());
        hasher.update(&modified.to_le_bytes());
        hasher.update(start.to_string().as_bytes());
        hasher.update(end.to_string().as_bytes());
        Ok(hasher.finalize().to_hex().to_string())
    }

    fn entry_dir(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{ENTRY_PREFIX}{key}"))
    }

    fn panel_path(&self, key: &str) -> PathBuf {
        self.entry_dir(key).join(PANEL_FILE)
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.entry_dir(key).join(META_FILE)
    }

    /// Store a panel under `key`. Writes are atomic per file.
    pub fn write(
        &self,
        key: &str,
        panel: &ReturnPanel,
        source: &Path,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PanelCacheMeta, CacheError> {
        if panel.is_empty() {
            return Err(CacheError::Validation("no rows to cache".into()));
        }

        let dir = self.entry_dir(key);
        fs::create_dir_all(&dir)?;

        let mut df = panel_to_dataframe(panel)?;
        let path = self.panel_path(key);
        let tmp_path = path.with_extension("parquet.tmp");
        write_parquet(&mut df, &tmp_path)?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            CacheError::Io(e)
        })?;

        let meta = PanelCacheMeta {
            key: key.to_string(),
            source: source.to_path_buf(),
            start,
            end,
            rows: panel.len(),
            symbols: panel.symbol_count(),
            dataset_hash: DatasetHash::of_panel(panel).0,
            cached_at: chrono::Local::now().naive_local(),
        };
        let meta_path = self.meta_path(key);
        let meta_tmp = meta_path.with_extension("json.tmp");
        fs::write(&meta_tmp, serde_json::to_string_pretty(&meta)?)?;
        fs::rename(&meta_tmp, &meta_path)?;

        tracing::debug!(key, rows = meta.rows, symbols = meta.symbols, "panel cached");
        Ok(meta)
    }

    /// Load the panel stored under `key`.
    ///
    /// `Ok(None)` on a miss, including when the stored file was corrupt and
    /// has just been quarantined.
    pub fn load(&self, key: &str) -> Result<Option<ReturnPanel>, CacheError> {
        let path = self.panel_path(key);
        if !path.exists() {
            return Ok(None);
        }

        match read_parquet(&path).and_then(|df| dataframe_to_panel(&df)) {
            Ok(panel) => {
                tracing::debug!(key, rows = panel.len(), "panel cache hit");
                Ok(Some(panel))
            }
            Err(e) => {
                let quarantine = path.with_extension("parquet.quarantined");
                tracing::warn!(path = %path.display(), error = %e, "quarantining corrupt cache file");
                fs::rename(&path, &quarantine)?;
                Ok(None)
            }
        }
    }

    pub fn get_meta(&self, key: &str) -> Option<PanelCacheMeta> {
        let content = fs::read_to_string(self.meta_path(key)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Keys of every entry directory, sorted.
    fn keys(&self) -> Result<Vec<String>, CacheError> {
        if !self.cache_dir.exists() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.cache_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            if let Some(key) = name.to_str().and_then(|n| n.strip_prefix(ENTRY_PREFIX)) {
                keys.push(key.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }

    pub fn status(&self) -> Result<Vec<CacheEntryStatus>, CacheError> {
        self.keys()?
            .into_iter()
            .map(|key| {
                let dir = self.entry_dir(&key);
                let mut size_bytes = 0;
                let mut quarantined = false;
                for entry in fs::read_dir(&dir)? {
                    let entry = entry?;
                    size_bytes += entry.metadata()?.len();
                    if entry.file_name().to_string_lossy().ends_with(".quarantined") {
                        quarantined = true;
                    }
                }
                Ok(CacheEntryStatus {
                    meta: self.get_meta(&key),
                    key,
                    size_bytes,
                    quarantined,
                })
            })
            .collect()
    }

    /// Number of entries holding a readable-looking panel file.
    pub fn len(&self) -> Result<usize, CacheError> {
        Ok(self
            .keys()?
            .iter()
            .filter(|k| self.panel_path(k).exists())
            .count())
    }

    pub fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }

    /// Delete one entry. Returns whether it existed.
    pub fn remove(&self, key: &str) -> Result<bool, CacheError> {
        let dir = self.entry_dir(key);
        if !dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(dir)?;
        Ok(true)
    }

    /// Delete every entry. Returns how many were removed.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let keys = self.keys()?;
        for key in &keys {
            fs::remove_dir_all(self.entry_dir(key))?;
        }
        Ok(keys.len())
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

fn panel_to_dataframe(panel: &ReturnPanel) -> Result<DataFrame, CacheError> {
    let dates: Vec<i32> = panel
        .dates()
        .iter()
        .map(|d| (*d - epoch()).num_days() as i32)
        .collect();

    let mut columns = Vec::with_capacity(panel.symbol_count() + 1);
    columns.push(
        Column::new(DATE_COLUMN.into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| CacheError::Parquet(format!("date cast: {e}")))?,
    );

    for (col, symbol) in panel.symbols().iter().enumerate() {
        if symbol == DATE_COLUMN {
            return Err(CacheError::Validation(format!(
                "symbol '{symbol}' collides with the date column"
            )));
        }
        let values: Vec<Option<f64>> = (0..panel.len())
            .map(|row| panel.value(row, col).map(|v| v.value()))
            .collect();
        columns.push(Column::new(symbol.as_str().into(), values));
    }

    DataFrame::new(columns).map_err(|e| CacheError::Parquet(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), CacheError> {
    let file = fs::File::create(path)?;
    ParquetWriter::new(file)
        .finish(df)
        .map_err(|e| CacheError::Parquet(format!("write parquet: {e}")))?;
    Ok(())
}

fn read_parquet(path: &Path) -> Result<DataFrame, CacheError> {
    let file = fs::File::open(path)?;
    ParquetReader::new(file)
        .finish()
        .map_err(|e| CacheError::Parquet(format!("read: {e}")))
}

fn dataframe_to_panel(df: &DataFrame) -> Result<ReturnPanel, CacheError> {
    if df.height() == 0 {
        return Err(CacheError::Validation("empty parquet file".into()));
    }

    let date_ca = df
        .column(DATE_COLUMN)
        .map_err(|e| CacheError::Validation(format!("missing column '{DATE_COLUMN}': {e}")))?
        .date()
        .map_err(|e| CacheError::Parquet(format!("date column type: {e}")))?;

    let dates = (0..df.height())
        .map(|i| {
            date_ca
                .get(i)
                .map(|days| epoch() + chrono::Duration::days(days as i64))
                .ok_or_else(|| CacheError::Validation(format!("null date at row {i}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut columns = Vec::with_capacity(df.width().saturating_sub(1));
    for column in df.get_columns() {
        let name = column.name().as_str();
        if name == DATE_COLUMN {
            continue;
        }
        let ca = column
            .f64()
            .map_err(|e| CacheError::Parquet(format!("column '{name}' type: {e}")))?;
        let values: Vec<Option<f64>> = (0..df.height()).map(|i| ca.get(i)).collect();
        columns.push((name.to_string(), values));
    }

    Ok(ReturnPanel::from_columns(dates, columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jklab_core::domain::PercentReturn;
    use std::env;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_cache_dir() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = env::temp_dir().join(format!("jklab_cache_test_{}_{id}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn d(m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, 28).unwrap()
    }

    fn sample_panel() -> ReturnPanel {
        ReturnPanel::new(
            vec![d(1), d(2)],
            vec!["AAA".into(), "BBB".into()],
            vec![
                vec![Some(PercentReturn(1.5)), None],
                vec![Some(PercentReturn(-2.0)), Some(PercentReturn(0.25))],
            ],
        )
        .unwrap()
    }

    #[test]
    fn write_and_load_preserves_panel() {
        let dir = temp_cache_dir();
        let cache = PanelCache::new(&dir);

        let panel = sample_panel();
        let meta = cache
            .write("k1", &panel, Path::new("stocks.csv"), d(1), d(2))
            .unwrap();
        assert_eq!(meta.rows, 2);
        assert_eq!(meta.symbols, 2);

        let loaded = cache.load("k1").unwrap().unwrap();
        assert_eq!(loaded, panel);
        assert_eq!(cache.get_meta("k1").unwrap().dataset_hash, meta.dataset_hash);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_key_is_a_miss() {
        let dir = temp_cache_dir();
        let cache = PanelCache::new(&dir);
        assert!(cache.load("nope").unwrap().is_none());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_file_is_quarantined() {
        let dir = temp_cache_dir();
        let cache = PanelCache::new(&dir);
        cache
            .write("bad", &sample_panel(), Path::new("x.csv"), d(1), d(2))
            .unwrap();
        fs::write(cache.panel_path("bad"), b"not parquet").unwrap();

        assert!(cache.load("bad").unwrap().is_none());
        assert!(!cache.panel_path("bad").exists());
        assert!(cache
            .panel_path("bad")
            .with_extension("parquet.quarantined")
            .exists());

        let status = cache.status().unwrap();
        assert_eq!(status.len(), 1);
        assert!(status[0].quarantined);
        assert_eq!(cache.len().unwrap(), 0);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn status_remove_and_clear() {
        let dir = temp_cache_dir();
        let cache = PanelCache::new(&dir);
        let panel = sample_panel();
        cache.write("a", &panel, Path::new("a.csv"), d(1), d(2)).unwrap();
        cache.write("b", &panel, Path::new("b.csv"), d(1), d(2)).unwrap();

        let status = cache.status().unwrap();
        assert_eq!(status.len(), 2);
        assert_eq!(status[0].key, "a");
        assert!(status[0].size_bytes > 0);
        assert!(status[0].meta.is_some());

        assert!(cache.remove("a").unwrap());
        assert!(!cache.remove("a").unwrap());
        assert_eq!(cache.len().unwrap(), 1);

        assert_eq!(cache.clear().unwrap(), 1);
        assert!(cache.is_empty().unwrap());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn key_changes_with_range_and_content() {
        let dir = temp_cache_dir();
        let source = dir.join("stocks.csv");
        fs::write(&source, "Date,A\n2024-01-31,1.0\n").unwrap();

        let k1 = PanelCache::key_for(&source, d(1), d(2)).unwrap();
        let k2 = PanelCache::key_for(&source, d(1), d(3)).unwrap();
        assert_eq!(k1, PanelCache::key_for(&source, d(1), d(2)).unwrap());
        assert_ne!(k1, k2);

        fs::write(&source, "Date,A\n2024-01-31,1.0\n2024-02-29,2.0\n").unwrap();
        assert_ne!(k1, PanelCache::key_for(&source, d(1), d(2)).unwrap());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_cache_dir_reports_nothing() {
        let cache = PanelCache::new(env::temp_dir().join("jklab_cache_never_created"));
        assert!(cache.status().unwrap().is_empty());
        assert_eq!(cache.clear().unwrap(), 0);
    }
}
