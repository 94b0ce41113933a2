//! jklab runner: J/K sweep orchestration on top of `jklab-core`.
//!
//! This crate provides:
//! - TOML configuration for data sources, grid and run settings
//! - Panel loading from CSV with a Parquet cache, or a seeded synthetic panel
//! - Single-pair evaluation and parallel grid sweeps
//! - Summary matrix, best-pair selection and benchmark comparison
//! - JSON, CSV and Markdown artifacts

pub mod comparison;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod panel_cache;
pub mod runner;
pub mod summary;
pub mod sweep;
pub mod synthetic;

pub use comparison::BenchmarkComparison;
pub use config::{AnalysisConfig, ConfigError, DataConfig, RunSettings, StrategyConfig};
pub use data_loader::{
    load_panel, load_synthetic, read_benchmark_csv, read_panel_csv, DataSource, LoadError,
    LoadOptions, LoadedPanel,
};
pub use export::{export_panel_csv, generate_report, load_artifacts, save_artifacts, SweepManifest};
pub use panel_cache::{CacheEntryStatus, CacheError, PanelCache, PanelCacheMeta};
pub use runner::{run_analysis, run_jk, AnalysisOutput, JkResult, RunError, SCHEMA_VERSION};
pub use summary::{SummaryMatrix, SummaryRow};
pub use sweep::{ParamGrid, ParamSweep, SweepResults, SweepWarning};
pub use synthetic::{generate_synthetic_panel, SyntheticConfig};
