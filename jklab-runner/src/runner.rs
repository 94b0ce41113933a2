//! J/K runner: wires generator, aggregator and spread math for one pair,
//! plus the end-to-end analysis entry point used by the CLI.
//!
//! Two entry points:
//! - `run_jk()`: takes a pre-loaded panel. Used by the sweep.
//! - `run_analysis()`: loads panel and benchmark from an `AnalysisConfig`,
//!   sweeps the grid and builds the best-pair comparison.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use jklab_core::domain::{BenchmarkSeries, ReturnPanel, ReturnSeries};
use jklab_core::fingerprint::{DatasetHash, RunFingerprint};
use jklab_core::portfolio::{
    aggregate, generate, inner_join, GeneratorConfig, GeneratorError, LegRow, SpreadSummary,
};

use crate::comparison::BenchmarkComparison;
use crate::config::{AnalysisConfig, ConfigError};
use crate::data_loader::{
    load_panel, load_synthetic, read_benchmark_csv, DataSource, LoadError, LoadOptions,
};
use crate::panel_cache::PanelCache;
use crate::sweep::{ParamGrid, ParamSweep, SweepResults};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("generator error: {0}")]
    Generator(#[from] GeneratorError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of one (J, K) evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JkResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: String,
    pub formation: usize,
    pub holding: usize,
    pub gap: usize,
    pub cutoff: Option<NaiveDate>,
    pub generation_count: usize,
    /// Holding start of the first generation and holding end of the last.
    pub holding_span: Option<(NaiveDate, NaiveDate)>,
    pub winners: ReturnSeries,
    pub losers: ReturnSeries,
    /// Dates where both legs have a value.
    pub rows: Vec<LegRow>,
    /// `None` when no month has both legs.
    pub summary: Option<SpreadSummary>,
    pub dataset_hash: String,
    pub is_synthetic: bool,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl JkResult {
    /// True when the pair produced no usable month.
    pub fn is_empty(&self) -> bool {
        self.summary.is_none()
    }
}

/// Evaluate one (J, K) pair on a pre-loaded panel. No I/O.
pub fn run_jk(
    panel: &ReturnPanel,
    config: &GeneratorConfig,
    dataset_hash: &DatasetHash,
    is_synthetic: bool,
) -> Result<JkResult, RunError> {
    let generations = generate(panel, config)?;
    let legs = aggregate(panel, &generations);
    let rows = inner_join(&legs.winners, &legs.losers);
    let summary = SpreadSummary::from_rows(&rows);

    let holding_span = generations
        .first()
        .zip(generations.last())
        .map(|(first, last)| (first.holding_start(), last.holding_end()));

    tracing::debug!(
        formation = config.formation,
        holding = config.holding,
        generations = generations.len(),
        months = rows.len(),
        "pair evaluated"
    );

    Ok(JkResult {
        schema_version: SCHEMA_VERSION,
        run_id: RunFingerprint::new(config.clone(), dataset_hash.clone()).run_id(),
        formation: config.formation,
        holding: config.holding,
        gap: config.gap,
        cutoff: config.cutoff,
        generation_count: generations.len(),
        holding_span,
        winners: legs.winners,
        losers: legs.losers,
        rows,
        summary,
        dataset_hash: dataset_hash.0.clone(),
        is_synthetic,
    })
}

/// Everything one analysis session produces.
#[derive(Debug)]
pub struct AnalysisOutput {
    pub source: DataSource,
    pub dataset_hash: DatasetHash,
    pub is_synthetic: bool,
    pub panel_rows: usize,
    pub panel_symbols: usize,
    pub sweep: SweepResults,
    /// Best pair vs benchmark; `None` without a benchmark or a best pair.
    pub comparison: Option<BenchmarkComparison>,
}

/// Load data, sweep every (J, K) pair and compare the best pair against the
/// benchmark.
///
/// `force` bypasses the panel cache read.
pub fn run_analysis(config: &AnalysisConfig, force: bool) -> Result<AnalysisOutput, RunError> {
    config.validate()?;

    let opts = LoadOptions {
        start: config.data.start_date,
        end: config.data.end_date,
        force,
        use_cache: config.run.use_cache,
    };

    let loaded = match (&config.data.panel, &config.data.synthetic) {
        (Some(path), _) => load_panel(path, &PanelCache::new(&config.run.cache_dir), &opts)?,
        (None, Some(synthetic)) => load_synthetic(synthetic, &opts)?,
        (None, None) => return Err(ConfigError::NoPanelSource.into()),
    };

    let benchmark: Option<BenchmarkSeries> = config
        .data
        .benchmark
        .as_deref()
        .map(|path| read_benchmark_csv(path, opts.start, opts.end))
        .transpose()?;

    let grid = ParamGrid::from_config(config);
    tracing::info!(
        pairs = grid.size(),
        rows = loaded.panel.len(),
        symbols = loaded.panel.symbol_count(),
        parallel = config.run.parallel,
        "starting J/K sweep"
    );

    let sweep = ParamSweep::new(&loaded.panel, loaded.dataset_hash.clone())
        .with_parallelism(config.run.parallel)
        .with_synthetic(loaded.is_synthetic)
        .sweep(&grid);

    let comparison = benchmark
        .as_ref()
        .and_then(|b| BenchmarkComparison::for_best(&sweep, b));

    Ok(AnalysisOutput {
        source: loaded.source,
        dataset_hash: loaded.dataset_hash,
        is_synthetic: loaded.is_synthetic,
        panel_rows: loaded.panel.len(),
        panel_symbols: loaded.panel.symbol_count(),
        sweep,
        comparison,
    })
}
