//! Serializable analysis configuration (TOML).
//!
//! One file describes the data inputs, the J/K grid and the run settings:
//!
//! ```toml
//! [data]
//! panel = "data/stocks_monthly.csv"
//! benchmark = "data/nifty_monthly.csv"
//! start_date = "2002-01-01"
//! end_date = "2024-12-31"
//!
//! [strategy]
//! formation_periods = [6]
//! holding_periods = [3]
//! gap = 0
//! cutoff = "2024-12-31"
//!
//! [run]
//! parallel = true
//! cache_dir = ".jklab-cache"
//! ```

use chrono::NaiveDate;
use jklab_core::portfolio::{
    GeneratorConfig, GeneratorError, DEFAULT_MIN_UNIVERSE_SIZE, DEFAULT_PORTFOLIO_COUNT,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::synthetic::SyntheticConfig;

/// Period lengths (months) offered for J and K.
pub const STANDARD_PERIODS: [usize; 5] = [1, 3, 6, 9, 12];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("{0} list is empty")]
    EmptyPeriods(&'static str),

    #[error("{kind} contains a zero-length period")]
    ZeroPeriod { kind: &'static str },

    #[error("start_date {start} is after end_date {end}")]
    DateRange { start: NaiveDate, end: NaiveDate },

    #[error("no panel source: set data.panel or data.synthetic")]
    NoPanelSource,

    #[error(transparent)]
    Generator(#[from] GeneratorError),
}

/// Input data locations and the analysis date range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataConfig {
    /// Wide CSV of monthly percent returns.
    #[serde(default)]
    pub panel: Option<PathBuf>,

    /// CSV of monthly benchmark returns (decimals).
    #[serde(default)]
    pub benchmark: Option<PathBuf>,

    /// Generate the panel instead of reading one. Ignored when `panel` is set.
    #[serde(default)]
    pub synthetic: Option<SyntheticConfig>,

    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// The J/K grid and ranking parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrategyConfig {
    pub formation_periods: Vec<usize>,
    pub holding_periods: Vec<usize>,

    #[serde(default)]
    pub gap: usize,

    /// Defaults to `data.end_date` when absent.
    #[serde(default)]
    pub cutoff: Option<NaiveDate>,

    #[serde(default = "default_min_universe_size")]
    pub min_universe_size: usize,

    #[serde(default = "default_portfolio_count")]
    pub portfolio_count: usize,
}

fn default_min_universe_size() -> usize {
    DEFAULT_MIN_UNIVERSE_SIZE
}

fn default_portfolio_count() -> usize {
    DEFAULT_PORTFOLIO_COUNT
}

/// Execution and output settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSettings {
    #[serde(default = "default_true")]
    pub parallel: bool,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    #[serde(default = "default_true")]
    pub use_cache: bool,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_true() -> bool {
    true
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".jklab-cache")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            parallel: true,
            cache_dir: default_cache_dir(),
            use_cache: true,
            output_dir: default_output_dir(),
        }
    }
}

/// Complete configuration for one analysis session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisConfig {
    pub data: DataConfig,
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub run: RunSettings,
}

impl Default for AnalysisConfig {
    /// J = 6, K = 3 over 2002-01-01..=2024-12-31, no input files set.
    fn default() -> Self {
        Self {
            data: DataConfig {
                panel: None,
                benchmark: None,
                synthetic: None,
                start_date: NaiveDate::from_ymd_opt(2002, 1, 1).unwrap_or_default(),
                end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap_or_default(),
            },
            strategy: StrategyConfig {
                formation_periods: vec![6],
                holding_periods: vec![3],
                gap: 0,
                cutoff: None,
                min_universe_size: DEFAULT_MIN_UNIVERSE_SIZE,
                portfolio_count: DEFAULT_PORTFOLIO_COUNT,
            },
            run: RunSettings::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data.start_date > self.data.end_date {
            return Err(ConfigError::DateRange {
                start: self.data.start_date,
                end: self.data.end_date,
            });
        }
        if self.data.panel.is_none() && self.data.synthetic.is_none() {
            return Err(ConfigError::NoPanelSource);
        }
        check_periods("formation_periods", &self.strategy.formation_periods)?;
        check_periods("holding_periods", &self.strategy.holding_periods)?;

        for (j, k) in self.pairs() {
            self.generator_config(j, k).validate()?;
        }
        Ok(())
    }

    /// Holding windows ending after this date are excluded.
    pub fn effective_cutoff(&self) -> NaiveDate {
        self.strategy.cutoff.unwrap_or(self.data.end_date)
    }

    /// Generator parameters for one (J, K) pair.
    pub fn generator_config(&self, formation: usize, holding: usize) -> GeneratorConfig {
        GeneratorConfig {
            formation,
            holding,
            gap: self.strategy.gap,
            cutoff: Some(self.effective_cutoff()),
            min_universe_size: self.strategy.min_universe_size,
            portfolio_count: self.strategy.portfolio_count,
        }
    }

    /// Every (J, K) combination, J-major, duplicates removed.
    pub fn pairs(&self) -> Vec<(usize, usize)> {
        let mut formation = self.strategy.formation_periods.clone();
        let mut holding = self.strategy.holding_periods.clone();
        formation.sort_unstable();
        formation.dedup();
        holding.sort_unstable();
        holding.dedup();

        formation
            .iter()
            .flat_map(|&j| holding.iter().map(move |&k| (j, k)))
            .collect()
    }

    /// Replace both period lists with [`STANDARD_PERIODS`].
    pub fn with_full_grid(mut self) -> Self {
        self.strategy.formation_periods = STANDARD_PERIODS.to_vec();
        self.strategy.holding_periods = STANDARD_PERIODS.to_vec();
        self
    }

    /// BLAKE3 over the canonical JSON form of this config.
    pub fn config_hash(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

fn check_periods(kind: &'static str, periods: &[usize]) -> Result<(), ConfigError> {
    if periods.is_empty() {
        return Err(ConfigError::EmptyPeriods(kind));
    }
    if periods.contains(&0) {
        return Err(ConfigError::ZeroPeriod { kind });
    }
    Ok(())
}
