//! J/K grid sweep.
//!
//! Each pair is independent: the panel is shared by reference and every pair
//! builds its own generations. A pair that yields no usable month, or whose
//! generator config is invalid, becomes a warning and the batch continues.

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

use jklab_core::domain::ReturnPanel;
use jklab_core::fingerprint::DatasetHash;
use jklab_core::portfolio::{GeneratorConfig, DEFAULT_MIN_UNIVERSE_SIZE, DEFAULT_PORTFOLIO_COUNT};

use crate::config::{AnalysisConfig, STANDARD_PERIODS};
use crate::runner::{run_jk, JkResult};
use crate::summary::{SummaryMatrix, SummaryRow};

/// The J/K grid plus the settings shared by every pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamGrid {
    pub formation_periods: Vec<usize>,
    pub holding_periods: Vec<usize>,
    pub gap: usize,
    pub cutoff: Option<NaiveDate>,
    pub min_universe_size: usize,
    pub portfolio_count: usize,
}

impl ParamGrid {
    pub fn new(formation_periods: Vec<usize>, holding_periods: Vec<usize>) -> Self {
        Self {
            formation_periods,
            holding_periods,
            gap: 0,
            cutoff: None,
            min_universe_size: DEFAULT_MIN_UNIVERSE_SIZE,
            portfolio_count: DEFAULT_PORTFOLIO_COUNT,
        }
    }

    /// J and K both drawn from [`STANDARD_PERIODS`]: 25 pairs.
    pub fn standard() -> Self {
        Self::new(STANDARD_PERIODS.to_vec(), STANDARD_PERIODS.to_vec())
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            formation_periods: config.strategy.formation_periods.clone(),
            holding_periods: config.strategy.holding_periods.clone(),
            gap: config.strategy.gap,
            cutoff: Some(config.effective_cutoff()),
            min_universe_size: config.strategy.min_universe_size,
            portfolio_count: config.strategy.portfolio_count,
        }
    }

    pub fn with_gap(mut self, gap: usize) -> Self {
        self.gap = gap;
        self
    }

    pub fn with_cutoff(mut self, cutoff: NaiveDate) -> Self {
        self.cutoff = Some(cutoff);
        self
    }

    pub fn with_universe(mut self, min_universe_size: usize, portfolio_count: usize) -> Self {
        self.min_universe_size = min_universe_size;
        self.portfolio_count = portfolio_count;
        self
    }

    /// Number of distinct (J, K) pairs.
    pub fn size(&self) -> usize {
        self.configs().len()
    }

    /// One generator config per distinct pair, sorted by J then K.
    pub fn configs(&self) -> Vec<GeneratorConfig> {
        let mut formation = self.formation_periods.clone();
        let mut holding = self.holding_periods.clone();
        formation.sort_unstable();
        formation.dedup();
        holding.sort_unstable();
        holding.dedup();

        formation
            .iter()
            .flat_map(|&j| holding.iter().map(move |&k| (j, k)))
            .map(|(formation, holding)| GeneratorConfig {
                formation,
                holding,
                gap: self.gap,
                cutoff: self.cutoff,
                min_universe_size: self.min_universe_size,
                portfolio_count: self.portfolio_count,
            })
            .collect()
    }
}

/// A pair that did not make it into the summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SweepWarning {
    /// No generation, or no month where both legs have a value.
    NoPortfolios { formation: usize, holding: usize },
    /// The pair could not be evaluated at all.
    Failed {
        formation: usize,
        holding: usize,
        reason: String,
    },
}

impl fmt::Display for SweepWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPortfolios { formation, holding } => write!(
                f,
                "J={formation}, K={holding}: no portfolios generated (universe too small or no window before cutoff)"
            ),
            Self::Failed {
                formation,
                holding,
                reason,
            } => write!(f, "J={formation}, K={holding}: failed: {reason}"),
        }
    }
}

/// Grid sweep executor.
pub struct ParamSweep<'a> {
    panel: &'a ReturnPanel,
    dataset_hash: DatasetHash,
    is_synthetic: bool,
    parallel: bool,
}

impl<'a> ParamSweep<'a> {
    pub fn new(panel: &'a ReturnPanel, dataset_hash: DatasetHash) -> Self {
        Self {
            panel,
            dataset_hash,
            is_synthetic: false,
            parallel: true,
        }
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Tag every result as built on synthetic data.
    pub fn with_synthetic(mut self, is_synthetic: bool) -> Self {
        self.is_synthetic = is_synthetic;
        self
    }

    /// Evaluate every pair in the grid.
    pub fn sweep(&self, grid: &ParamGrid) -> SweepResults {
        self.sweep_with_progress(grid, |_, _, _| {})
    }

    /// Like [`sweep`](Self::sweep), calling `progress(done, total, config)`
    /// after each pair. With parallelism on, calls arrive in completion order.
    pub fn sweep_with_progress<F>(&self, grid: &ParamGrid, progress: F) -> SweepResults
    where
        F: Fn(usize, usize, &GeneratorConfig) + Send + Sync,
    {
        let configs = grid.configs();
        let total = configs.len();
        let done = std::sync::atomic::AtomicUsize::new(0);

        let evaluate = |config: &GeneratorConfig| {
            let outcome = run_jk(self.panel, config, &self.dataset_hash, self.is_synthetic);
            let n = done.fetch_add(1, std::sync::atomic::Ordering::Relaxed) + 1;
            progress(n, total, config);
            (config.formation, config.holding, outcome)
        };

        let outcomes: Vec<_> = if self.parallel {
            configs.par_iter().map(evaluate).collect()
        } else {
            configs.iter().map(evaluate).collect()
        };

        let mut results = Vec::with_capacity(total);
        let mut warnings = Vec::new();
        for (formation, holding, outcome) in outcomes {
            match outcome {
                Ok(result) if result.is_empty() => {
                    tracing::warn!(formation, holding, "no portfolios generated");
                    warnings.push(SweepWarning::NoPortfolios { formation, holding });
                    results.push(result);
                }
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::warn!(formation, holding, error = %e, "pair failed");
                    warnings.push(SweepWarning::Failed {
                        formation,
                        holding,
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            pairs = total,
            summarized = results.iter().filter(|r| !r.is_empty()).count(),
            warnings = warnings.len(),
            "sweep complete"
        );

        SweepResults::new(results, warnings)
    }
}

/// Results from a grid sweep.
#[derive(Debug, Clone)]
pub struct SweepResults {
    results: Vec<JkResult>,
    warnings: Vec<SweepWarning>,
    summary: SummaryMatrix,
}

impl SweepResults {
    pub fn new(results: Vec<JkResult>, warnings: Vec<SweepWarning>) -> Self {
        let summary = SummaryMatrix::from_results(&results);
        Self {
            results,
            warnings,
            summary,
        }
    }

    /// All evaluated pairs, empty ones included, sorted by J then K.
    pub fn all(&self) -> &[JkResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn warnings(&self) -> &[SweepWarning] {
        &self.warnings
    }

    pub fn summary(&self) -> &SummaryMatrix {
        &self.summary
    }

    pub fn get(&self, formation: usize, holding: usize) -> Option<&JkResult> {
        self.results
            .iter()
            .find(|r| r.formation == formation && r.holding == holding)
    }

    /// The summary row with the largest spread.
    pub fn best_row(&self) -> Option<&SummaryRow> {
        self.summary.best()
    }

    /// The full result behind [`best_row`](Self::best_row).
    pub fn best(&self) -> Option<&JkResult> {
        let row = self.best_row()?;
        self.get(row.formation, row.holding)
    }
}
