//! Portfolio generator: rolling J/K window scan over a return panel.
//!
//! Every start index `i` with a full formation + gap + holding span inside the
//! panel yields at most one [`Generation`]:
//!
//! ```text
//! formation rows  [i, i+J)
//! holding rows    [i+J+gap, i+J+gap+K)
//! ```
//!
//! The scan stops at the first window whose holding end falls after the
//! cutoff; later windows only end later. A window whose eligible universe is
//! smaller than `min_universe_size` is skipped without ending the scan.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ranking::{cumulative_return, partition_into_groups, FormationScore};
use crate::domain::{Generation, ReturnPanel, Symbol, WindowBounds};

/// Default number of top-ranked stocks that make up the ranked universe.
pub const DEFAULT_MIN_UNIVERSE_SIZE: usize = 50;

/// Default number of equal-size groups (deciles).
pub const DEFAULT_PORTFOLIO_COUNT: usize = 10;

#[derive(Debug, Error, PartialEq)]
pub enum GeneratorError {
    #[error("formation period must be at least 1 month")]
    ZeroFormation,

    #[error("holding period must be at least 1 month")]
    ZeroHolding,

    #[error("portfolio_count must be at least 2, got {0}")]
    TooFewPortfolios(usize),

    #[error("min_universe_size ({universe}) must be a positive multiple of portfolio_count ({portfolios})")]
    UnevenUniverse { universe: usize, portfolios: usize },
}

/// Parameters for one J/K generator run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// J: formation-period length in months.
    pub formation: usize,
    /// K: holding-period length in months.
    pub holding: usize,
    /// Months skipped between formation end and holding start.
    #[serde(default)]
    pub gap: usize,
    /// Holding windows ending after this date are excluded.
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

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            formation: 6,
            holding: 3,
            gap: 0,
            cutoff: None,
            min_universe_size: DEFAULT_MIN_UNIVERSE_SIZE,
            portfolio_count: DEFAULT_PORTFOLIO_COUNT,
        }
    }
}

impl GeneratorConfig {
    pub fn new(formation: usize, holding: usize) -> Self {
        Self {
            formation,
            holding,
            ..Self::default()
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

    /// Months spanned by one window position: J + gap + K.
    pub fn span(&self) -> usize {
        self.formation + self.gap + self.holding
    }

    /// Stocks per group.
    pub fn group_size(&self) -> usize {
        self.min_universe_size / self.portfolio_count.max(1)
    }

    pub fn validate(&self) -> Result<(), GeneratorError> {
        if self.formation == 0 {
            return Err(GeneratorError::ZeroFormation);
        }
        if self.holding == 0 {
            return Err(GeneratorError::ZeroHolding);
        }
        if self.portfolio_count < 2 {
            return Err(GeneratorError::TooFewPortfolios(self.portfolio_count));
        }
        if self.min_universe_size < self.portfolio_count
            || self.min_universe_size % self.portfolio_count != 0
        {
            return Err(GeneratorError::UnevenUniverse {
                universe: self.min_universe_size,
                portfolios: self.portfolio_count,
            });
        }
        Ok(())
    }
}

/// Scan `panel` and emit one generation per qualifying window position.
///
/// An empty result is a normal outcome (nothing fits before the cutoff, or
/// no window has a large enough universe). Only an invalid configuration is
/// an error.
pub fn generate(
    panel: &ReturnPanel,
    config: &GeneratorConfig,
) -> Result<Vec<Generation>, GeneratorError> {
    config.validate()?;

    let span = config.span();
    if panel.len() < span {
        tracing::debug!(
            rows = panel.len(),
            span,
            "panel shorter than one formation+gap+holding span"
        );
        return Ok(Vec::new());
    }

    let mut generations = Vec::new();

    for i in 0..=(panel.len() - span) {
        let formation = i..i + config.formation;
        let holding_start = formation.end + config.gap;
        let holding = holding_start..holding_start + config.holding;

        let holding_end_date = panel.date(holding.end - 1);
        if let Some(cutoff) = config.cutoff {
            if holding_end_date > cutoff {
                tracing::debug!(start = i, %holding_end_date, %cutoff, "holding window passes cutoff; scan stopped");
                break;
            }
        }

        let scores: Vec<FormationScore<'_>> = panel
            .symbols()
            .iter()
            .enumerate()
            .filter(|(col, _)| {
                panel.is_complete(*col, formation.clone()) && panel.is_complete(*col, holding.clone())
            })
            .map(|(col, symbol)| FormationScore {
                symbol: symbol.as_str(),
                col,
                formation_return: cumulative_return(panel, col, formation.clone()),
            })
            .collect();

        let eligible_count = scores.len();
        if eligible_count < config.min_universe_size {
            tracing::debug!(
                start = i,
                eligible = eligible_count,
                required = config.min_universe_size,
                "window skipped: universe too small"
            );
            continue;
        }

        let groups = partition_into_groups(scores, config.min_universe_size, config.portfolio_count);
        let (Some(losers), Some(winners)) = (groups.first(), groups.last()) else {
            continue;
        };

        generations.push(Generation {
            formation: bounds(panel, formation.start, formation.end - 1),
            holding: bounds(panel, holding.start, holding.end - 1),
            winners: symbols_of(winners),
            losers: symbols_of(losers),
            eligible_count,
        });
    }

    tracing::debug!(
        formation = config.formation,
        holding = config.holding,
        gap = config.gap,
        count = generations.len(),
        "generations built"
    );

    Ok(generations)
}

/// Convenience wrapper using the default universe size and decile count.
pub fn generate_portfolios(
    panel: &ReturnPanel,
    formation: usize,
    holding: usize,
    cutoff: NaiveDate,
    gap: usize,
) -> Result<Vec<Generation>, GeneratorError> {
    let config = GeneratorConfig::new(formation, holding)
        .with_gap(gap)
        .with_cutoff(cutoff);
    generate(panel, &config)
}

fn bounds(panel: &ReturnPanel, start_idx: usize, end_idx: usize) -> WindowBounds {
    WindowBounds {
        start_idx,
        end_idx,
        start: panel.date(start_idx),
        end: panel.date(end_idx),
    }
}

fn symbols_of(group: &[FormationScore<'_>]) -> Vec<Symbol> {
    group.iter().map(|s| s.symbol.to_string()).collect()
}
