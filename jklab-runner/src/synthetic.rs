//! Synthetic return panels for demos and tests.
//!
//! Returns are drawn uniformly from [-10, 10] percent with an optional share
//! of missing cells. The RNG is seeded from BLAKE3 of a seed string, so a
//! given config always yields the same panel. Results built on synthetic data
//! are tagged as such.

use chrono::{Datelike, NaiveDate};
use jklab_core::domain::{PanelError, PercentReturn, ReturnPanel};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyntheticConfig {
    pub n_symbols: usize,
    pub n_months: usize,
    /// Any date in the first month; the panel uses month-end dates.
    pub start: NaiveDate,
    /// Probability that any single cell is missing.
    #[serde(default)]
    pub missing_probability: f64,
    #[serde(default = "default_seed")]
    pub seed: String,
}

fn default_seed() -> String {
    "jklab".to_string()
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            n_symbols: 100,
            n_months: 120,
            start: NaiveDate::from_ymd_opt(2002, 1, 31).unwrap_or_default(),
            missing_probability: 0.0,
            seed: default_seed(),
        }
    }
}

/// Last day of the month `offset` months after `start`'s month.
pub fn month_end(start: NaiveDate, offset: usize) -> Option<NaiveDate> {
    let months = start.year() as i64 * 12 + start.month0() as i64 + offset as i64 + 1;
    let year = i32::try_from(months.div_euclid(12)).ok()?;
    let month0 = months.rem_euclid(12) as u32;
    NaiveDate::from_ymd_opt(year, month0 + 1, 1)?.pred_opt()
}

/// Build a deterministic synthetic panel.
pub fn generate_synthetic_panel(config: &SyntheticConfig) -> Result<ReturnPanel, PanelError> {
    let seed_bytes = blake3::hash(config.seed.as_bytes());
    let mut rng = StdRng::from_seed(*seed_bytes.as_bytes());
    let missing = config.missing_probability.clamp(0.0, 1.0);

    let dates: Vec<NaiveDate> = (0..config.n_months)
        .map_while(|i| month_end(config.start, i))
        .collect();
    let symbols = (0..config.n_symbols).map(|i| format!("SYN{i:04}")).collect();

    let rows = dates
        .iter()
        .map(|_| {
            (0..config.n_symbols)
                .map(|_| {
                    let value: f64 = rng.gen_range(-10.0..=10.0);
                    if missing > 0.0 && rng.gen_bool(missing) {
                        None
                    } else {
                        Some(PercentReturn(value))
                    }
                })
                .collect()
        })
        .collect();

    ReturnPanel::new(dates, symbols, rows)
}
