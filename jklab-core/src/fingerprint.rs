//! Run fingerprinting: deterministic identity for panels and J/K runs.
//!
//! - `DatasetHash`: BLAKE3 over every date, symbol and cell of a panel.
//! - `RunFingerprint`: generator parameters + dataset hash, hashed to a run id.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::ReturnPanel;
use crate::portfolio::GeneratorConfig;

/// Content hash of a return panel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetHash(pub String);

impl DatasetHash {
    /// Hash dates, symbols and values in panel order. Missing cells hash as a
    /// distinct marker so `None` and `0.0` never collide.
    pub fn of_panel(panel: &ReturnPanel) -> Self {
        let mut hasher = blake3::Hasher::new();

        for symbol in panel.symbols() {
            hasher.update(symbol.as_bytes());
            hasher.update(&[0]);
        }

        for (row, date) in panel.dates().iter().enumerate() {
            hasher.update(date.to_string().as_bytes());
            for value in panel.row(row) {
                match value {
                    Some(v) => {
                        hasher.update(&[1]);
                        hasher.update(&v.value().to_le_bytes());
                    }
                    None => {
                        hasher.update(&[0]);
                    }
                }
            }
        }

        Self(hasher.finalize().to_hex().to_string())
    }

    /// First 12 hex characters, for logs and directory names.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything that determines the output of one J/K run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFingerprint {
    pub generator: GeneratorConfig,
    pub dataset_hash: DatasetHash,
}

impl RunFingerprint {
    pub fn new(generator: GeneratorConfig, dataset_hash: DatasetHash) -> Self {
        Self {
            generator,
            dataset_hash,
        }
    }

    /// Stable run id: BLAKE3 over the canonical JSON of this fingerprint.
    pub fn run_id(&self) -> String {
        let canonical = serde_json::json!({
            "formation": self.generator.formation,
            "holding": self.generator.holding,
            "gap": self.generator.gap,
            "cutoff": self.generator.cutoff.map(|d| d.to_string()),
            "min_universe_size": self.generator.min_universe_size,
            "portfolio_count": self.generator.portfolio_count,
            "dataset_hash": &self.dataset_hash.0,
        });
        blake3::hash(canonical.to_string().as_bytes())
            .to_hex()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PercentReturn;
    use chrono::NaiveDate;

    fn panel(second: Option<f64>) -> ReturnPanel {
        ReturnPanel::new(
            vec![
                NaiveDate::from_ymd_opt(2020, 1, 31).unwrap(),
                NaiveDate::from_ymd_opt(2020, 2, 29).unwrap(),
            ],
            vec!["AAA".into()],
            vec![vec![Some(PercentReturn(1.0))], vec![second.map(PercentReturn)]],
        )
        .unwrap()
    }

    #[test]
    fn dataset_hash_is_deterministic() {
        assert_eq!(
            DatasetHash::of_panel(&panel(Some(2.0))),
            DatasetHash::of_panel(&panel(Some(2.0)))
        );
    }

    #[test]
    fn missing_differs_from_zero() {
        assert_ne!(
            DatasetHash::of_panel(&panel(None)),
            DatasetHash::of_panel(&panel(Some(0.0)))
        );
    }

    #[test]
    fn run_id_depends_on_parameters() {
        let hash = DatasetHash::of_panel(&panel(Some(2.0)));
        let a = RunFingerprint::new(GeneratorConfig::new(6, 3), hash.clone());
        let b = RunFingerprint::new(GeneratorConfig::new(6, 6), hash);
        assert_eq!(a.run_id(), a.clone().run_id());
        assert_ne!(a.run_id(), b.run_id());
        assert_eq!(a.dataset_hash.short().len(), 12);
    }
}
