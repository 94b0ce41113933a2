//! Reporting and export: JSON, CSV, and Markdown artifact generation.
//!
//! Three formats for sweep results:
//! - **JSON**: the full sweep manifest, schema-versioned
//! - **CSV**: summary matrix, monthly leg returns, benchmark comparison
//! - **Markdown**: a human-readable report with the best pair in bold
//!
//! Persisted manifests carry `schema_version`. Newer versions are rejected
//! on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use jklab_core::domain::ReturnPanel;
use serde::{Deserialize, Serialize};

use crate::comparison::BenchmarkComparison;
use crate::config::AnalysisConfig;
use crate::runner::{JkResult, SCHEMA_VERSION};
use crate::summary::{round4, SummaryMatrix};
use crate::sweep::{SweepResults, SweepWarning};

// ─── Manifest ───────────────────────────────────────────────────────

/// Everything a sweep produced, in one serializable document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepManifest {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub dataset_hash: String,
    pub is_synthetic: bool,
    pub config: AnalysisConfig,
    pub summary: SummaryMatrix,
    /// `(J, K)` of the best pair.
    pub best: Option<(usize, usize)>,
    pub warnings: Vec<SweepWarning>,
    pub comparison: Option<BenchmarkComparison>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl SweepManifest {
    pub fn new(
        sweep: &SweepResults,
        comparison: Option<&BenchmarkComparison>,
        config: &AnalysisConfig,
    ) -> Self {
        let first = sweep.all().first();
        Self {
            schema_version: SCHEMA_VERSION,
            dataset_hash: first.map(|r| r.dataset_hash.clone()).unwrap_or_default(),
            is_synthetic: first.is_some_and(|r| r.is_synthetic),
            config: config.clone(),
            summary: sweep.summary().clone(),
            best: sweep.best_row().map(|r| (r.formation, r.holding)),
            warnings: sweep.warnings().to_vec(),
            comparison: comparison.cloned(),
        }
    }
}

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(manifest: &SweepManifest) -> Result<String> {
    serde_json::to_string_pretty(manifest).context("failed to serialize SweepManifest to JSON")
}

/// Deserialize a manifest, rejecting schema versions newer than ours.
pub fn import_json(json: &str) -> Result<SweepManifest> {
    let manifest: SweepManifest =
        serde_json::from_str(json).context("failed to deserialize SweepManifest from JSON")?;
    if manifest.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            manifest.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(manifest)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Summary matrix as CSV, values rounded to 4 decimals.
///
/// Columns: serial, formation, holding, mean_winner, mean_loser, spread,
/// months, generations
pub fn export_summary_csv(summary: &SummaryMatrix) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "serial",
        "formation",
        "holding",
        "mean_winner",
        "mean_loser",
        "spread",
        "months",
        "generations",
    ])?;
    for row in summary.rows() {
        wtr.write_record([
            &row.serial.to_string(),
            &row.formation.to_string(),
            &row.holding.to_string(),
            &round4(row.mean_winner).to_string(),
            &round4(row.mean_loser).to_string(),
            &round4(row.spread).to_string(),
            &row.months.to_string(),
            &row.generations.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Monthly winner/loser/spread for every non-empty pair, long format.
pub fn export_monthly_csv(results: &[JkResult]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["formation", "holding", "date", "winner", "loser", "spread"])?;
    for result in results.iter().filter(|r| !r.is_empty()) {
        for row in &result.rows {
            wtr.write_record([
                &result.formation.to_string(),
                &result.holding.to_string(),
                &row.date.to_string(),
                &format!("{:.6}", row.winner.value()),
                &format!("{:.6}", row.loser.value()),
                &format!("{:.6}", row.spread().value()),
            ])?;
        }
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn export_comparison_csv(comparison: &BenchmarkComparison) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "date",
        "spread",
        "benchmark",
        "cumulative_spread",
        "cumulative_benchmark",
    ])?;
    for p in &comparison.points {
        wtr.write_record([
            &p.date.to_string(),
            &format!("{:.6}", p.spread.value()),
            &format!("{:.6}", p.benchmark.value()),
            &format!("{:.6}", p.cumulative_spread),
            &format!("{:.6}", p.cumulative_benchmark),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// A panel in the wide layout the loader reads: `Date` then one column per
/// symbol, missing cells as `NA`.
pub fn export_panel_csv(panel: &ReturnPanel) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = vec!["Date".to_string()];
    header.extend(panel.symbols().iter().cloned());
    wtr.write_record(&header)?;
    for row in 0..panel.len() {
        let mut record = vec![panel.date(row).to_string()];
        record.extend(panel.row(row).iter().map(|cell| match cell {
            Some(v) => format!("{:.6}", v.value()),
            None => "NA".to_string(),
        }));
        wtr.write_record(&record)?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for one sweep.
///
/// Creates `jk_{timestamp}/` under `output_dir` with `manifest.json`,
/// `summary.csv`, `monthly.csv`, `report.md` and, when a comparison is
/// given, `comparison.csv`. Returns the created directory.
pub fn save_artifacts(
    sweep: &SweepResults,
    comparison: Option<&BenchmarkComparison>,
    config: &AnalysisConfig,
    output_dir: &Path,
) -> Result<PathBuf> {
    let dirname = format!("jk_{}", chrono::Local::now().format("%Y%m%d_%H%M%S"));
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let manifest = SweepManifest::new(sweep, comparison, config);
    std::fs::write(run_dir.join("manifest.json"), export_json(&manifest)?)?;
    std::fs::write(
        run_dir.join("summary.csv"),
        export_summary_csv(sweep.summary())?,
    )?;
    std::fs::write(run_dir.join("monthly.csv"), export_monthly_csv(sweep.all())?)?;
    if let Some(c) = comparison {
        std::fs::write(run_dir.join("comparison.csv"), export_comparison_csv(c)?)?;
    }
    std::fs::write(run_dir.join("report.md"), generate_report(&manifest))?;

    tracing::info!(dir = %run_dir.display(), "artifacts saved");
    Ok(run_dir)
}

/// Load a manifest from an artifact directory.
pub fn load_artifacts(dir: &Path) -> Result<SweepManifest> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_json(&json)
}

// ─── Markdown report ────────────────────────────────────────────────

pub fn generate_report(manifest: &SweepManifest) -> String {
    let mut md = String::with_capacity(2048);

    md.push_str("# J/K Momentum Report\n\n");

    md.push_str("## Metadata\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!(
        "| Period | {} to {} |\n",
        manifest.config.data.start_date, manifest.config.data.end_date
    ));
    md.push_str(&format!(
        "| Cutoff | {} |\n",
        manifest.config.effective_cutoff()
    ));
    md.push_str(&format!("| Gap | {} |\n", manifest.config.strategy.gap));
    md.push_str(&format!(
        "| Universe | top {} in {} portfolios |\n",
        manifest.config.strategy.min_universe_size, manifest.config.strategy.portfolio_count
    ));
    md.push_str(&format!("| Dataset Hash | {} |\n", manifest.dataset_hash));
    if manifest.is_synthetic {
        md.push_str("| Data | **SYNTHETIC** |\n");
    }
    md.push('\n');

    md.push_str("## Summary\n\n");
    if manifest.summary.is_empty() {
        md.push_str("No pair produced portfolios.\n\n");
    } else {
        md.push_str("| # | J | K | Winner % | Loser % | Spread % | Months |\n");
        md.push_str("| ---: | ---: | ---: | ---: | ---: | ---: | ---: |\n");
        for row in manifest.summary.rows() {
            let cells = format!(
                "| {} | {} | {} | {:.4} | {:.4} | {:.4} | {} |",
                row.serial,
                row.formation,
                row.holding,
                row.mean_winner,
                row.mean_loser,
                row.spread,
                row.months
            );
            if manifest.best == Some((row.formation, row.holding)) {
                md.push_str(&bold_row(&cells));
            } else {
                md.push_str(&cells);
            }
            md.push('\n');
        }
        md.push('\n');
    }

    if let Some((j, k)) = manifest.best {
        if let Some(row) = manifest.summary.get(j, k) {
            md.push_str(&format!(
                "Best pair: **J={j}, K={k}** with spread {:.4}%\n\n",
                row.spread
            ));
        }
    }

    if let Some(ref c) = manifest.comparison {
        md.push_str("## Benchmark Comparison\n\n");
        match (c.points.first(), c.points.last()) {
            (Some(first), Some(last)) => {
                md.push_str("| Series | Growth of 1 |\n");
                md.push_str("| --- | ---: |\n");
                md.push_str(&format!(
                    "| J={} K={} spread | {:.4} |\n",
                    c.formation, c.holding, last.cumulative_spread
                ));
                md.push_str(&format!(
                    "| Benchmark | {:.4} |\n",
                    last.cumulative_benchmark
                ));
                md.push_str(&format!(
                    "\n{} months from {} to {}\n",
                    c.points.len(),
                    first.date,
                    last.date
                ));
            }
            _ => md.push_str("Benchmark has no month in common with the best pair.\n"),
        }
        md.push('\n');
    }

    if !manifest.warnings.is_empty() {
        md.push_str("## Warnings\n\n");
        for warn in &manifest.warnings {
            md.push_str(&format!("- {warn}\n"));
        }
        md.push('\n');
    }

    md
}

/// Wrap each cell of a Markdown table row in `**`.
fn bold_row(row: &str) -> String {
    let cells: Vec<String> = row
        .trim_matches('|')
        .split('|')
        .map(|c| format!(" **{}** ", c.trim()))
        .collect();
    format!("|{}|", cells.join("|"))
}
