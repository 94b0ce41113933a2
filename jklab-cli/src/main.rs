//! jklab CLI: J/K momentum sweeps, synthetic panels, and cache management.
//!
//! Commands:
//! - `run`: sweep (J, K) pairs over a CSV or synthetic panel and save artifacts
//! - `generate`: write a seeded synthetic panel as CSV
//! - `report`: re-render the Markdown report of a saved artifact directory
//! - `cache status` / `cache clear`: inspect or empty the panel cache

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use jklab_core::fingerprint::DatasetHash;
use jklab_runner::summary::round4;
use jklab_runner::{
    export_panel_csv, generate_report, generate_synthetic_panel, load_artifacts, run_analysis,
    save_artifacts, AnalysisConfig, AnalysisOutput, PanelCache, SyntheticConfig,
};

#[derive(Parser)]
#[command(name = "jklab", about = "jklab CLI: J/K momentum portfolio analysis")]
struct Cli {
    /// Log filter used when RUST_LOG is unset (e.g. info, jklab_core=debug).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep (J, K) pairs and compare the best pair with a benchmark.
    Run(RunArgs),
    /// Write a seeded synthetic panel as CSV.
    Generate {
        /// Output CSV path.
        #[arg(long)]
        out: PathBuf,

        #[arg(long, default_value_t = 100)]
        symbols: usize,

        #[arg(long, default_value_t = 120)]
        months: usize,

        /// First month (YYYY-MM-DD).
        #[arg(long, default_value = "2002-01-31")]
        start: String,

        /// Probability that a cell is missing.
        #[arg(long, default_value_t = 0.0)]
        missing: f64,

        #[arg(long, default_value = "jklab")]
        seed: String,
    },
    /// Print the Markdown report of a saved artifact directory.
    Report {
        /// Directory created by `run`.
        dir: PathBuf,
    },
    /// Panel cache commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// Path to a TOML config file. Flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Wide CSV of monthly percent returns.
    #[arg(long)]
    panel: Option<PathBuf>,

    /// CSV of monthly decimal benchmark returns.
    #[arg(long)]
    benchmark: Option<PathBuf>,

    /// Start date (YYYY-MM-DD).
    #[arg(long)]
    start: Option<String>,

    /// End date (YYYY-MM-DD).
    #[arg(long)]
    end: Option<String>,

    /// Formation periods in months, repeatable.
    #[arg(short = 'J', long = "formation")]
    formation: Vec<usize>,

    /// Holding periods in months, repeatable.
    #[arg(short = 'K', long = "holding")]
    holding: Vec<usize>,

    /// Skipped months between formation and holding.
    #[arg(long)]
    gap: Option<usize>,

    /// Last date a holding window may end on (YYYY-MM-DD). Defaults to the
    /// config file's cutoff, else the end date.
    #[arg(long)]
    cutoff: Option<String>,

    /// Sweep J and K over 1, 3, 6, 9, 12.
    #[arg(long, default_value_t = false)]
    full_grid: bool,

    /// Use a synthetic panel when no panel file is given.
    #[arg(long, default_value_t = false)]
    synthetic: bool,

    /// Evaluate pairs one at a time.
    #[arg(long, default_value_t = false)]
    sequential: bool,

    /// Neither read nor write the panel cache.
    #[arg(long, default_value_t = false)]
    no_cache: bool,

    /// Re-read the CSV even when cached.
    #[arg(long, default_value_t = false)]
    force: bool,

    #[arg(long)]
    cache_dir: Option<PathBuf>,

    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Print results without writing artifacts.
    #[arg(long, default_value_t = false)]
    no_save: bool,
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached panels with their ranges and sizes.
    Status {
        #[arg(long, default_value = ".jklab-cache")]
        cache_dir: PathBuf,
    },
    /// Remove every cached panel.
    Clear {
        #[arg(long, default_value = ".jklab-cache")]
        cache_dir: PathBuf,

        /// Actually delete (without this flag, only previews what would be removed).
        #[arg(long, default_value_t = false)]
        confirm: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Commands::Run(args) => run_cmd(args),
        Commands::Generate {
            out,
            symbols,
            months,
            start,
            missing,
            seed,
        } => run_generate(&out, symbols, months, &start, missing, seed),
        Commands::Report { dir } => {
            let manifest = load_artifacts(&dir)?;
            print!("{}", generate_report(&manifest));
            Ok(())
        }
        Commands::Cache { action } => match action {
            CacheAction::Status { cache_dir } => run_cache_status(&cache_dir),
            CacheAction::Clear { cache_dir, confirm } => run_cache_clear(&cache_dir, confirm),
        },
    }
}

fn init_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
}

fn build_config(args: &RunArgs) -> Result<AnalysisConfig> {
    let mut config = match &args.config {
        Some(path) => AnalysisConfig::from_file(path)?,
        None => AnalysisConfig::default(),
    };

    if let Some(panel) = &args.panel {
        config.data.panel = Some(panel.clone());
    }
    if let Some(benchmark) = &args.benchmark {
        config.data.benchmark = Some(benchmark.clone());
    }
    if let Some(start) = &args.start {
        config.data.start_date = parse_date(start)?;
    }
    if let Some(end) = &args.end {
        config.data.end_date = parse_date(end)?;
    }
    if args.full_grid {
        config = config.with_full_grid();
    }
    if !args.formation.is_empty() {
        config.strategy.formation_periods = args.formation.clone();
    }
    if !args.holding.is_empty() {
        config.strategy.holding_periods = args.holding.clone();
    }
    if let Some(gap) = args.gap {
        config.strategy.gap = gap;
    }
    if let Some(cutoff) = &args.cutoff {
        config.strategy.cutoff = Some(parse_date(cutoff)?);
    }
    if args.synthetic && config.data.panel.is_none() && config.data.synthetic.is_none() {
        config.data.synthetic = Some(SyntheticConfig::default());
    }
    if args.sequential {
        config.run.parallel = false;
    }
    if args.no_cache {
        config.run.use_cache = false;
    }
    if let Some(dir) = &args.cache_dir {
        config.run.cache_dir = dir.clone();
    }
    if let Some(dir) = &args.output_dir {
        config.run.output_dir = dir.clone();
    }

    if config.data.panel.is_none() && config.data.synthetic.is_none() {
        bail!("no panel: pass --panel <csv>, --synthetic, or a --config with a data source");
    }
    config.validate()?;
    tracing::debug!(
        config_hash = %config.config_hash(),
        pairs = config.pairs().len(),
        "configuration resolved"
    );
    Ok(config)
}

fn run_cmd(args: RunArgs) -> Result<()> {
    let config = build_config(&args)?;
    let output = run_analysis(&config, args.force)?;

    print_summary(&output);

    if !args.no_save {
        let run_dir = save_artifacts(
            &output.sweep,
            output.comparison.as_ref(),
            &config,
            &config.run.output_dir,
        )?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

fn run_generate(
    out: &Path,
    symbols: usize,
    months: usize,
    start: &str,
    missing: f64,
    seed: String,
) -> Result<()> {
    if !(0.0..=1.0).contains(&missing) {
        bail!("--missing must be between 0 and 1, got {missing}");
    }
    let config = SyntheticConfig {
        n_symbols: symbols,
        n_months: months,
        start: parse_date(start)?,
        missing_probability: missing,
        seed,
    };
    let panel = generate_synthetic_panel(&config)?;
    std::fs::write(out, export_panel_csv(&panel)?)
        .with_context(|| format!("failed to write {}", out.display()))?;

    println!(
        "Wrote {} months x {} symbols to {} (hash {})",
        panel.len(),
        panel.symbol_count(),
        out.display(),
        DatasetHash::of_panel(&panel).short()
    );
    Ok(())
}

fn run_cache_status(cache_dir: &Path) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }

    let entries = PanelCache::new(cache_dir).status()?;
    if entries.is_empty() {
        println!("Cache is empty: {}", cache_dir.display());
        return Ok(());
    }

    let total: u64 = entries.iter().map(|e| e.size_bytes).sum();
    println!("Cache: {}", cache_dir.display());
    println!("Panels: {}", entries.len());
    println!("Total size: {}", format_size(total));
    println!();
    println!(
        "{:<12} {:<25} {:<16} {:>10}  Source",
        "Key", "Date Range", "Shape", "Size"
    );
    println!("{}", "-".repeat(80));
    for entry in &entries {
        let key = &entry.key[..entry.key.len().min(12)];
        let (range, shape, source) = match &entry.meta {
            Some(meta) => (
                format!("{} to {}", meta.start, meta.end),
                format!("{} x {}", meta.rows, meta.symbols),
                meta.source.display().to_string(),
            ),
            None => ("(no meta)".into(), "-".into(), String::new()),
        };
        let flag = if entry.quarantined { " [quarantined]" } else { "" };
        println!(
            "{:<12} {:<25} {:<16} {:>10}  {source}{flag}",
            key,
            range,
            shape,
            format_size(entry.size_bytes)
        );
    }
    Ok(())
}

fn run_cache_clear(cache_dir: &Path, confirm: bool) -> Result<()> {
    let cache = PanelCache::new(cache_dir);
    let entries = cache.status()?;
    if entries.is_empty() {
        println!("Nothing to remove in {}", cache_dir.display());
        return Ok(());
    }

    let total: u64 = entries.iter().map(|e| e.size_bytes).sum();
    println!(
        "Found {} cached panel(s), {}",
        entries.len(),
        format_size(total)
    );

    if !confirm {
        println!();
        println!("Dry run: pass --confirm to actually delete.");
        return Ok(());
    }

    let removed = cache.clear()?;
    println!("Done. Removed {removed} panel(s).");
    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

fn print_summary(output: &AnalysisOutput) {
    let summary = output.sweep.summary();
    let best = output.sweep.best_row().map(|r| (r.formation, r.holding));

    println!();
    println!("=== J/K Momentum Summary ===");
    println!(
        "Data:     {:?}, {} months x {} stocks (hash {})",
        output.source,
        output.panel_rows,
        output.panel_symbols,
        output.dataset_hash.short()
    );
    println!(
        "Pairs:    {} evaluated, {} with portfolios",
        output.sweep.len(),
        summary.len()
    );
    println!();

    if summary.is_empty() {
        println!("No pair produced portfolios.");
    } else {
        println!(
            "{:>3}  {:>3} {:>3}  {:>10} {:>10} {:>10} {:>7}",
            "#", "J", "K", "Winner %", "Loser %", "Spread %", "Months"
        );
        println!("{}", "-".repeat(54));
        for row in summary.rows() {
            let marker = if best == Some((row.formation, row.holding)) {
                " *"
            } else {
                ""
            };
            println!(
                "{:>3}  {:>3} {:>3}  {:>10.4} {:>10.4} {:>10.4} {:>7}{marker}",
                row.serial,
                row.formation,
                row.holding,
                round4(row.mean_winner),
                round4(row.mean_loser),
                round4(row.spread),
                row.months
            );
        }
    }

    if let Some(row) = output.sweep.best_row() {
        println!();
        println!(
            "Best pair: J={}, K={} (spread {:.4}%)",
            row.formation,
            row.holding,
            round4(row.spread)
        );
    }

    if let Some(c) = &output.comparison {
        if let (Some(spread), Some(bench)) = (c.final_spread_growth(), c.final_benchmark_growth()) {
            println!(
                "Growth of 1 over {} months: spread {:.4}, benchmark {:.4}",
                c.points.len(),
                spread,
                bench
            );
        }
    }

    if output.is_synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    for warn in output.sweep.warnings() {
        println!("WARNING: {warn}");
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn write_config(content: &str) -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let path =
            std::env::temp_dir().join(format!("jklab_cli_test_{}_{id}.toml", std::process::id()));
        std::fs::write(&path, content).unwrap();
        path
    }

    fn run_args(argv: &[&str]) -> RunArgs {
        let cli = Cli::try_parse_from(std::iter::once("jklab").chain(argv.iter().copied()))
            .unwrap();
        match cli.command {
            Commands::Run(args) => args,
            _ => panic!("expected the run command"),
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    const CONFIG: &str = r#"
[data]
panel = "data/stocks.csv"
start_date = "2010-01-01"
end_date = "2020-12-31"

[strategy]
formation_periods = [6]
holding_periods = [3]
cutoff = "2018-12-31"
"#;

    #[test]
    fn end_flag_keeps_cutoff_from_config_file() {
        let path = write_config(CONFIG);
        let args = run_args(&["run", "--config", path.to_str().unwrap(), "--end", "2019-06-30"]);

        let config = build_config(&args).unwrap();

        assert_eq!(config.data.end_date, d(2019, 6, 30));
        assert_eq!(config.effective_cutoff(), d(2018, 12, 31));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn cutoff_follows_end_flag_when_unset() {
        let path = write_config(&CONFIG.replace("cutoff = \"2018-12-31\"\n", ""));
        let args = run_args(&["run", "--config", path.to_str().unwrap(), "--end", "2019-06-30"]);
        assert_eq!(build_config(&args).unwrap().effective_cutoff(), d(2019, 6, 30));

        let args = run_args(&["run", "--synthetic", "--end", "2019-06-30"]);
        assert_eq!(build_config(&args).unwrap().effective_cutoff(), d(2019, 6, 30));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn cutoff_flag_overrides_everything() {
        let path = write_config(CONFIG);
        let args = run_args(&[
            "run",
            "--config",
            path.to_str().unwrap(),
            "--end",
            "2019-06-30",
            "--cutoff",
            "2017-12-31",
        ]);
        assert_eq!(build_config(&args).unwrap().effective_cutoff(), d(2017, 12, 31));
        let _ = std::fs::remove_file(&path);
    }
}
