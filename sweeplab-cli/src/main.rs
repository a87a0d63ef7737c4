//! SweepLab CLI: sweep and config-check commands.
//!
//! Commands:
//! - `sweep`: run the {years} × {exit parameterizations} sweep, select on
//!   training years, validate, and write the report artifacts
//! - `check-config`: load and validate a config without running anything

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use sweeplab_runner::report::save_artifacts;
use sweeplab_runner::{init_tracing, run_evaluation, EvaluationConfig, EvaluationReport};

#[derive(Parser)]
#[command(
    name = "sweeplab",
    about = "SweepLab CLI, exit/sizing combination sweeps with train/validation selection"
)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full sweep and write report.json, matrix.csv and summary.md.
    Sweep {
        /// Path to a .toml or .json evaluation config.
        #[arg(long)]
        config: PathBuf,

        /// Directory holding one signal file per year.
        #[arg(long)]
        signals_dir: PathBuf,

        /// Directory holding candles_{timeframe}.csv tables.
        #[arg(long, default_value = "data/candles")]
        candles_dir: PathBuf,

        /// Output directory for the report artifacts.
        #[arg(long, default_value = "results")]
        output: PathBuf,

        /// Run cells one at a time instead of on the rayon pool.
        #[arg(long, default_value_t = false)]
        serial: bool,
    },
    /// Load and validate a config, then print what a sweep would run.
    CheckConfig {
        /// Path to a .toml or .json evaluation config.
        #[arg(long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Sweep {
            config,
            signals_dir,
            candles_dir,
            output,
            serial,
        } => run_sweep_cmd(&config, &signals_dir, &candles_dir, &output, serial),
        Commands::CheckConfig { config } => run_check_config(&config),
    }
}

fn load_config(path: &Path) -> Result<EvaluationConfig> {
    EvaluationConfig::from_path(path)
        .with_context(|| format!("invalid evaluation config {}", path.display()))
}

fn run_sweep_cmd(
    config_path: &Path,
    signals_dir: &Path,
    candles_dir: &Path,
    output: &Path,
    serial: bool,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if serial {
        config.parallel = false;
    }
    info!(config = %config_path.display(), hash = %config.config_hash(), "config loaded");

    let report = run_evaluation(&config, signals_dir, candles_dir)
        .with_context(|| format!("evaluation failed for signals in {}", signals_dir.display()))?;

    print_summary(&report);

    let path = save_artifacts(&report, output)?;
    println!("Report saved to: {}", path.display());
    Ok(())
}

fn run_check_config(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let cells = config.years.len() * config.exit_parameterizations.len();

    println!("Config OK: {}", config_path.display());
    println!("  Hash:       {}", config.config_hash());
    println!("  Timeframe:  {}", config.timeframe);
    println!("  Years:      {:?}", config.years);
    println!(
        "  Train:      {:?}  Validation: {}",
        config.train_years, config.validation_year
    );
    println!("  Sizing:     {}", config.position_sizing.kind());
    println!("  Cells:      {cells}");
    for param in &config.exit_parameterizations {
        println!("    - {:<24} {}", param.id, param.policy.kind());
    }
    Ok(())
}

fn print_summary(report: &EvaluationReport) {
    let opt = &report.optimization;
    println!();
    println!("=== Evaluation ===");
    println!(
        "Best parameterization: {} (training years {:?})",
        opt.best_period, opt.training_avg.years_used
    );
    println!(
        "Training avg:          Sharpe {:.3}  Return {:.2}%  Trades {:.1}  Win {:.1}%",
        opt.training_avg.avg_sharpe,
        opt.training_avg.avg_return_pct,
        opt.training_avg.avg_trades,
        opt.training_avg.avg_win_rate
    );
    match &report.validation.result {
        Some(r) => println!(
            "Validation {}:       Return {:.2}%  Trades {}  Win {:.1}%  MaxDD {:.2}%",
            report.validation.year, r.total_return_pct, r.trade_count, r.win_rate, r.max_drawdown
        ),
        None => println!("Validation {}:       no data", report.validation.year),
    }
    if let Some(d) = report.validation.degradation_pct {
        println!("Degradation:           {d:.1}%");
    }
    println!("Verdict:               {:?}", report.validation.verdict);
    println!("Recommendation:        {:?}", report.recommendation);
    if !report.missing_cells.is_empty() {
        println!("Missing cells:         {}", report.missing_cells.len());
    }
    println!();
}
