//! Evaluation report: the JSON artifact of one sweep + selection run.
//!
//! Besides the JSON document, `save_artifacts` writes the full matrix as CSV
//! and a short Markdown summary next to it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use sweeplab_core::SweepResult;

use crate::config::SelectionMetric;
use crate::selector::{
    RankedParameterization, Recommendation, SelectionOutcome, TrainingAverage, ValidationOutcome,
};
use crate::sweep::SweepMatrix;

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationSection {
    pub best_period: String,
    pub training_avg: TrainingAverage,
    pub selection_metric: SelectionMetric,
    #[serde(default)]
    pub ranking: Vec<RankedParameterization>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub optimization: OptimizationSection,
    pub validation: ValidationOutcome,
    pub full_matrix: BTreeMap<String, SweepResult>,
    pub recommendation: Recommendation,
    #[serde(default)]
    pub benchmarks: BTreeMap<i32, f64>,
    #[serde(default)]
    pub missing_cells: Vec<String>,
    pub config_hash: String,
    #[serde(default)]
    pub dataset_hash: String,
}

impl EvaluationReport {
    pub fn new(
        matrix: SweepMatrix,
        outcome: SelectionOutcome,
        selection_metric: SelectionMetric,
        config_hash: String,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            optimization: OptimizationSection {
                best_period: outcome.best_period,
                training_avg: outcome.training_avg,
                selection_metric,
                ranking: outcome.ranking,
            },
            validation: outcome.validation,
            full_matrix: matrix.cells,
            recommendation: outcome.recommendation,
            benchmarks: matrix.benchmarks,
            missing_cells: matrix.missing,
            config_hash,
            dataset_hash: matrix.dataset_hash,
        }
    }
}

// ─── JSON ───────────────────────────────────────────────────────────

pub fn export_json(report: &EvaluationReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize EvaluationReport to JSON")
}

/// Deserialize a report, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<EvaluationReport> {
    let report: EvaluationReport =
        serde_json::from_str(json).context("failed to deserialize EvaluationReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV ────────────────────────────────────────────────────────────

/// One row per matrix cell, in key order.
pub fn export_matrix_csv(matrix: &BTreeMap<String, SweepResult>) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "cell",
        "total_return_pct",
        "win_rate",
        "avg_return",
        "sharpe_ratio",
        "max_drawdown",
        "profit_factor",
        "trade_count",
        "final_capital",
    ])?;
    for (key, r) in matrix {
        writer.write_record([
            key.clone(),
            format!("{:.4}", r.total_return_pct),
            format!("{:.2}", r.win_rate),
            format!("{:.4}", r.avg_return),
            format!("{:.4}", r.sharpe_ratio),
            format!("{:.4}", r.max_drawdown),
            format!("{:.4}", r.profit_factor),
            r.trade_count.to_string(),
            format!("{:.2}", r.final_capital),
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("failed to flush matrix CSV: {e}"))?;
    String::from_utf8(bytes).context("matrix CSV is not UTF-8")
}

// ─── Markdown ───────────────────────────────────────────────────────

pub fn generate_summary(report: &EvaluationReport) -> String {
    let mut md = String::with_capacity(1024);
    let opt = &report.optimization;

    md.push_str("# Evaluation Report\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Best parameterization | {} |\n", opt.best_period));
    md.push_str(&format!(
        "| Training years | {:?} |\n",
        opt.training_avg.years_used
    ));
    md.push_str(&format!(
        "| Training avg Sharpe | {:.3} |\n",
        opt.training_avg.avg_sharpe
    ));
    md.push_str(&format!(
        "| Training avg return | {:.2}% |\n",
        opt.training_avg.avg_return_pct
    ));
    md.push_str(&format!("| Validation year | {} |\n", report.validation.year));
    match &report.validation.result {
        Some(r) => md.push_str(&format!(
            "| Validation return | {:.2}% ({} trades) |\n",
            r.total_return_pct, r.trade_count
        )),
        None => md.push_str("| Validation return | n/a |\n"),
    }
    if let Some(d) = report.validation.degradation_pct {
        md.push_str(&format!("| Degradation | {d:.1}% |\n"));
    }
    md.push_str(&format!("| Verdict | {:?} |\n", report.validation.verdict));
    md.push_str(&format!(
        "| Recommendation | **{:?}** |\n",
        report.recommendation
    ));
    md.push_str(&format!("| Config hash | {} |\n", report.config_hash));
    md.push('\n');

    if !opt.ranking.is_empty() {
        md.push_str("## Ranking\n\n");
        md.push_str("| # | Parameterization | Score | Avg return | Avg trades |\n");
        md.push_str("| --- | --- | --- | --- | --- |\n");
        for (i, r) in opt.ranking.iter().enumerate() {
            md.push_str(&format!(
                "| {} | {} | {:.3} | {:.2}% | {:.1} |\n",
                i + 1,
                r.id,
                r.score,
                r.training_avg.avg_return_pct,
                r.training_avg.avg_trades
            ));
        }
        md.push('\n');
    }

    if !report.missing_cells.is_empty() {
        md.push_str("## Missing cells\n\n");
        for key in &report.missing_cells {
            md.push_str(&format!("- {key}\n"));
        }
        md.push('\n');
    }
    md
}

// ─── Artifacts ──────────────────────────────────────────────────────

/// Write `report.json`, `matrix.csv` and `summary.md` into `output_dir`.
///
/// Returns the path of `report.json`.
pub fn save_artifacts(report: &EvaluationReport, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;

    let json_path = output_dir.join("report.json");
    std::fs::write(&json_path, export_json(report)?)
        .with_context(|| format!("failed to write {}", json_path.display()))?;
    std::fs::write(
        output_dir.join("matrix.csv"),
        export_matrix_csv(&report.full_matrix)?,
    )?;
    std::fs::write(output_dir.join("summary.md"), generate_summary(report))?;
    Ok(json_path)
}

pub fn load_report(path: &Path) -> Result<EvaluationReport> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}
