//! End-to-end: signal JSON files and a candle CSV on disk through to the report.

use std::fmt::Write as _;
use std::path::Path;

use sweeplab_runner::report::{load_report, save_artifacts};
use sweeplab_runner::{
    run_evaluation, EvaluationConfig, OverfittingVerdict, Recommendation, RunError,
};

const CONFIG: &str = r#"
initial_capital = 10000.0
fee_rate = 0.0
slippage = 0.0
years = [2022, 2023, 2024]
train_years = [2022, 2023]
validation_year = 2024
timeframe = "day"
signal_file_pattern = "signals_{year}.json"

[position_sizing]
type = "fixed"
params = { fraction = 1.0 }

[[exit_parameterizations]]
id = "fixed_10_5"
policy = { type = "fixed", take_profit = 0.10, stop_loss = -0.05 }

[[exit_parameterizations]]
id = "fixed_20_5"
policy = { type = "fixed", take_profit = 0.20, stop_loss = -0.05 }
"#;

/// One buy on Jan 1 at 100; price climbs 3 per day for ten days.
fn write_year(dir: &Path, candles: &mut String, year: i32) {
    let signals = format!(
        r#"{{
  "metadata": {{"strategy": "breakout", "timeframe": "day", "generated_at": "{year}-01-01 00:00:00", "statistics": {{}}}},
  "signals": [
    {{"timestamp": "{year}-01-01 00:00:00", "action": "BUY", "price": 100, "score": 70.0, "confidence": 80.0, "metadata": {{}}}},
    {{"timestamp": "{year}-01-02 00:00:00", "action": "SELL", "price": 103, "score": 10.0, "confidence": 20.0, "metadata": {{}}}}
  ]
}}"#
    );
    std::fs::write(dir.join(format!("signals_{year}.json")), signals).unwrap();

    for day in 0..10 {
        let open = 100.0 + 3.0 * day as f64;
        let close = open + 3.0;
        writeln!(
            candles,
            "{year}-01-{:02} 00:00:00,{open},{close},{open},{close},1000",
            day + 1
        )
        .unwrap();
    }
}

fn fixture(years: &[i32]) -> (tempfile::TempDir, EvaluationConfig) {
    let root = tempfile::tempdir().unwrap();
    let signals = root.path().join("signals");
    let candles_dir = root.path().join("candles");
    std::fs::create_dir_all(&signals).unwrap();
    std::fs::create_dir_all(&candles_dir).unwrap();

    let mut candles = String::from("timestamp,open,high,low,close,volume\n");
    for &year in years {
        write_year(&signals, &mut candles, year);
    }
    std::fs::write(candles_dir.join("candles_day.csv"), candles).unwrap();

    let config_path = root.path().join("eval.toml");
    std::fs::write(&config_path, CONFIG).unwrap();
    let config = EvaluationConfig::from_path(&config_path).unwrap();
    (root, config)
}

#[test]
fn full_evaluation_from_disk() {
    let (root, config) = fixture(&[2022, 2023, 2024]);
    let report = run_evaluation(
        &config,
        &root.path().join("signals"),
        &root.path().join("candles"),
    )
    .unwrap();

    assert_eq!(report.full_matrix.len(), 6);
    assert!(report.missing_cells.is_empty());

    // fixed_10_5 exits at 110 on day 4; fixed_20_5 exits at 120 on day 7
    let ten = &report.full_matrix["2022_fixed_10_5"];
    assert_eq!(ten.trade_count, 1);
    assert!((ten.total_return_pct - 10.0).abs() < 1e-9);
    let twenty = &report.full_matrix["2023_fixed_20_5"];
    assert!((twenty.total_return_pct - 20.0).abs() < 1e-9);

    // Single-trade Sharpe is 0 everywhere, so ties go to config order
    assert_eq!(report.optimization.best_period, "fixed_10_5");
    assert_eq!(report.optimization.training_avg.years_used, vec![2022, 2023]);
    assert!((report.optimization.training_avg.avg_return_pct - 10.0).abs() < 1e-9);

    assert_eq!(report.validation.year, 2024);
    assert_eq!(report.validation.verdict, OverfittingVerdict::Passed);
    assert!(report.validation.degradation_pct.unwrap().abs() < 1e-9);
    // Buy-and-hold made 30% each year, so the floor is not beaten
    assert!((report.benchmarks[&2024] - 30.0).abs() < 1e-9);
    assert_eq!(report.recommendation, Recommendation::Optimize);
    assert_eq!(report.config_hash, config.config_hash());

    let out = root.path().join("out");
    let path = save_artifacts(&report, &out).unwrap();
    assert_eq!(load_report(&path).unwrap(), report);
    assert!(out.join("matrix.csv").is_file());
}

#[test]
fn missing_year_is_a_gap_not_a_failure() {
    let (root, config) = fixture(&[2022, 2024]);
    let report = run_evaluation(
        &config,
        &root.path().join("signals"),
        &root.path().join("candles"),
    )
    .unwrap();

    assert_eq!(report.full_matrix.len(), 4);
    assert_eq!(
        report.missing_cells,
        vec!["2023_fixed_10_5".to_string(), "2023_fixed_20_5".to_string()]
    );
    assert_eq!(report.optimization.training_avg.years_used, vec![2022]);
}

#[test]
fn unreadable_signal_directory_is_fatal() {
    let (root, config) = fixture(&[2022]);
    let result = run_evaluation(
        &config,
        &root.path().join("does_not_exist"),
        &root.path().join("candles"),
    );
    assert!(matches!(result, Err(RunError::Data(_))));
}

#[test]
fn malformed_signal_file_becomes_a_gap() {
    let (root, config) = fixture(&[2022, 2023, 2024]);
    std::fs::write(root.path().join("signals/signals_2023.json"), "{ not json").unwrap();
    let report = run_evaluation(
        &config,
        &root.path().join("signals"),
        &root.path().join("candles"),
    )
    .unwrap();
    assert_eq!(report.missing_cells.len(), 2);
    assert!(report.full_matrix.contains_key("2024_fixed_10_5"));
}
