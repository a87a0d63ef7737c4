//! Property tests for sweep completeness and selection rules.
//!
//! 1. Matrix completeness: every (year, parameterization) is either a cell or missing
//! 2. Selection: the best parameterization has the highest training score
//! 3. Recommendation: no validation cell always means discard

use chrono::NaiveDate;
use proptest::prelude::*;
use sweeplab_core::data::{InMemoryCandleStore, InMemorySignalRepository};
use sweeplab_core::domain::{Candle, Signal, SignalFile, Timeframe};
use sweeplab_core::{ExitPolicyConfig, SweepResult};
use sweeplab_runner::{
    cell_key, EvaluationConfig, ExitParameterization, OverfittingVerdict, Recommendation,
    SelectionMetric, SweepMatrix, SweepRunner, TrainValidationSelector, TrainingAverage,
};

const YEARS: [i32; 4] = [2020, 2021, 2022, 2023];

fn config(params: usize) -> EvaluationConfig {
    let toml = r#"
initial_capital = 10000.0
fee_rate = 0.001
years = [2020, 2021, 2022, 2023]
train_years = [2020, 2021, 2022]
validation_year = 2023

[[exit_parameterizations]]
id = "p0"
policy = { type = "fixed", take_profit = 0.01, stop_loss = -0.01 }
"#;
    let mut config = EvaluationConfig::from_toml_str(toml).unwrap();
    for i in 1..params {
        config.exit_parameterizations.push(ExitParameterization::new(
            format!("p{i}"),
            ExitPolicyConfig::Fixed {
                take_profit: 0.01 * (i + 1) as f64,
                stop_loss: -0.01,
            },
        ));
    }
    config
}

fn year_data(year: i32) -> (SignalFile, Vec<Candle>) {
    let candles: Vec<Candle> = (1..=20)
        .map(|d| {
            let ts = NaiveDate::from_ymd_opt(year, 3, d)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap();
            let open = 100.0 + (d as f64 * 1.3).sin() * 4.0;
            let close = 100.0 + ((d + 1) as f64 * 1.3).sin() * 4.0;
            Candle::new(ts, open, open.max(close) + 0.5, open.min(close) - 0.5, close, 1.0)
        })
        .collect();
    let signals = candles
        .iter()
        .step_by(3)
        .map(|c| Signal::buy(c.timestamp, c.open))
        .collect();
    (
        SignalFile {
            signals,
            ..SignalFile::default()
        },
        candles,
    )
}

proptest! {
    #[test]
    fn matrix_is_complete(present in prop::collection::vec(any::<bool>(), 4), params in 1usize..4) {
        let mut repo = InMemorySignalRepository::new();
        let mut table = Vec::new();
        for (year, keep) in YEARS.iter().zip(&present) {
            if *keep {
                let (signals, candles) = year_data(*year);
                repo.insert(*year, signals);
                table.extend(candles);
            }
        }
        let store = InMemoryCandleStore::new().with_table(Timeframe::day(), table);
        let matrix = SweepRunner::new(config(params))
            .unwrap()
            .with_parallelism(false)
            .run(&repo, &store)
            .unwrap();

        let loaded = present.iter().filter(|p| **p).count();
        prop_assert_eq!(matrix.len(), loaded * params);
        prop_assert_eq!(matrix.missing.len(), (YEARS.len() - loaded) * params);
        for (year, keep) in YEARS.iter().zip(&present) {
            for i in 0..params {
                let key = cell_key(*year, &format!("p{i}"));
                prop_assert_eq!(*keep, matrix.cells.contains_key(&key));
                prop_assert_eq!(!*keep, matrix.missing.contains(&key));
            }
        }
    }
}

fn arb_result() -> impl Strategy<Value = SweepResult> {
    (-50.0..50.0_f64, -3.0..3.0_f64, 0.0..100.0_f64, 0usize..40).prop_map(
        |(ret, sharpe, win_rate, trades)| SweepResult {
            total_return_pct: ret,
            sharpe_ratio: sharpe,
            win_rate,
            trade_count: trades,
            ..SweepResult::default()
        },
    )
}

/// Up to 4 parameterizations × 3 training years + 1 validation year, each cell optional.
fn arb_matrix() -> impl Strategy<Value = SweepMatrix> {
    prop::collection::vec(prop::option::of(arb_result()), 16).prop_map(|cells| {
        let mut matrix = SweepMatrix::default();
        for (i, cell) in cells.into_iter().enumerate() {
            if let Some(r) = cell {
                let year = YEARS[i % 4];
                matrix.cells.insert(cell_key(year, &format!("p{}", i / 4)), r);
            }
        }
        matrix
    })
}

fn selector(metric: SelectionMetric) -> TrainValidationSelector {
    TrainValidationSelector::new(
        vec![2020, 2021, 2022],
        2023,
        (0..4).map(|i| format!("p{i}")).collect(),
    )
    .with_metric(metric)
}

proptest! {
    #[test]
    fn best_has_highest_training_score(matrix in arb_matrix(), by_return in any::<bool>()) {
        let metric = if by_return { SelectionMetric::Return } else { SelectionMetric::Sharpe };
        let Ok(outcome) = selector(metric).select(&matrix) else {
            return Ok(());
        };
        let best = outcome.training_avg.score(metric);
        for i in 0..4 {
            if let Some(avg) = TrainingAverage::compute(&matrix, &format!("p{i}"), &[2020, 2021, 2022]) {
                prop_assert!(avg.score(metric) <= best);
            }
        }
        if outcome.validation.result.is_none() {
            prop_assert_eq!(outcome.validation.verdict, OverfittingVerdict::NoValidationData);
            prop_assert_eq!(outcome.recommendation, Recommendation::Discard);
        }
    }
}
