/// Integration tests for the offline training pipeline
///
/// These tests verify:
/// 1. Full pipeline: history file → features → balance → fit → artifacts
/// 2. Repeat runs over the same file produce the same model
/// 3. A failed run leaves no artifact behind
/// 4. The service refuses artifacts from two different runs
///
/// Everything runs in temporary directories; no network or database needed.

use floodpred_service::artifact::{ArtifactError, ArtifactSlot, ArtifactStore};
use floodpred_service::config::{ArtifactConfig, Config, TrainingConfig};
use floodpred_service::predictor::Predictor;
use floodpred_service::trainer::{TrainingError, run_training};

use chrono::{Datelike, Duration, NaiveDate};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Two years of daily rainfall with a storm every 40 days.
fn write_history(path: &Path, days: usize) {
    let start = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap();
    let mut csv = String::from("Product code,Year,Month,Day,Rainfall amount (millimetres),Quality\n");
    for i in 0..days {
        let date = start + Duration::days(i as i64);
        let storm = match i % 40 {
            0..=3 => [30.0, 55.0, 80.0][(i / 40) % 3] - (i % 40) as f64 * 4.0,
            _ => 0.0,
        };
        let drizzle = ((i * 13) % 7) as f64 * 0.5;
        csv.push_str(&format!(
            "IDCJAC0009,{},{},{},{:.1},Y\n",
            date.year(),
            date.month(),
            date.day(),
            storm + drizzle
        ));
    }
    fs::write(path, csv).unwrap();
}

fn test_config(dir: &Path, input: &Path) -> Config {
    Config {
        artifacts: ArtifactConfig {
            directory: dir.join("artifacts"),
            ..ArtifactConfig::default()
        },
        training: TrainingConfig {
            input_path: input.to_path_buf(),
            n_trees: 10,
            workers: 2,
            ..TrainingConfig::default()
        },
        ..Config::default()
    }
}

#[test]
fn test_training_writes_loadable_artifacts() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("history.csv");
    write_history(&input, 730);
    let config = test_config(dir.path(), &input);

    let outcome = run_training(&config).unwrap();
    assert_eq!(outcome.report.rows_read, 730);
    assert!(outcome.report.balance.minority_rows > 0);
    assert_eq!(
        outcome.report.balance.upsampled_minority_rows,
        outcome.report.balance.majority_rows
    );

    assert!(config.artifacts.model_path().exists());
    assert!(config.artifacts.scaler_path().exists());

    let predictor = Predictor::load(&ArtifactStore::from_config(&config.artifacts)).unwrap();
    assert_eq!(predictor.artifact().header.run_id, outcome.report.run_id);
    assert_eq!(predictor.artifact().forest, outcome.artifact.forest);

    let predictions = predictor
        .predict_body(r#"{"rain_data": [[2023,1,1,50],[2023,1,2,60],[2023,1,3,40]]}"#)
        .unwrap();
    assert_eq!(predictions.len(), 3);
    assert_eq!(predictions[1].date, "2023-01-02");
}

#[test]
fn test_training_is_reproducible() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("history.csv");
    write_history(&input, 500);
    let config = test_config(dir.path(), &input);

    let first = run_training(&config).unwrap();
    let second = run_training(&config).unwrap();

    assert_eq!(first.report.accuracy, second.report.accuracy);
    assert_eq!(first.report.feature_importances, second.report.feature_importances);
    assert_eq!(first.report.run_id, second.report.run_id);
    assert_eq!(first.artifact.forest, second.artifact.forest);
}

#[test]
fn test_failed_run_removes_previous_artifacts() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("history.csv");
    write_history(&input, 400);
    let config = test_config(dir.path(), &input);
    run_training(&config).unwrap();

    fs::write(&input, "Year,Month,Day,Rainfall amount (millimetres)\n2023,1,1,lots\n").unwrap();
    let err = run_training(&config).unwrap_err();
    assert!(matches!(err, TrainingError::Input(_)), "{}", err);

    assert!(!config.artifacts.model_path().exists());
    assert!(!config.artifacts.scaler_path().exists());
    assert!(matches!(
        Predictor::load(&ArtifactStore::from_config(&config.artifacts)),
        Err(ArtifactError::Missing { .. })
    ));
}

#[test]
fn test_missing_input_is_reported() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), &dir.path().join("absent.csv"));
    assert!(matches!(run_training(&config), Err(TrainingError::ReadInput { .. })));
}

#[test]
fn test_artifacts_from_different_runs_are_rejected() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("history.csv");
    write_history(&input, 400);

    let config_a = test_config(&dir.path().join("a"), &input);
    let mut config_b = test_config(&dir.path().join("b"), &input);
    config_b.training.seed = 7;
    run_training(&config_a).unwrap();
    run_training(&config_b).unwrap();

    let store_b = ArtifactStore::from_config(&config_b.artifacts);
    fs::copy(config_a.artifacts.scaler_path(), store_b.path(ArtifactSlot::Scaler)).unwrap();

    assert!(matches!(Predictor::load(&store_b), Err(ArtifactError::Mismatch(_))));
}
