/// Offline training pipeline
///
/// Builds a `TrainedArtifact` from a daily rainfall history:
///
/// 1. **Delete first** - remove both artifact slots before anything else, so
///    a run that fails part way leaves no artifact instead of a stale one
/// 2. **Read** - parse the history file (fatal on malformed input)
/// 3. **Derive + label** - cumulative features, severity from cumulative_14
/// 4. **Balance** - upsample flood days (severity > 0) with replacement to the
///    number of dry days
/// 5. **Split** - shuffled 80/20 train/test
/// 6. **Fit** - standard scaler on the train rows, then the random forest on
///    the scaled train rows
/// 7. **Persist** - scaler slot, then model slot
/// 8. **Report** - test accuracy and feature importances (diagnostic only)
///
/// Balancing, splitting and the forest are each seeded with the configured
/// seed, so two runs over the same file produce the same model.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;

use crate::analysis::features::{derive_features, feature_matrix};
use crate::analysis::severity::label_features;
use crate::artifact::{ArtifactError, ArtifactHeader, ArtifactStore, TrainedArtifact, feature_schema_fingerprint};
use crate::config::{Config, TrainingConfig};
use crate::ingest::rainfall_csv::parse_rainfall_csv;
use crate::ml::sampling::{resample_with_replacement, seeded_rng, train_test_split};
use crate::ml::{MlError, RandomForest, StandardScaler};
use crate::model::{FEATURE_NAMES, FeatureRow, FloodSeverity, InputValidationError, RainfallRecord};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One labelled feature row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabeledRow {
    pub features: FeatureRow,
    pub severity: FloodSeverity,
}

/// Row counts before and after class balancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BalanceSummary {
    /// Rows with severity 0.
    pub majority_rows: usize,
    /// Rows with severity > 0, before upsampling.
    pub minority_rows: usize,
    /// Rows with severity > 0, after upsampling.
    pub upsampled_minority_rows: usize,
}

impl BalanceSummary {
    pub fn total_rows(&self) -> usize {
        self.majority_rows + self.upsampled_minority_rows
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Diagnostic output of a training run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub run_id: String,
    pub rows_read: usize,
    /// Rows per severity (0..=3) before balancing.
    pub severity_counts: [usize; FloodSeverity::COUNT],
    pub balance: BalanceSummary,
    pub train_rows: usize,
    pub test_rows: usize,
    /// Fraction of held-out rows classified correctly.
    pub accuracy: f64,
    /// Sorted by importance, highest first.
    pub feature_importances: Vec<FeatureImportance>,
}

/// A fitted artifact and the report describing it.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub artifact: TrainedArtifact,
    pub report: TrainingReport,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum TrainingError {
    /// The history file could not be read.
    ReadInput { path: PathBuf, source: io::Error },
    /// The history file is malformed.
    Input(InputValidationError),
    /// The history file has a header but no rows.
    EmptyDataset,
    /// Too few rows remain after balancing to hold out a test set.
    InsufficientData { rows: usize },
    Model(MlError),
    Artifact(ArtifactError),
}

impl fmt::Display for TrainingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainingError::ReadInput { path, source } => {
                write!(f, "Failed to read training data {}: {}", path.display(), source)
            }
            TrainingError::Input(e) => write!(f, "Invalid training data: {}", e),
            TrainingError::EmptyDataset => write!(f, "Training data contains no rows"),
            TrainingError::InsufficientData { rows } => {
                write!(f, "Need at least 2 rows after balancing, found {}", rows)
            }
            TrainingError::Model(e) => write!(f, "Model fitting failed: {}", e),
            TrainingError::Artifact(e) => write!(f, "Artifact error: {}", e),
        }
    }
}

impl std::error::Error for TrainingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TrainingError::ReadInput { source, .. } => Some(source),
            TrainingError::Input(e) => Some(e),
            TrainingError::Model(e) => Some(e),
            TrainingError::Artifact(e) => Some(e),
            _ => None,
        }
    }
}

impl From<InputValidationError> for TrainingError {
    fn from(e: InputValidationError) -> Self {
        TrainingError::Input(e)
    }
}

impl From<MlError> for TrainingError {
    fn from(e: MlError) -> Self {
        TrainingError::Model(e)
    }
}

impl From<ArtifactError> for TrainingError {
    fn from(e: ArtifactError) -> Self {
        TrainingError::Artifact(e)
    }
}

// ---------------------------------------------------------------------------
// Pipeline steps
// ---------------------------------------------------------------------------

/// Derives features and severity labels for a history, in input order.
pub fn label_history(records: &[RainfallRecord]) -> Result<Vec<LabeledRow>, InputValidationError> {
    let features = derive_features(records)?;
    let labels = label_features(&features);
    Ok(feature_matrix(&features)
        .into_iter()
        .zip(labels)
        .map(|(features, severity)| LabeledRow { features, severity })
        .collect())
}

/// Upsamples flood rows (severity > 0, all classes pooled) with replacement
/// until they number as many as the dry rows.
///
/// Returns dry rows followed by the upsampled flood rows. If either group is
/// empty there is nothing to balance against and the rows are returned
/// unchanged.
pub fn balance_classes(rows: Vec<LabeledRow>, seed: u64) -> (Vec<LabeledRow>, BalanceSummary) {
    let (mut majority, minority): (Vec<LabeledRow>, Vec<LabeledRow>) =
        rows.into_iter().partition(|r| r.severity == FloodSeverity::None);

    let upsampled = if majority.is_empty() || minority.is_empty() {
        log::warn!(
            "Class balancing skipped: {} dry rows, {} flood rows",
            majority.len(),
            minority.len()
        );
        minority.clone()
    } else {
        resample_with_replacement(&minority, majority.len(), &mut seeded_rng(seed))
    };

    let summary = BalanceSummary {
        majority_rows: majority.len(),
        minority_rows: minority.len(),
        upsampled_minority_rows: upsampled.len(),
    };
    majority.extend(upsampled);
    (majority, summary)
}

/// Deterministic identifier for a training run over `records` with `config`.
pub fn compute_run_id(records: &[RainfallRecord], config: &TrainingConfig) -> String {
    let mut hasher = Sha256::new();
    hasher.update(feature_schema_fingerprint().as_bytes());
    for r in records {
        hasher.update(r.year.to_le_bytes());
        hasher.update(r.month.to_le_bytes());
        hasher.update(r.day.to_le_bytes());
        hasher.update(r.rainfall_mm.to_bits().to_le_bytes());
    }
    hasher.update(config.seed.to_le_bytes());
    hasher.update(config.test_fraction.to_bits().to_le_bytes());
    hasher.update((config.n_trees as u64).to_le_bytes());
    hasher.update((config.max_depth as u64).to_le_bytes());
    hex::encode(hasher.finalize())
}

/// Fits a scaler and forest on `records`. Performs no file I/O.
pub fn fit(records: &[RainfallRecord], config: &TrainingConfig) -> Result<TrainingOutcome, TrainingError> {
    if records.is_empty() {
        return Err(TrainingError::EmptyDataset);
    }

    let labeled = label_history(records)?;
    let mut severity_counts = [0usize; FloodSeverity::COUNT];
    for row in &labeled {
        severity_counts[row.severity.class_index()] += 1;
    }
    log::info!(
        "Labelled {} rows (none/minor/moderate/major = {:?})",
        labeled.len(),
        severity_counts
    );

    let (balanced, balance) = balance_classes(labeled, config.seed);
    if balanced.len() < 2 {
        return Err(TrainingError::InsufficientData { rows: balanced.len() });
    }
    log::info!(
        "Balanced: {} dry rows + {} flood rows (upsampled from {})",
        balance.majority_rows,
        balance.upsampled_minority_rows,
        balance.minority_rows
    );

    let (train, test) = train_test_split(balanced, config.test_fraction, &mut seeded_rng(config.seed));
    let train_x: Vec<FeatureRow> = train.iter().map(|r| r.features).collect();
    let train_y: Vec<usize> = train.iter().map(|r| r.severity.class_index()).collect();
    let test_x: Vec<FeatureRow> = test.iter().map(|r| r.features).collect();
    let test_y: Vec<usize> = test.iter().map(|r| r.severity.class_index()).collect();

    let scaler = StandardScaler::fit(&train_x)?;
    let train_scaled = scaler.transform(&train_x)?;
    let test_scaled = scaler.transform(&test_x)?;

    let params = config.forest_params();
    log::info!(
        "Fitting {} trees (max depth {}) on {} rows",
        params.n_trees,
        params.max_depth,
        train_scaled.len()
    );
    let forest = RandomForest::fit(&train_scaled, &train_y, FloodSeverity::COUNT, &params)?;
    let accuracy = forest.score(&test_scaled, &test_y);

    let mut feature_importances: Vec<FeatureImportance> = FEATURE_NAMES
        .iter()
        .zip(&forest.feature_importances)
        .map(|(name, &importance)| FeatureImportance {
            feature: name.to_string(),
            importance,
        })
        .collect();
    // Stable sort: equal importances keep matrix column order.
    feature_importances.sort_by(|a, b| b.importance.total_cmp(&a.importance));

    let run_id = compute_run_id(records, config);
    let report = TrainingReport {
        run_id: run_id.clone(),
        rows_read: records.len(),
        severity_counts,
        balance,
        train_rows: train_scaled.len(),
        test_rows: test_scaled.len(),
        accuracy,
        feature_importances,
    };

    Ok(TrainingOutcome {
        artifact: TrainedArtifact {
            header: ArtifactHeader::new(run_id),
            scaler,
            forest,
        },
        report,
    })
}

/// Runs the full training pipeline described in the module docs.
pub fn run_training(config: &Config) -> Result<TrainingOutcome, TrainingError> {
    let store = ArtifactStore::from_config(&config.artifacts);

    for path in store.remove_existing()? {
        log::info!("Removed previous artifact {}", path.display());
    }

    let input = &config.training.input_path;
    let text = fs::read_to_string(input).map_err(|source| TrainingError::ReadInput {
        path: input.clone(),
        source,
    })?;
    let records = parse_rainfall_csv(&text, &config.training.csv_options())?;
    log::info!("Read {} daily records from {}", records.len(), input.display());

    let outcome = fit(&records, &config.training)?;
    store.save(&outcome.artifact)?;
    log::info!(
        "Saved artifacts (run {}) to {} and {}",
        outcome.report.run_id,
        config.artifacts.scaler_path().display(),
        config.artifacts.model_path().display()
    );

    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
