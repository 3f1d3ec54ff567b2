/// Online prediction over a loaded artifact
///
/// The request batch is treated as the entire history: days before the first
/// row contribute 0 mm to every lag. Each call derives features, scales them
/// with the trained scaler, classifies them with the trained forest and pairs
/// each class with the date of the row it came from. A failure anywhere
/// fails the whole batch.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::analysis::features::{derive_features, feature_matrix};
use crate::artifact::{ArtifactError, ArtifactStore, TrainedArtifact};
use crate::ml::MlError;
use crate::model::{FloodSeverity, InputValidationError, RainfallRecord};

/// Top-level request field holding the rows.
pub const RAIN_DATA_FIELD: &str = "rain_data";

/// One entry of the response array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyPrediction {
    /// `YYYY-MM-DD`
    pub date: String,
    pub prediction: FloodSeverity,
}

#[derive(Debug)]
pub enum PredictionError {
    Input(InputValidationError),
    Scaling(MlError),
    /// The forest returned a class outside the severity range.
    Inference(String),
}

impl fmt::Display for PredictionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictionError::Input(e) => write!(f, "{}", e),
            PredictionError::Scaling(e) => write!(f, "Feature scaling failed: {}", e),
            PredictionError::Inference(msg) => write!(f, "Inference failed: {}", msg),
        }
    }
}

impl std::error::Error for PredictionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PredictionError::Input(e) => Some(e),
            PredictionError::Scaling(e) => Some(e),
            PredictionError::Inference(_) => None,
        }
    }
}

impl From<InputValidationError> for PredictionError {
    fn from(e: InputValidationError) -> Self {
        PredictionError::Input(e)
    }
}

/// Parses a `{"rain_data": [[year, month, day, rainfall_mm], ...]}` body.
pub fn parse_request_body(body: &str) -> Result<Vec<RainfallRecord>, InputValidationError> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| InputValidationError::MalformedBody(e.to_string()))?;

    let rows = value
        .get(RAIN_DATA_FIELD)
        .ok_or_else(|| InputValidationError::MissingField(RAIN_DATA_FIELD.to_string()))?
        .as_array()
        .ok_or_else(|| InputValidationError::MalformedBody(format!("'{}' must be an array", RAIN_DATA_FIELD)))?;

    rows.iter()
        .enumerate()
        .map(|(row, value)| RainfallRecord::from_json_row(row, value))
        .collect()
}

/// Immutable scaler + forest pair shared by every request.
#[derive(Debug, Clone)]
pub struct Predictor {
    artifact: TrainedArtifact,
}

impl Predictor {
    pub fn new(artifact: TrainedArtifact) -> Self {
        Self { artifact }
    }

    /// Loads and validates both slots from `store`.
    pub fn load(store: &ArtifactStore) -> Result<Self, ArtifactError> {
        let artifact = store.load()?;
        log::info!(
            "Loaded artifacts from run {} (trained {}, {} trees)",
            artifact.header.run_id,
            artifact.header.trained_at.to_rfc3339(),
            artifact.forest.trees.len()
        );
        Ok(Self::new(artifact))
    }

    pub fn artifact(&self) -> &TrainedArtifact {
        &self.artifact
    }

    pub fn predict(&self, records: &[RainfallRecord]) -> Result<Vec<DailyPrediction>, PredictionError> {
        let features = derive_features(records)?;
        let scaled = self
            .artifact
            .scaler
            .transform(&feature_matrix(&features))
            .map_err(PredictionError::Scaling)?;

        records
            .iter()
            .zip(self.artifact.forest.predict_batch(&scaled))
            .map(|(record, class)| {
                let prediction = FloodSeverity::from_class_index(class)
                    .ok_or_else(|| PredictionError::Inference(format!("class index {} out of range", class)))?;
                Ok(DailyPrediction {
                    date: record.date_label(),
                    prediction,
                })
            })
            .collect()
    }

    /// Parses a request body and predicts every row in it.
    pub fn predict_body(&self, body: &str) -> Result<Vec<DailyPrediction>, PredictionError> {
        let records = parse_request_body(body)?;
        self.predict(&records)
    }
}
