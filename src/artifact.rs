/// Trained artifact persistence
///
/// A training run produces two artifacts stored in two slots: the fitted
/// feature scaler and the fitted forest. They are only meaningful together,
/// so each file carries the same header:
///
/// - `run_id` - SHA-256 over the training input and hyper-parameters,
///   identical in both slots of one run
/// - `feature_schema` - SHA-256 of the ordered feature names
/// - `feature_names` - the names themselves, for humans reading the file
/// - `trained_at` - UTC timestamp of the run
///
/// Loading refuses a pair whose run ids differ or whose schema does not
/// match the feature layout compiled into this binary.
///
/// Replacement is not atomic. Training removes both slots before it starts
/// and writes them again at the end, so a failed run leaves no artifact
/// rather than a stale half of one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::ArtifactConfig;
use crate::ml::{MlError, RandomForest, StandardScaler};
use crate::model::{FEATURE_NAMES, FloodSeverity};

// ---------------------------------------------------------------------------
// Artifact types
// ---------------------------------------------------------------------------

/// The two artifact slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactSlot {
    Model,
    Scaler,
}

impl fmt::Display for ArtifactSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactSlot::Model => write!(f, "model"),
            ArtifactSlot::Scaler => write!(f, "scaler"),
        }
    }
}

/// Metadata shared by both slots of one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactHeader {
    pub run_id: String,
    pub feature_schema: String,
    pub feature_names: Vec<String>,
    pub trained_at: DateTime<Utc>,
}

impl ArtifactHeader {
    pub fn new(run_id: String) -> Self {
        Self {
            run_id,
            feature_schema: feature_schema_fingerprint(),
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            trained_at: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ModelFile {
    header: ArtifactHeader,
    forest: RandomForest,
}

#[derive(Debug, Serialize, Deserialize)]
struct ScalerFile {
    header: ArtifactHeader,
    scaler: StandardScaler,
}

/// A fitted scaler and forest from the same training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedArtifact {
    pub header: ArtifactHeader,
    pub scaler: StandardScaler,
    pub forest: RandomForest,
}

/// SHA-256 (hex) of the feature names in matrix order.
pub fn feature_schema_fingerprint() -> String {
    let mut hasher = Sha256::new();
    for name in FEATURE_NAMES {
        hasher.update(name.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors reading, writing or validating persisted artifacts.
#[derive(Debug)]
pub enum ArtifactError {
    /// A slot file does not exist.
    Missing { slot: ArtifactSlot, path: PathBuf },
    /// A slot file could not be read, written or removed.
    Io { slot: ArtifactSlot, path: PathBuf, source: io::Error },
    /// A slot file is not a valid artifact.
    Corrupt { slot: ArtifactSlot, path: PathBuf, reason: String },
    /// The two slots do not belong together, or do not match this build.
    Mismatch(String),
}

impl fmt::Display for ArtifactError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactError::Missing { slot, path } => {
                write!(f, "No {} artifact at {}. Run the trainer first: cargo run --release --bin train_model", slot, path.display())
            }
            ArtifactError::Io { slot, path, source } => {
                write!(f, "I/O error on {} artifact {}: {}", slot, path.display(), source)
            }
            ArtifactError::Corrupt { slot, path, reason } => {
                write!(f, "Corrupt {} artifact {}: {}", slot, path.display(), reason)
            }
            ArtifactError::Mismatch(msg) => write!(f, "Artifact mismatch: {}", msg),
        }
    }
}

impl std::error::Error for ArtifactError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ArtifactError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// File locations of the two artifact slots.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactStore {
    model_path: PathBuf,
    scaler_path: PathBuf,
}

impl ArtifactStore {
    pub fn new(model_path: impl Into<PathBuf>, scaler_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            scaler_path: scaler_path.into(),
        }
    }

    pub fn from_config(config: &ArtifactConfig) -> Self {
        Self::new(config.model_path(), config.scaler_path())
    }

    pub fn path(&self, slot: ArtifactSlot) -> &Path {
        match slot {
            ArtifactSlot::Model => &self.model_path,
            ArtifactSlot::Scaler => &self.scaler_path,
        }
    }

    /// Deletes both slots if present. Returns the paths actually removed.
    pub fn remove_existing(&self) -> Result<Vec<PathBuf>, ArtifactError> {
        let mut removed = Vec::new();
        for slot in [ArtifactSlot::Model, ArtifactSlot::Scaler] {
            let path = self.path(slot);
            match fs::remove_file(path) {
                Ok(()) => removed.push(path.to_path_buf()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(ArtifactError::Io {
                        slot,
                        path: path.to_path_buf(),
                        source,
                    });
                }
            }
        }
        Ok(removed)
    }

    /// Writes the scaler slot, then the model slot.
    pub fn save(&self, artifact: &TrainedArtifact) -> Result<(), ArtifactError> {
        let scaler = ScalerFile {
            header: artifact.header.clone(),
            scaler: artifact.scaler.clone(),
        };
        self.write_slot(ArtifactSlot::Scaler, &scaler)?;

        let model = ModelFile {
            header: artifact.header.clone(),
            forest: artifact.forest.clone(),
        };
        self.write_slot(ArtifactSlot::Model, &model)
    }

    fn write_slot<T: Serialize>(&self, slot: ArtifactSlot, value: &T) -> Result<(), ArtifactError> {
        let path = self.path(slot);
        let json = serde_json::to_string(value).map_err(|e| ArtifactError::Corrupt {
            slot,
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ArtifactError::Io {
                slot,
                path: path.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, json).map_err(|source| ArtifactError::Io {
            slot,
            path: path.to_path_buf(),
            source,
        })
    }

    fn read_slot<T: for<'de> Deserialize<'de>>(&self, slot: ArtifactSlot) -> Result<T, ArtifactError> {
        let path = self.path(slot);
        let contents = fs::read_to_string(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                ArtifactError::Missing { slot, path: path.to_path_buf() }
            } else {
                ArtifactError::Io { slot, path: path.to_path_buf(), source }
            }
        })?;

        serde_json::from_str(&contents).map_err(|e| ArtifactError::Corrupt {
            slot,
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Loads both slots and checks that they form a usable pair.
    pub fn load(&self) -> Result<TrainedArtifact, ArtifactError> {
        let scaler_file: ScalerFile = self.read_slot(ArtifactSlot::Scaler)?;
        let model_file: ModelFile = self.read_slot(ArtifactSlot::Model)?;

        let expected_schema = feature_schema_fingerprint();
        for (slot, header) in [
            (ArtifactSlot::Scaler, &scaler_file.header),
            (ArtifactSlot::Model, &model_file.header),
        ] {
            if header.feature_schema != expected_schema {
                return Err(ArtifactError::Mismatch(format!(
                    "{} artifact was trained on features {:?}, this build uses {:?}",
                    slot, header.feature_names, FEATURE_NAMES
                )));
            }
        }

        if scaler_file.header.run_id != model_file.header.run_id {
            return Err(ArtifactError::Mismatch(format!(
                "scaler is from run {} but model is from run {}",
                scaler_file.header.run_id, model_file.header.run_id
            )));
        }

        let corrupt = |slot: ArtifactSlot, e: MlError| ArtifactError::Corrupt {
            slot,
            path: self.path(slot).to_path_buf(),
            reason: e.to_string(),
        };
        scaler_file
            .scaler
            .check_shape()
            .map_err(|e| corrupt(ArtifactSlot::Scaler, e))?;
        model_file
            .forest
            .check_shape(FloodSeverity::COUNT)
            .map_err(|e| corrupt(ArtifactSlot::Model, e))?;

        Ok(TrainedArtifact {
            header: model_file.header,
            scaler: scaler_file.scaler,
            forest: model_file.forest,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
