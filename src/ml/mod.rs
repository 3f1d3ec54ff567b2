//! Model fitting and inference primitives.
//!
//! Everything here is deterministic given a seed: the same rows, labels and
//! seed always produce the same scaler, the same trees and the same
//! predictions, independent of how many worker threads fit the forest.
//!
//! - `sampling` - seeded RNG, resampling with replacement, shuffled splits
//! - `scaler`   - per-feature standardization
//! - `tree`     - CART classification tree (Gini impurity)
//! - `forest`   - bagged ensemble of trees with soft voting

pub mod forest;
pub mod sampling;
pub mod scaler;
pub mod tree;

pub use forest::{ForestParams, RandomForest};
pub use scaler::StandardScaler;
pub use tree::{DecisionTree, Node, TreeParams};

use std::fmt;

/// Errors raised while fitting or applying a model component.
#[derive(Debug, Clone, PartialEq)]
pub enum MlError {
    /// Fitting was attempted with no rows.
    EmptyTrainingSet,
    /// Rows and labels differ in length.
    LabelCountMismatch { rows: usize, labels: usize },
    /// A label is outside `0..n_classes`.
    LabelOutOfRange { label: usize, n_classes: usize },
    /// A fitted component expects a different number of features.
    DimensionMismatch { expected: usize, found: usize },
    /// A forest worker exited without returning its tree.
    WorkerFailed { tree: usize },
    /// A hyper-parameter is unusable (zero trees, zero features, ...).
    InvalidParameter(String),
}

impl fmt::Display for MlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlError::EmptyTrainingSet => write!(f, "Cannot fit on an empty training set"),
            MlError::LabelCountMismatch { rows, labels } => {
                write!(f, "Row/label count mismatch: {} rows, {} labels", rows, labels)
            }
            MlError::LabelOutOfRange { label, n_classes } => {
                write!(f, "Label {} is outside 0..{}", label, n_classes)
            }
            MlError::DimensionMismatch { expected, found } => {
                write!(f, "Expected {} features, found {}", expected, found)
            }
            MlError::WorkerFailed { tree } => write!(f, "Worker fitting tree {} did not complete", tree),
            MlError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
        }
    }
}

impl std::error::Error for MlError {}
