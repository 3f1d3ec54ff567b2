//! Flood severity labelling from cumulative rainfall.
//!
//! Severity is a pure function of the 14-day cumulative feature. Thresholds
//! are strict: a value equal to a threshold stays in the lower category.

use crate::model::{FeatureVector, FloodSeverity};

/// Cumulative-14 rainfall (mm) above which flooding is minor.
pub const MINOR_THRESHOLD_MM: f64 = 100.0;
/// Cumulative-14 rainfall (mm) above which flooding is moderate.
pub const MODERATE_THRESHOLD_MM: f64 = 150.0;
/// Cumulative-14 rainfall (mm) above which flooding is major.
pub const MAJOR_THRESHOLD_MM: f64 = 250.0;

/// Determine severity from a cumulative-14 rainfall total.
pub fn severity_from_cumulative(cumulative_14_mm: f64) -> FloodSeverity {
    if cumulative_14_mm > MAJOR_THRESHOLD_MM {
        FloodSeverity::Major
    } else if cumulative_14_mm > MODERATE_THRESHOLD_MM {
        FloodSeverity::Moderate
    } else if cumulative_14_mm > MINOR_THRESHOLD_MM {
        FloodSeverity::Minor
    } else {
        FloodSeverity::None
    }
}

/// Labels every feature vector.
pub fn label_features(features: &[FeatureVector]) -> Vec<FloodSeverity> {
    features
        .iter()
        .map(|f| severity_from_cumulative(f.cumulative_14))
        .collect()
}
