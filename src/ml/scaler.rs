//! Per-feature standardization.

use serde::{Deserialize, Serialize};

use super::MlError;
use crate::model::{FEATURE_COUNT, FeatureRow};

/// Zero-mean, unit-variance scaling fitted on training rows.
///
/// Uses the population standard deviation. A feature with zero variance is
/// left unscaled (scale 1) so that transforming it only centres it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
    pub n_samples_seen: usize,
}

impl StandardScaler {
    pub fn fit(rows: &[FeatureRow]) -> Result<Self, MlError> {
        if rows.is_empty() {
            return Err(MlError::EmptyTrainingSet);
        }
        let n = rows.len() as f64;

        let mut mean = vec![0.0; FEATURE_COUNT];
        for row in rows {
            for (m, x) in mean.iter_mut().zip(row) {
                *m += x;
            }
        }
        for m in mean.iter_mut() {
            *m /= n;
        }

        let mut variance = vec![0.0; FEATURE_COUNT];
        for row in rows {
            for ((v, x), m) in variance.iter_mut().zip(row).zip(&mean) {
                *v += (x - m) * (x - m);
            }
        }

        let scale = variance
            .iter()
            .map(|v| {
                let std = (v / n).sqrt();
                if std > f64::EPSILON * 10.0 { std } else { 1.0 }
            })
            .collect();

        Ok(Self {
            mean,
            scale,
            n_samples_seen: rows.len(),
        })
    }

    /// Number of features this scaler was fitted on.
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Fails if the scaler's shape does not match `FEATURE_COUNT`, a mean is
    /// not finite, or a scale is not a finite positive number.
    pub fn check_shape(&self) -> Result<(), MlError> {
        for found in [self.mean.len(), self.scale.len()] {
            if found != FEATURE_COUNT {
                return Err(MlError::DimensionMismatch { expected: FEATURE_COUNT, found });
            }
        }
        if let Some(j) = self.mean.iter().position(|m| !m.is_finite()) {
            return Err(MlError::InvalidParameter(format!(
                "mean of feature {} is {}",
                j, self.mean[j]
            )));
        }
        if let Some(j) = self.scale.iter().position(|s| !(s.is_finite() && *s > 0.0)) {
            return Err(MlError::InvalidParameter(format!(
                "scale of feature {} is {}",
                j, self.scale[j]
            )));
        }
        Ok(())
    }

    pub fn transform_row(&self, row: &FeatureRow) -> Result<FeatureRow, MlError> {
        self.check_shape()?;
        let mut out = [0.0; FEATURE_COUNT];
        for (j, value) in out.iter_mut().enumerate() {
            *value = (row[j] - self.mean[j]) / self.scale[j];
        }
        Ok(out)
    }

    pub fn transform(&self, rows: &[FeatureRow]) -> Result<Vec<FeatureRow>, MlError> {
        rows.iter().map(|row| self.transform_row(row)).collect()
    }
}
