/// Cumulative-rainfall feature derivation.
///
/// Turns an ordered rainfall series into the six-column feature matrix used
/// by both the trainer and the prediction endpoint. There is exactly one
/// implementation so that a trained artifact sees identical inputs at serve
/// time.
///
/// # Formula
///
/// For lag `w`, `lag_w[i] = rainfall[i - w]` when `i >= w`, else `0`. Then:
///
/// ```text
/// cumulative_3  = rainfall + lag_1 + lag_2 + lag_3
/// cumulative_5  = cumulative_3  + lag_5
/// cumulative_7  = cumulative_5  + lag_7
/// cumulative_10 = cumulative_7  + lag_10
/// cumulative_14 = cumulative_10 + lag_14
/// ```
///
/// These are sums of a sparse set of single-day lags, not trailing-window
/// sums. Deployed artifacts were trained on exactly this arithmetic (in this
/// addition order), so it must not be changed to a rolling sum without
/// retraining.

use crate::model::{FeatureRow, FeatureVector, InputValidationError, RainfallRecord};

/// Lags (in days) that contribute to the cumulative features.
pub const LAG_DAYS: [usize; 7] = [1, 2, 3, 5, 7, 10, 14];

/// Validates `records` and derives one `FeatureVector` per record.
///
/// The slice is treated as the entire history: lags that reach before its
/// first element are zero even if earlier data exists elsewhere.
pub fn derive_features(records: &[RainfallRecord]) -> Result<Vec<FeatureVector>, InputValidationError> {
    for (idx, record) in records.iter().enumerate() {
        record.validate(idx)?;
    }

    let rainfall: Vec<f64> = records.iter().map(|r| r.rainfall_mm).collect();
    Ok(derive_from_rainfall(&rainfall))
}

/// Derives features from a bare rainfall series. Performs no validation.
pub fn derive_from_rainfall(rainfall: &[f64]) -> Vec<FeatureVector> {
    let lag = |i: usize, w: usize| if i >= w { rainfall[i - w] } else { 0.0 };

    (0..rainfall.len())
        .map(|i| {
            let cumulative_3 = rainfall[i] + lag(i, 1) + lag(i, 2) + lag(i, 3);
            let cumulative_5 = cumulative_3 + lag(i, 5);
            let cumulative_7 = cumulative_5 + lag(i, 7);
            let cumulative_10 = cumulative_7 + lag(i, 10);
            let cumulative_14 = cumulative_10 + lag(i, 14);

            FeatureVector {
                rainfall_mm: rainfall[i],
                cumulative_3,
                cumulative_5,
                cumulative_7,
                cumulative_10,
                cumulative_14,
            }
        })
        .collect()
}

/// Converts feature vectors into matrix rows.
pub fn feature_matrix(features: &[FeatureVector]) -> Vec<FeatureRow> {
    features.iter().map(FeatureVector::to_row).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
