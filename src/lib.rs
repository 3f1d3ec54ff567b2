/// floodpred_service: daily rainfall flood severity prediction.
///
/// # Module structure
///
/// ```text
/// floodpred_service
/// ├── model       - shared data types (RainfallRecord, FeatureVector, FloodSeverity, InputValidationError)
/// ├── config      - service and training configuration (floodpred.toml)
/// ├── logging     - env_logger setup and error-chain logging
/// ├── ingest
/// │   ├── rainfall_csv - delimited daily rainfall history parsing
/// │   └── fixtures (test only) - representative rainfall exports
/// ├── analysis
/// │   ├── features - sparse-lag cumulative rainfall features
/// │   └── severity - flood severity labels from cumulative_14
/// ├── ml
/// │   ├── sampling - seeded resampling and train/test split
/// │   ├── scaler   - per-feature standardization
/// │   ├── tree     - CART decision tree (Gini)
/// │   └── forest   - random forest classifier
/// ├── artifact    - scaler/model persistence with run and schema checks
/// ├── trainer     - offline training pipeline
/// ├── predictor   - per-request feature derivation and classification
/// └── endpoint    - HTTP API (POST /predict, GET /health)
/// ```

/// Public modules
pub mod analysis;
pub mod artifact;
pub mod config;
pub mod endpoint;
pub mod ingest;
pub mod logging;
pub mod ml;
pub mod model;
pub mod predictor;
pub mod trainer;
