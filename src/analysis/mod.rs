/// Rainfall analysis shared by training and serving.
///
/// Submodules:
/// - `features` - sparse-lag cumulative rainfall features.
/// - `severity` - flood severity labels from cumulative rainfall.

pub mod features;
pub mod severity;
