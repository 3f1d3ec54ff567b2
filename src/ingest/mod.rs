/// Rainfall data ingestion.
///
/// Submodules:
/// - `rainfall_csv` - delimited daily rainfall history parser.
/// - `fixtures` (test only) - representative rainfall exports.

pub mod rainfall_csv;

#[cfg(test)]
pub(crate) mod fixtures;
