/// Service configuration loader - parses floodpred.toml
///
/// Separates deployment settings from code, making it easy to move artifact
/// files, point training at a different history export, or change the
/// listening port without recompiling.
///
/// Every field has a default, so an empty or absent file yields a working
/// configuration. The training hyper-parameters default to the values the
/// deployed artifacts were trained with; changing them requires retraining.

use serde::Deserialize;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::ingest::rainfall_csv::CsvOptions;
use crate::ml::forest::ForestParams;
use crate::ml::sampling::DEFAULT_SEED;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "floodpred.toml";

/// Environment variable naming an alternative configuration file.
pub const CONFIG_PATH_ENV: &str = "FLOODPRED_CONFIG";

/// Environment variable overriding `[service] port`.
pub const PORT_ENV: &str = "PORT";

/// Root configuration structure for TOML parsing
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub artifacts: ArtifactConfig,
    pub training: TrainingConfig,
    pub service: ServiceConfig,
}

/// Where the two artifact slots live.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    pub directory: PathBuf,
    pub model_file: String,
    pub scaler_file: String,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            model_file: "flood_prediction_model.json".to_string(),
            scaler_file: "scaler.json".to_string(),
        }
    }
}

impl ArtifactConfig {
    pub fn model_path(&self) -> PathBuf {
        self.directory.join(&self.model_file)
    }

    pub fn scaler_path(&self) -> PathBuf {
        self.directory.join(&self.scaler_file)
    }
}

/// Offline training settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Daily rainfall history (delimited text with a header row).
    pub input_path: PathBuf,
    pub delimiter: char,
    /// Treat empty rainfall cells as 0 mm instead of failing the run.
    pub missing_rainfall_as_zero: bool,
    /// Seed for class balancing, the train/test split and the forest.
    pub seed: u64,
    pub test_fraction: f64,
    pub n_trees: usize,
    pub max_depth: usize,
    /// Forest worker threads; 0 uses all available cores.
    pub workers: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("DailyHistoricalRain.csv"),
            delimiter: ',',
            missing_rainfall_as_zero: false,
            seed: DEFAULT_SEED,
            test_fraction: 0.2,
            n_trees: 200,
            max_depth: 10,
            workers: 0,
        }
    }
}

impl TrainingConfig {
    pub fn csv_options(&self) -> CsvOptions {
        CsvOptions {
            delimiter: self.delimiter,
            missing_rainfall_as_zero: self.missing_rainfall_as_zero,
        }
    }

    pub fn forest_params(&self) -> ForestParams {
        ForestParams {
            n_trees: self.n_trees,
            max_depth: self.max_depth,
            seed: self.seed,
            workers: self.workers,
            ..ForestParams::default()
        }
    }
}

/// HTTP endpoint settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl ServiceConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuration loading error
#[derive(Debug)]
pub enum ConfigError {
    /// The file exists but could not be read.
    Unreadable { path: PathBuf, source: io::Error },
    /// The file is not valid TOML or has wrongly typed fields.
    Malformed { path: PathBuf, message: String },
    /// An environment override could not be parsed.
    InvalidOverride { variable: String, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Unreadable { path, source } => {
                write!(f, "Failed to read {}: {}", path.display(), source)
            }
            ConfigError::Malformed { path, message } => {
                write!(f, "Failed to parse {}: {}", path.display(), message)
            }
            ConfigError::InvalidOverride { variable, value } => {
                write!(f, "Invalid value for {}: '{}'", variable, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Unreadable { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Parses configuration text. `path` is only used in error messages.
pub fn parse_config(contents: &str, path: &Path) -> Result<Config, ConfigError> {
    toml::from_str(contents).map_err(|e| ConfigError::Malformed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Loads configuration from `path`.
///
/// A missing file is not an error: defaults are returned and a warning is
/// logged. An unreadable or malformed file is.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    match fs::read_to_string(path) {
        Ok(contents) => parse_config(&contents, path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::warn!("{} not found, using default configuration", path.display());
            Ok(Config::default())
        }
        Err(source) => Err(ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Picks the configuration file: command line, then `FLOODPRED_CONFIG`, then
/// `floodpred.toml`. Loads `.env` first so the variable can live there.
pub fn resolve_config_path(cli_path: Option<&str>) -> PathBuf {
    dotenv::dotenv().ok();

    if let Some(path) = cli_path {
        return PathBuf::from(path);
    }
    env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

impl Config {
    /// Applies the `PORT` override, if set.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(value) = env::var(PORT_ENV) {
            self.service.port = parse_port(&value)?;
        }
        Ok(())
    }
}

/// Parses a TCP port from an environment value or CLI argument.
pub fn parse_port(value: &str) -> Result<u16, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidOverride {
        variable: PORT_ENV.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_yields_defaults() {
        let config = parse_config("", Path::new("floodpred.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.training.seed, 42);
        assert_eq!(config.training.n_trees, 200);
        assert_eq!(config.training.max_depth, 10);
        assert_eq!(config.training.test_fraction, 0.2);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let text = r#"
            [artifacts]
            directory = "/var/lib/floodpred"

            [training]
            delimiter = ";"
            workers = 4

            [service]
            port = 8080
        "#;
        let config = parse_config(text, Path::new("floodpred.toml")).unwrap();

        assert_eq!(config.artifacts.model_path(), PathBuf::from("/var/lib/floodpred/flood_prediction_model.json"));
        assert_eq!(config.artifacts.scaler_path(), PathBuf::from("/var/lib/floodpred/scaler.json"));
        assert_eq!(config.training.delimiter, ';');
        assert_eq!(config.training.workers, 4);
        assert_eq!(config.training.seed, 42);
        assert_eq!(config.service.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let err = parse_config("[service]\nport = \"eighty\"", Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = load_config(Path::new("definitely/not/here/floodpred.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_training_config_conversions() {
        let training = TrainingConfig {
            seed: 9,
            n_trees: 12,
            missing_rainfall_as_zero: true,
            ..TrainingConfig::default()
        };
        let forest = training.forest_params();
        assert_eq!(forest.seed, 9);
        assert_eq!(forest.n_trees, 12);
        assert_eq!(forest.max_depth, 10);
        assert!(training.csv_options().missing_rainfall_as_zero);
    }

    #[test]
    fn test_parse_port() {
        assert_eq!(parse_port(" 8080 ").unwrap(), 8080);
        assert!(parse_port("99999").is_err());
        assert!(parse_port("http").is_err());
    }

    #[test]
    fn test_cli_path_wins() {
        assert_eq!(resolve_config_path(Some("custom.toml")), PathBuf::from("custom.toml"));
    }
}
