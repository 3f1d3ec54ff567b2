//! Flood Model Training
//!
//! Trains the flood severity classifier from a daily rainfall history and
//! writes the scaler and model artifacts the service loads at startup.
//!
//! Existing artifacts are deleted before training starts. If the run fails,
//! no artifact is left behind and the service will refuse to start until a
//! run succeeds.
//!
//! Usage:
//!   cargo run --release --bin train_model
//!
//! Options:
//!   --config PATH   Configuration file (default: floodpred.toml)
//!   --input PATH    Rainfall history, overriding [training] input_path
//!
//! Environment:
//!   FLOODPRED_CONFIG - configuration file (when --config is absent)
//!   RUST_LOG         - log filter (default: info)

use floodpred_service::config;
use floodpred_service::logging::{init_logger, log_error_chain};
use floodpred_service::trainer::run_training;
use std::env;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logger();

    println!("🌧️  Flood Model Training");
    println!("========================\n");

    // Parse arguments
    let args: Vec<String> = env::args().collect();
    let value_of = |flag: &str| {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .cloned()
    };
    let config_path = value_of("--config");
    let input_override = value_of("--input");

    let path = config::resolve_config_path(config_path.as_deref());
    println!("⚙️  Loading configuration from {}...", path.display());
    let mut config = config::load_config(&path)?;
    if let Some(input) = input_override {
        config.training.input_path = PathBuf::from(input);
    }
    println!("✓ Configuration loaded:");
    println!("  - Input: {}", config.training.input_path.display());
    println!("  - Trees: {} (max depth {})", config.training.n_trees, config.training.max_depth);
    println!("  - Seed: {}", config.training.seed);
    println!("  - Test fraction: {:.2}\n", config.training.test_fraction);

    println!("🔄 Training...");
    let outcome = match run_training(&config) {
        Ok(outcome) => outcome,
        Err(e) => {
            log_error_chain("Training failed", &e);
            eprintln!("\n❌ Training failed: {}", e);
            eprintln!("   Previous artifacts have been removed.\n");
            std::process::exit(1);
        }
    };
    let report = &outcome.report;

    println!("✓ Training complete\n");
    println!("📊 Dataset:");
    println!("  - Rows read: {}", report.rows_read);
    println!(
        "  - Severity 0/1/2/3: {}/{}/{}/{}",
        report.severity_counts[0], report.severity_counts[1], report.severity_counts[2], report.severity_counts[3]
    );
    println!(
        "  - Balanced: {} dry + {} flood (from {})",
        report.balance.majority_rows, report.balance.upsampled_minority_rows, report.balance.minority_rows
    );
    println!("  - Train/test: {}/{}\n", report.train_rows, report.test_rows);

    println!("🎯 Accuracy: {:.4}\n", report.accuracy);

    println!("📈 Feature importances:");
    for fi in &report.feature_importances {
        println!("  {:<32} {:.4}", fi.feature, fi.importance);
    }

    println!("\n📦 Artifacts written (run {}):", report.run_id);
    println!("  - {}", config.artifacts.scaler_path().display());
    println!("  - {}", config.artifacts.model_path().display());

    Ok(())
}
