//! Flood Prediction Service - HTTP server
//!
//! Loads the trained scaler and forest once at startup, then serves
//! `POST /predict` until the process is stopped. Refuses to start if either
//! artifact is missing or the two come from different training runs; run
//! `train_model` first.
//!
//! Usage:
//!   cargo run --release                              # floodpred.toml, port 5000
//!   cargo run --release -- --port 8080               # override the port
//!   cargo run --release -- --config /etc/floodpred.toml
//!
//! Environment:
//!   FLOODPRED_CONFIG - configuration file (when --config is absent)
//!   PORT             - listening port (overridden by --port)
//!   RUST_LOG         - log filter (default: info)

use floodpred_service::artifact::ArtifactStore;
use floodpred_service::config::{self, Config};
use floodpred_service::endpoint;
use floodpred_service::logging::{format_error_chain, init_logger};
use floodpred_service::predictor::Predictor;
use std::env;

fn main() {
    init_logger();

    println!("🌧️  Flood Prediction Service");
    println!("============================\n");

    // Parse command-line arguments
    let args: Vec<String> = env::args().collect();
    let mut config_path: Option<String> = None;
    let mut port: Option<u16> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                config_path = Some(args[i + 1].clone());
                i += 2;
            }
            "--port" if i + 1 < args.len() => {
                match config::parse_port(&args[i + 1]) {
                    Ok(p) => port = Some(p),
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        std::process::exit(1);
                    }
                }
                i += 2;
            }
            "--config" | "--port" => {
                eprintln!("Error: {} requires a value", args[i]);
                std::process::exit(1);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                eprintln!("Usage: {} [--config PATH] [--port PORT]", args[0]);
                std::process::exit(1);
            }
        }
    }

    // Load configuration
    let path = config::resolve_config_path(config_path.as_deref());
    println!("📋 Loading configuration from {}...", path.display());
    let mut config: Config = match config::load_config(&path).and_then(|mut c| {
        c.apply_env_overrides()?;
        Ok(c)
    }) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("\n❌ Configuration error: {}\n", format_error_chain(&e));
            std::process::exit(1);
        }
    };
    if let Some(p) = port {
        config.service.port = p;
    }

    // Load artifacts
    let store = ArtifactStore::from_config(&config.artifacts);
    println!("📦 Loading model artifacts...");
    let predictor = match Predictor::load(&store) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("\n❌ Failed to load artifacts: {}\n", format_error_chain(&e));
            eprintln!("Train a model first: cargo run --release --bin train_model\n");
            std::process::exit(1);
        }
    };
    let header = &predictor.artifact().header;
    let short_run: String = header.run_id.chars().take(12).collect();
    println!("✓ Model loaded (run {}, trained {})\n", short_run, header.trained_at.to_rfc3339());

    println!("🚀 Starting HTTP endpoint server...");
    if let Err(e) = endpoint::start_endpoint_server(&config.service, &predictor) {
        eprintln!("\n❌ Endpoint server error: {}", e);
        std::process::exit(1);
    }
}
