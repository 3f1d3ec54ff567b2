/// Integration tests for the live HTTP endpoint
///
/// Trains a small model in memory, serves it on an ephemeral local port and
/// drives it with a blocking HTTP client. Verifies:
/// 1. POST /predict returns one prediction per input row, in order
/// 2. A bad request returns 500 with an error body and the server keeps serving
/// 3. Health, preflight, 404 and CORS behaviour
///
/// Run with: cargo test --test predict_endpoint

use floodpred_service::config::TrainingConfig;
use floodpred_service::endpoint::{SERVICE_NAME, serve};
use floodpred_service::model::RainfallRecord;
use floodpred_service::predictor::Predictor;
use floodpred_service::trainer::fit;

use chrono::{Datelike, Duration, NaiveDate};
use reqwest::blocking::Client;
use serde_json::{Value, json};
use std::thread;

fn trained_predictor() -> Predictor {
    let start = NaiveDate::from_ymd_opt(2016, 1, 1).unwrap();
    let records: Vec<RainfallRecord> = (0..365)
        .map(|i| {
            let date = start + Duration::days(i as i64);
            let rain = match i % 30 {
                0..=2 => 40.0 + (i % 90) as f64,
                _ => ((i * 7) % 5) as f64,
            };
            RainfallRecord::new(date.year(), date.month(), date.day(), rain)
        })
        .collect();

    let config = TrainingConfig {
        n_trees: 8,
        workers: 2,
        ..TrainingConfig::default()
    };
    Predictor::new(fit(&records, &config).unwrap().artifact)
}

/// Starts a server on 127.0.0.1 with an OS-assigned port; returns its base URL.
fn spawn_server() -> String {
    let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let predictor = trained_predictor();
    thread::spawn(move || serve(&server, &predictor));
    format!("http://{}", addr)
}

#[test]
fn test_predict_three_days() {
    let base = spawn_server();
    let client = Client::new();

    let response = client
        .post(format!("{}/predict", base))
        .json(&json!({"rain_data": [[2023, 1, 1, 50], [2023, 1, 2, 60], [2023, 1, 3, 40]]}))
        .send()
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );

    let body: Value = response.json().unwrap();
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 3);
    let dates: Vec<&str> = entries.iter().map(|e| e["date"].as_str().unwrap()).collect();
    assert_eq!(dates, vec!["2023-01-01", "2023-01-02", "2023-01-03"]);
    for entry in entries {
        let class = entry["prediction"].as_u64().unwrap();
        assert!(class <= 3, "prediction {} out of range", class);
    }
}

#[test]
fn test_bad_request_returns_500_and_server_survives() {
    let base = spawn_server();
    let client = Client::new();

    let response = client
        .post(format!("{}/predict", base))
        .json(&json!({"rainfall": []}))
        .send()
        .unwrap();
    assert_eq!(response.status().as_u16(), 500);
    let body: Value = response.json().unwrap();
    assert!(body["error"].as_str().unwrap().contains("rain_data"));

    let response = client
        .post(format!("{}/predict", base))
        .body("{not json")
        .send()
        .unwrap();
    assert_eq!(response.status().as_u16(), 500);

    let response = client
        .post(format!("{}/predict", base))
        .json(&json!({"rain_data": [[2023, 6, 1, 0.0]]}))
        .send()
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
}

#[test]
fn test_health_preflight_and_not_found() {
    let base = spawn_server();
    let client = Client::new();

    let health: Value = client
        .get(format!("{}/health", base))
        .send()
        .unwrap()
        .json()
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["service"], SERVICE_NAME);
    assert!(health["model_trained_at"].is_string());

    let preflight = client
        .request(reqwest::Method::OPTIONS, format!("{}/predict", base))
        .send()
        .unwrap();
    assert_eq!(preflight.status().as_u16(), 204);
    assert!(preflight.headers().contains_key("access-control-allow-methods"));

    let missing = client.get(format!("{}/nowhere", base)).send().unwrap();
    assert_eq!(missing.status().as_u16(), 404);
}
