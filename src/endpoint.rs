/// HTTP endpoint for flood severity prediction
///
/// Serves the loaded `Predictor` to web clients. Requests are handled one at
/// a time on the accept loop; a failed request gets an error response and
/// the loop carries on.
///
/// Endpoints:
/// - POST /predict - Severity class per day for a batch of daily rainfall
/// - GET /health - Service health check
///
/// Every response allows cross-origin callers.

use std::io::Cursor;

use tiny_http::{Method, Request, Response, Server};

use crate::config::ServiceConfig;
use crate::logging::log_error_chain;
use crate::predictor::Predictor;

pub const SERVICE_NAME: &str = "floodpred_service";

const AVAILABLE_ENDPOINTS: [&str; 2] = ["POST /predict", "GET /health"];

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Status and JSON body of a response, before it is put on the wire.
/// `body` is `None` for 204 responses.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Option<serde_json::Value>,
}

impl ApiResponse {
    fn json(status: u16, body: serde_json::Value) -> Self {
        Self { status, body: Some(body) }
    }

    fn no_content() -> Self {
        Self { status: 204, body: None }
    }
}

/// Dispatches one request. The query string is ignored.
pub fn route(method: &Method, url: &str, body: &str, predictor: &Predictor) -> ApiResponse {
    let path = url.split('?').next().unwrap_or(url);

    match (method, path) {
        (Method::Options, _) => ApiResponse::no_content(),
        (Method::Post, "/predict") => handle_predict(body, predictor),
        (Method::Get, "/health") => handle_health(predictor),
        _ => ApiResponse::json(
            404,
            serde_json::json!({
                "error": "Not found",
                "available_endpoints": AVAILABLE_ENDPOINTS
            }),
        ),
    }
}

/// Handle POST /predict
fn handle_predict(body: &str, predictor: &Predictor) -> ApiResponse {
    let result = predictor
        .predict_body(body)
        .map_err(|e| {
            log_error_chain("Prediction failed", &e);
            e.to_string()
        })
        .and_then(|predictions| serde_json::to_value(&predictions).map_err(|e| e.to_string()));

    match result {
        Ok(value) => {
            log::info!(
                "Predicted {} days",
                value.as_array().map(|a| a.len()).unwrap_or(0)
            );
            ApiResponse::json(200, value)
        }
        Err(message) => ApiResponse::json(500, serde_json::json!({ "error": message })),
    }
}

/// Handle GET /health
fn handle_health(predictor: &Predictor) -> ApiResponse {
    let header = &predictor.artifact().header;
    ApiResponse::json(
        200,
        serde_json::json!({
            "status": "ok",
            "service": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "model_run_id": header.run_id,
            "model_trained_at": header.trained_at.to_rfc3339()
        }),
    )
}

// ---------------------------------------------------------------------------
// HTTP Server
// ---------------------------------------------------------------------------

/// Bind to the configured address and serve until the listener closes.
pub fn start_endpoint_server(config: &ServiceConfig, predictor: &Predictor) -> Result<(), String> {
    let address = config.bind_address();
    let server = Server::http(&address).map_err(|e| format!("Failed to start HTTP server on {}: {}", address, e))?;

    println!("📡 HTTP endpoint listening on http://{}", address);
    println!("   POST /predict - Flood severity per day");
    println!("   GET /health - Service health check\n");

    serve(&server, predictor);
    Ok(())
}

/// Accept loop over an already-bound server.
pub fn serve(server: &Server, predictor: &Predictor) {
    for request in server.incoming_requests() {
        handle_request(request, predictor);
    }
}

fn handle_request(mut request: Request, predictor: &Predictor) {
    let mut body = String::new();
    let read = request.as_reader().read_to_string(&mut body);
    let api_response = match read {
        Ok(_) => route(request.method(), request.url(), &body, predictor),
        Err(e) => {
            log_error_chain("Failed to read request body", &e);
            ApiResponse::json(500, serde_json::json!({ "error": format!("Failed to read request body: {}", e) }))
        }
    };

    log::debug!("{} {} -> {}", request.method(), request.url(), api_response.status);

    if let Err(e) = request.respond(create_response(&api_response)) {
        log::warn!("Failed to send response: {}", e);
    }
}

fn header(name: &str, value: &str) -> Option<tiny_http::Header> {
    tiny_http::Header::from_bytes(name.as_bytes(), value.as_bytes()).ok()
}

/// Create HTTP response with JSON body and CORS headers
fn create_response(api: &ApiResponse) -> Response<Cursor<Vec<u8>>> {
    let bytes = api
        .body
        .as_ref()
        .map(|json| serde_json::to_vec(json).unwrap_or_default())
        .unwrap_or_default();

    let mut response = Response::from_data(bytes).with_status_code(api.status);
    let headers = [
        ("Content-Type", "application/json"),
        ("Access-Control-Allow-Origin", "*"),
        ("Access-Control-Allow-Methods", "GET, POST, OPTIONS"),
        ("Access-Control-Allow-Headers", "Content-Type"),
    ];
    for (name, value) in headers {
        if let Some(h) = header(name, value) {
            response.add_header(h);
        }
    }
    response
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
