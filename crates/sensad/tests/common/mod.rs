//! Shared fixtures: a payment-gated mock sensor resource and registry builders.

#![allow(dead_code)]

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use sensad::capabilities::{CapabilityRegistry, LATEST_READING, WINDOW_ANALYSIS};
use sensad::config::ResourceConfig;
use sensad::payment::{PaymentGatedClient, PAYMENT_HEADER, PAYMENT_RESPONSE_HEADER};
use sensad::signer::{LocalSigner, SignerSet};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const SEED_PRIMARY: &str = "0101010101010101010101010101010101010101010101010101010101010101";
pub const SEED_SECONDARY: &str = "0202020202020202020202020202020202020202020202020202020202020202";

/// What the resource sends once payment is attached
#[derive(Clone)]
pub enum PaidReply {
    Json(Value),
    Text(&'static str),
    Status(StatusCode, Value),
}

/// Mock of the sensor API guarded by x402-style payment
pub struct MockResource {
    pub hits: AtomicUsize,
    pub paid_hits: AtomicUsize,
    /// Never accept a payment
    pub always_require_payment: bool,
    /// Serve without asking for payment
    pub free: bool,
    pub latest: PaidReply,
    pub window: PaidReply,
    pub payment_headers: Mutex<Vec<String>>,
    pub addresses: Mutex<Vec<String>>,
}

impl MockResource {
    pub fn new(latest: PaidReply, window: PaidReply) -> Self {
        Self {
            hits: AtomicUsize::new(0),
            paid_hits: AtomicUsize::new(0),
            always_require_payment: false,
            free: false,
            latest,
            window,
            payment_headers: Mutex::new(Vec::new()),
            addresses: Mutex::new(Vec::new()),
        }
    }

    pub fn with_latest(body: Value) -> Self {
        Self::new(PaidReply::Json(body), PaidReply::Json(json!({"last": []})))
    }

    pub fn with_window(body: Value) -> Self {
        Self::new(PaidReply::Json(json!({})), PaidReply::Json(body))
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn paid_hits(&self) -> usize {
        self.paid_hits.load(Ordering::SeqCst)
    }
}

fn challenge(resource: &str) -> Value {
    json!({
        "x402Version": 1,
        "error": "X-PAYMENT header is required",
        "accepts": [{
            "scheme": "exact",
            "network": "base",
            "maxAmountRequired": "1000",
            "resource": resource,
            "description": "Sensor reading",
            "payTo": "0x5c2aec641952fb009aa879d411f13f274362e7ea",
            "asset": "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913"
        }]
    })
}

fn serve(
    mock: &MockResource,
    path: &str,
    reply: &PaidReply,
    headers: &HeaderMap,
    query: &HashMap<String, String>,
) -> Response {
    mock.hits.fetch_add(1, Ordering::SeqCst);
    if let Some(address) = query.get("address") {
        mock.addresses.lock().unwrap().push(address.clone());
    }

    if !mock.free {
        let payment = headers.get(PAYMENT_HEADER).and_then(|v| v.to_str().ok());
        match payment {
            Some(proof) if !mock.always_require_payment => {
                mock.paid_hits.fetch_add(1, Ordering::SeqCst);
                mock.payment_headers.lock().unwrap().push(proof.to_string());
            }
            _ => {
                return (StatusCode::PAYMENT_REQUIRED, Json(challenge(path))).into_response();
            }
        }
    }

    let mut response = match reply {
        PaidReply::Json(body) => Json(body.clone()).into_response(),
        PaidReply::Text(text) => (StatusCode::OK, *text).into_response(),
        PaidReply::Status(status, body) => (*status, Json(body.clone())).into_response(),
    };
    if let Ok(receipt) = "settled-tx-0x01".parse() {
        response.headers_mut().insert(PAYMENT_RESPONSE_HEADER, receipt);
    }
    response
}

async fn latest(
    State(mock): State<Arc<MockResource>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    serve(&mock, "/api/sensors/latest", &mock.latest, &headers, &query)
}

async fn latest_top(
    State(mock): State<Arc<MockResource>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    serve(&mock, "/api/sensors/latestTop", &mock.window, &headers, &query)
}

/// Start the mock on an ephemeral port, returning its base URL
pub async fn spawn_resource(mock: MockResource) -> (String, Arc<MockResource>) {
    let mock = Arc::new(mock);
    let app = Router::new()
        .route("/api/sensors/latest", get(latest))
        .route("/api/sensors/latestTop", get(latest_top))
        .with_state(mock.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), mock)
}

/// Base URL of a port nothing listens on
pub async fn dead_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

pub fn signers() -> SignerSet {
    SignerSet::new()
        .with_payer(
            LATEST_READING,
            Arc::new(LocalSigner::from_hex_seed("primary", SEED_PRIMARY).unwrap()),
        )
        .with_payer(
            WINDOW_ANALYSIS,
            Arc::new(LocalSigner::from_hex_seed("secondary", SEED_SECONDARY).unwrap()),
        )
}

pub fn registry(base_url: &str) -> CapabilityRegistry {
    registry_with(base_url, signers())
}

pub fn registry_with(base_url: &str, signers: SignerSet) -> CapabilityRegistry {
    let resource = ResourceConfig {
        base_url: base_url.to_string(),
        timeout_secs: 5,
        ..ResourceConfig::default()
    };
    CapabilityRegistry::new(PaymentGatedClient::new(5).unwrap(), signers, resource)
}
