//! Liveness probe - periodic self check independent of user turns.
//!
//! Every interval the probe calls the daemon's public health route with the
//! API key, and when that answers, sends a trivial prompt to the model.
//! Failures are only logged; turns never wait on or observe the probe.

use crate::middleware::API_KEY_HEADER;
use crate::model::ModelClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Prompt used for the model round-trip
pub const PING_PROMPT: &str = "Hi there!";

/// Timeout for the health route request
pub const PROBE_TIMEOUT_SECS: u64 = 30;

/// Outcome of one probe run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Healthy { model_reply: String },
    ApiDown(String),
    ModelDown(String),
}

pub struct LivenessProbe {
    http: reqwest::Client,
    url: String,
    api_key: String,
    model: Arc<dyn ModelClient>,
}

impl LivenessProbe {
    pub fn new(url: &str, api_key: &str, model: Arc<dyn ModelClient>) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            url: url.to_string(),
            api_key: api_key.to_string(),
            model,
        })
    }

    /// Run one health check
    pub async fn check(&self) -> ProbeOutcome {
        let response = self
            .http
            .get(&self.url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                info!("[HEALTH] API health ok");
            }
            Ok(resp) => {
                error!("[HEALTH] API health error: HTTP {}", resp.status());
                return ProbeOutcome::ApiDown(format!("HTTP {}", resp.status()));
            }
            Err(e) => {
                error!("[HEALTH] API health error: {}", e);
                return ProbeOutcome::ApiDown(e.to_string());
            }
        }

        match self.model.ping(PING_PROMPT).await {
            Ok(reply) => {
                info!("[HEALTH] Agent health result: {}", reply);
                ProbeOutcome::Healthy { model_reply: reply }
            }
            Err(e) => {
                warn!("[HEALTH] Model round-trip failed: {}", e);
                ProbeOutcome::ModelDown(e.to_string())
            }
        }
    }

    /// Check now and then every `interval`, on a background task
    pub fn spawn(self, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                self.check().await;
            }
        })
    }
}
