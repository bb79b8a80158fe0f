//! Payment-gated HTTP client.
//!
//! Sends a request; when the resource answers `402 Payment Required` the
//! embedded challenge is handed to the payer identity and the request is
//! retried exactly once with the proof in the `X-PAYMENT` header. Every
//! network or decoding fault comes back as a [`PaymentError`].

use crate::signer::PayerIdentity;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Header carrying the payment proof on the retried request
pub const PAYMENT_HEADER: &str = "X-PAYMENT";

/// Header the resource uses to return its settlement receipt
pub const PAYMENT_RESPONSE_HEADER: &str = "X-PAYMENT-RESPONSE";

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Resource returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid payment challenge: {0}")]
    InvalidChallenge(String),

    #[error("Payment authorization failed: {0}")]
    Authorization(String),

    #[error("Payment rejected by resource: {0}")]
    Rejected(String),

    #[error("Invalid JSON response: {0}")]
    InvalidBody(String),
}

/// Priced demand issued by the resource. Consumed once per attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentChallenge {
    pub x402_version: u32,
    pub scheme: String,
    pub network: String,
    /// Amount in the asset's atomic units, kept as the exact decimal string
    pub price: String,
    pub resource: String,
    pub description: Option<String>,
    pub pay_to: Option<String>,
    pub asset: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChallengeEnvelope {
    #[serde(default = "default_x402_version")]
    x402_version: u32,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    accepts: Vec<PaymentRequirements>,
}

fn default_x402_version() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentRequirements {
    #[serde(default = "default_scheme")]
    scheme: String,
    network: String,
    max_amount_required: String,
    resource: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    pay_to: Option<String>,
    #[serde(default)]
    asset: Option<String>,
}

fn default_scheme() -> String {
    "exact".to_string()
}

impl PaymentChallenge {
    /// Parse a 402 body; the first accepted payment option is used
    pub fn parse(body: &[u8]) -> Result<Self, PaymentError> {
        let envelope: ChallengeEnvelope = serde_json::from_slice(body)
            .map_err(|e| PaymentError::InvalidChallenge(e.to_string()))?;

        let requirements = envelope.accepts.into_iter().next().ok_or_else(|| {
            PaymentError::InvalidChallenge(
                envelope
                    .error
                    .unwrap_or_else(|| "no accepted payment options".to_string()),
            )
        })?;

        if requirements.max_amount_required.trim().parse::<f64>().is_err() {
            return Err(PaymentError::InvalidChallenge(format!(
                "price '{}' is not a decimal amount",
                requirements.max_amount_required
            )));
        }

        Ok(Self {
            x402_version: envelope.x402_version,
            scheme: requirements.scheme,
            network: requirements.network,
            price: requirements.max_amount_required,
            resource: requirements.resource,
            description: requirements.description,
            pay_to: requirements.pay_to,
            asset: requirements.asset,
        })
    }
}

/// Proof produced by a payer identity for one challenge
#[derive(Debug, Clone)]
pub struct PaymentAuthorization {
    /// Value of the X-PAYMENT header
    pub header_value: String,
    pub payer: String,
    pub nonce: String,
}

/// Final successful response of a (possibly paid) request
#[derive(Debug, Clone)]
pub struct PaidResponse {
    pub status: u16,
    pub body: Value,
    /// Whether a payment was attached
    pub paid: bool,
    pub settlement: Option<String>,
}

/// HTTP client that completes payment challenges
#[derive(Clone)]
pub struct PaymentGatedClient {
    http: reqwest::Client,
    timeout_secs: u64,
}

impl PaymentGatedClient {
    pub fn new(timeout_secs: u64) -> Result<Self, PaymentError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PaymentError::Transport(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { http, timeout_secs })
    }

    /// Issue `method url?query`, paying through `payer` if challenged.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        payer: &dyn PayerIdentity,
    ) -> Result<PaidResponse, PaymentError> {
        let response = self.send(method.clone(), url, query, None).await?;

        if response.status() != StatusCode::PAYMENT_REQUIRED {
            return self.finish(response, false).await;
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_reqwest(e))?;
        let challenge = PaymentChallenge::parse(&body)?;
        info!(
            "[PAYMENT] {} requires {} on {} (account {})",
            challenge.resource,
            challenge.price,
            challenge.network,
            payer.account()
        );

        let authorization = payer.authorize(&challenge).await?;
        debug!(
            "[PAYMENT] Authorization {} from {}",
            authorization.nonce, authorization.payer
        );

        let retried = self
            .send(method, url, query, Some(&authorization.header_value))
            .await?;

        if retried.status() == StatusCode::PAYMENT_REQUIRED {
            let reason = retried
                .json::<Value>()
                .await
                .ok()
                .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| "payment not accepted".to_string());
            warn!("[PAYMENT] Retry still requires payment: {}", reason);
            return Err(PaymentError::Rejected(reason));
        }

        self.finish(retried, true).await
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        payment: Option<&str>,
    ) -> Result<reqwest::Response, PaymentError> {
        let mut request = self.http.request(method, url).query(query);
        if let Some(header) = payment {
            request = request.header(PAYMENT_HEADER, header);
        }
        request.send().await.map_err(|e| self.map_reqwest(e))
    }

    async fn finish(
        &self,
        response: reqwest::Response,
        paid: bool,
    ) -> Result<PaidResponse, PaymentError> {
        let status = response.status();
        let settlement = response
            .headers()
            .get(PAYMENT_RESPONSE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if let Some(receipt) = &settlement {
            info!("[PAYMENT] Settlement receipt: {}", receipt);
        }

        let bytes = response.bytes().await.map_err(|e| self.map_reqwest(e))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<Value>(&bytes)
                .ok()
                .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| String::from_utf8_lossy(&bytes).trim().to_string());
            return Err(PaymentError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = serde_json::from_slice(&bytes)
            .map_err(|e| PaymentError::InvalidBody(e.to_string()))?;

        Ok(PaidResponse {
            status: status.as_u16(),
            body,
            paid,
            settlement,
        })
    }

    fn map_reqwest(&self, e: reqwest::Error) -> PaymentError {
        if e.is_timeout() {
            PaymentError::Timeout(self.timeout_secs)
        } else {
            PaymentError::Transport(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_challenge() {
        let body = br#"{
            "x402Version": 1,
            "error": "X-PAYMENT header is required",
            "accepts": [{
                "scheme": "exact",
                "network": "base",
                "maxAmountRequired": "1000",
                "resource": "http://localhost:3000/api/sensors/latest",
                "description": "Latest reading",
                "payTo": "0x5c2aec641952fb009aa879d411f13f274362e7ea",
                "asset": "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913"
            }]
        }"#;
        let challenge = PaymentChallenge::parse(body).unwrap();
        assert_eq!(challenge.price, "1000");
        assert_eq!(challenge.network, "base");
        assert_eq!(challenge.resource, "http://localhost:3000/api/sensors/latest");
        assert_eq!(challenge.description.as_deref(), Some("Latest reading"));
    }

    #[test]
    fn test_challenge_without_options_is_invalid() {
        let err = PaymentChallenge::parse(br#"{"x402Version":1,"error":"nope","accepts":[]}"#)
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidChallenge(ref m) if m == "nope"));
    }

    #[test]
    fn test_challenge_with_bad_price_is_invalid() {
        let body = br#"{"accepts":[{"network":"base","maxAmountRequired":"lots","resource":"r"}]}"#;
        assert!(matches!(
            PaymentChallenge::parse(body),
            Err(PaymentError::InvalidChallenge(_))
        ));
    }

    #[test]
    fn test_non_json_challenge_is_invalid() {
        assert!(matches!(
            PaymentChallenge::parse(b"<html>pay me</html>"),
            Err(PaymentError::InvalidChallenge(_))
        ));
    }
}
