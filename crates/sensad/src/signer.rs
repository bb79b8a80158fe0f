//! Payer identities - sign payment authorizations for the payment-gated client.
//!
//! Each capability is bound to one account at construction time so spend can
//! be attributed per capability. Settlement itself happens on the resource
//! side; this module only produces the proof the resource expects.

use crate::config::PaymentConfig;
use crate::payment::{PaymentAuthorization, PaymentChallenge, PaymentError};
use async_trait::async_trait;
use base64::Engine;
use ed25519_dalek::{Signer, SigningKey};
use rand::RngCore;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Seconds a signed authorization stays valid
pub const AUTHORIZATION_TTL_SECS: i64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("Account '{0}': seed is not valid hex")]
    InvalidHex(String),

    #[error("Account '{0}': seed must be 32 bytes, got {1}")]
    InvalidLength(String, usize),
}

/// Signing capability bound to one account
#[async_trait]
pub trait PayerIdentity: Send + Sync {
    /// Account name used for attribution in logs
    fn account(&self) -> &str;

    /// Public address the resource sees as the payer
    fn address(&self) -> String;

    /// Build a payment proof for one challenge
    async fn authorize(
        &self,
        challenge: &PaymentChallenge,
    ) -> Result<PaymentAuthorization, PaymentError>;
}

/// Ed25519 signer holding its key in process
pub struct LocalSigner {
    account: String,
    key: SigningKey,
}

impl LocalSigner {
    pub fn from_hex_seed(account: &str, seed_hex: &str) -> Result<Self, SignerError> {
        let trimmed = seed_hex.trim().trim_start_matches("0x");
        let bytes =
            hex::decode(trimmed).map_err(|_| SignerError::InvalidHex(account.to_string()))?;
        let seed: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| SignerError::InvalidLength(account.to_string(), bytes.len()))?;

        Ok(Self {
            account: account.to_string(),
            key: SigningKey::from_bytes(&seed),
        })
    }

    /// Fresh random key, for development setups without configured seeds
    pub fn generate(account: &str) -> Self {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        Self {
            account: account.to_string(),
            key: SigningKey::from_bytes(&seed),
        }
    }
}

#[async_trait]
impl PayerIdentity for LocalSigner {
    fn account(&self) -> &str {
        &self.account
    }

    fn address(&self) -> String {
        format!("0x{}", hex::encode(self.key.verifying_key().to_bytes()))
    }

    async fn authorize(
        &self,
        challenge: &PaymentChallenge,
    ) -> Result<PaymentAuthorization, PaymentError> {
        let now = chrono::Utc::now().timestamp();
        let mut nonce = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut nonce);
        let nonce = format!("0x{}", hex::encode(nonce));

        let authorization = json!({
            "from": self.address(),
            "to": challenge.pay_to.clone().unwrap_or_default(),
            "value": challenge.price,
            "validAfter": (now - 1).to_string(),
            "validBefore": (now + AUTHORIZATION_TTL_SECS).to_string(),
            "nonce": nonce,
            "resource": challenge.resource,
        });

        let canonical = serde_json::to_vec(&authorization)
            .map_err(|e| PaymentError::Authorization(e.to_string()))?;
        let digest = Sha256::digest(&canonical);
        let signature = self.key.sign(&digest);

        let proof = json!({
            "x402Version": challenge.x402_version,
            "scheme": challenge.scheme,
            "network": challenge.network,
            "payload": {
                "signature": format!("0x{}", hex::encode(signature.to_bytes())),
                "authorization": authorization,
            },
        });
        let encoded = serde_json::to_vec(&proof)
            .map_err(|e| PaymentError::Authorization(e.to_string()))?;

        Ok(PaymentAuthorization {
            header_value: base64::engine::general_purpose::STANDARD.encode(encoded),
            payer: self.address(),
            nonce,
        })
    }
}

/// Capability name -> payer identity, built once at startup
#[derive(Clone, Default)]
pub struct SignerSet {
    by_capability: HashMap<String, Arc<dyn PayerIdentity>>,
    default: Option<Arc<dyn PayerIdentity>>,
}

impl SignerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every configured account and bind capabilities to them
    pub fn from_config(config: &PaymentConfig) -> Result<Self, SignerError> {
        let mut accounts: HashMap<String, Arc<dyn PayerIdentity>> = HashMap::new();
        for (name, seed) in &config.accounts {
            let signer = LocalSigner::from_hex_seed(name, seed)?;
            info!("[PAYMENT] Account '{}' -> {}", name, signer.address());
            accounts.insert(name.clone(), Arc::new(signer));
        }

        let mut set = Self::new();
        for (capability, account) in &config.capability_accounts {
            match accounts.get(account) {
                Some(signer) => {
                    set.by_capability.insert(capability.clone(), signer.clone());
                }
                None => warn!(
                    "[PAYMENT] Capability '{}' is bound to unknown account '{}'",
                    capability, account
                ),
            }
        }
        set.default = accounts.get(&config.default_account).cloned();
        Ok(set)
    }

    /// Bind a capability to an identity (used by tests and embedders)
    pub fn with_payer(mut self, capability: &str, payer: Arc<dyn PayerIdentity>) -> Self {
        self.by_capability.insert(capability.to_string(), payer);
        self
    }

    pub fn with_default(mut self, payer: Arc<dyn PayerIdentity>) -> Self {
        self.default = Some(payer);
        self
    }

    pub fn payer_for(&self, capability: &str) -> Option<Arc<dyn PayerIdentity>> {
        self.by_capability
            .get(capability)
            .cloned()
            .or_else(|| self.default.clone())
    }
}
