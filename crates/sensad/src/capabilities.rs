//! Capability registry - the closed set of operations the model may invoke.
//!
//! A model request is first parsed into a [`Capability`] (schema check),
//! then run by the registry. Every path, including schema violations and
//! transport or payment failures, ends in a [`CapabilityResult`].

use crate::config::ResourceConfig;
use crate::model::ToolSpec;
use crate::payment::PaymentGatedClient;
use crate::signer::SignerSet;
use reqwest::Method;
use sensa_common::{
    analyze, render_report, summarize_reading, CapabilityInvocationRequest, CapabilityResult,
    SensorReading,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

pub const LATEST_READING: &str = "fetchIoTSensorData";
pub const WINDOW_ANALYSIS: &str = "fetchIoTSensorTop10Analysis";
pub const FALLBACK: &str = "fallback";

/// Reply of the greeting capability
pub const FALLBACK_GREETING: &str = "Hi! I am your IoT sensor assistant. I can fetch the latest \
     reading of a sensor or analyze its last 10 readings for abnormal vibration. Just tell me \
     the sensor address.";

/// Arguments shared by both sensor capabilities
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AddressArgs {
    pub address: String,
}

/// A validated capability invocation
#[derive(Debug, Clone, PartialEq)]
pub enum Capability {
    LatestReading(AddressArgs),
    WindowAnalysis(AddressArgs),
    Fallback,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaViolation {
    #[error("Unknown capability '{0}'")]
    UnknownCapability(String),

    #[error("Invalid arguments for '{capability}': {reason}")]
    InvalidArguments {
        capability: &'static str,
        reason: String,
    },
}

impl Capability {
    /// Validate a model request against the named capability's schema
    pub fn parse(request: &CapabilityInvocationRequest) -> Result<Self, SchemaViolation> {
        match request.name.as_str() {
            LATEST_READING => Ok(Self::LatestReading(parse_address(LATEST_READING, request)?)),
            WINDOW_ANALYSIS => Ok(Self::WindowAnalysis(parse_address(WINDOW_ANALYSIS, request)?)),
            FALLBACK => Ok(Self::Fallback),
            other => Err(SchemaViolation::UnknownCapability(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::LatestReading(_) => LATEST_READING,
            Self::WindowAnalysis(_) => WINDOW_ANALYSIS,
            Self::Fallback => FALLBACK,
        }
    }
}

fn parse_address(
    capability: &'static str,
    request: &CapabilityInvocationRequest,
) -> Result<AddressArgs, SchemaViolation> {
    let invalid = |reason: String| SchemaViolation::InvalidArguments { capability, reason };

    let args: AddressArgs = serde_json::from_value(Value::Object(request.arguments.clone()))
        .map_err(|e| invalid(e.to_string()))?;
    let address = args.address.trim();
    if address.is_empty() {
        return Err(invalid("address must not be empty".to_string()));
    }
    Ok(AddressArgs {
        address: address.to_string(),
    })
}

fn address_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "address": {
                "type": "string",
                "description": "IoT sensor contract or device address (string)."
            }
        },
        "required": ["address"]
    })
}

/// Tool definitions offered to the model
pub fn tool_specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: FALLBACK,
            description: "This tool activates when the user greets the assistant with a simple \
                'hi' or 'hello' and asks for help. It provides a friendly and welcoming message \
                to initiate the conversation.",
            parameters: json!({"type": "object", "properties": {}}),
        },
        ToolSpec {
            name: LATEST_READING,
            description: "Retrieve IoT sensor readings by sensor address using x402 payments. \
                Returns the latest reading.",
            parameters: address_schema(),
        },
        ToolSpec {
            name: WINDOW_ANALYSIS,
            description: "Retrieve and analyze the last 10 IoT sensor readings by address using \
                x402 payments. Returns maximum accelerometer values and detects abnormal \
                readings (values exceeding ±3). Use this tool when users want to check recent \
                sensor history or detect anomalies.",
            parameters: address_schema(),
        },
    ]
}

/// Runs capabilities against the payment-gated sensor resource
pub struct CapabilityRegistry {
    client: PaymentGatedClient,
    signers: SignerSet,
    resource: ResourceConfig,
}

impl CapabilityRegistry {
    pub fn new(client: PaymentGatedClient, signers: SignerSet, resource: ResourceConfig) -> Self {
        Self {
            client,
            signers,
            resource,
        }
    }

    pub fn tools(&self) -> Vec<ToolSpec> {
        tool_specs()
    }

    /// Validate and run one request. Never fails outside the result envelope.
    pub async fn dispatch(&self, request: &CapabilityInvocationRequest) -> CapabilityResult {
        let capability = match Capability::parse(request) {
            Ok(capability) => capability,
            Err(violation) => {
                warn!("[CAPABILITY] Rejected {}: {}", request.name, violation);
                return CapabilityResult::error(violation.to_string());
            }
        };

        info!("[CAPABILITY] Running {}", capability.name());
        match capability {
            Capability::LatestReading(args) => self.latest_reading(&args).await,
            Capability::WindowAnalysis(args) => self.window_analysis(&args).await,
            Capability::Fallback => CapabilityResult::info(FALLBACK_GREETING),
        }
    }

    async fn fetch(&self, capability: &str, url: &str, address: &str) -> Result<Value, String> {
        let payer = self
            .signers
            .payer_for(capability)
            .ok_or_else(|| "no payer account configured".to_string())?;

        self.client
            .request(Method::GET, url, &[("address", address)], payer.as_ref())
            .await
            .map(|response| response.body)
            .map_err(|e| e.to_string())
    }

    async fn latest_reading(&self, args: &AddressArgs) -> CapabilityResult {
        let body = match self
            .fetch(LATEST_READING, &self.resource.latest_url(), &args.address)
            .await
        {
            Ok(body) => body,
            Err(e) => {
                warn!("[CAPABILITY] Latest reading for {} failed: {}", args.address, e);
                return CapabilityResult::error(format!("Failed to retrieve sensor data: {}", e));
            }
        };

        match body.get("data").and_then(Value::as_object) {
            Some(data) => CapabilityResult::success(
                format!("IoT sensor data: \n\n{}", summarize_reading(data)),
                Some(body.clone()),
            ),
            None => CapabilityResult::info("No sensor readings found."),
        }
    }

    async fn window_analysis(&self, args: &AddressArgs) -> CapabilityResult {
        let body = match self
            .fetch(WINDOW_ANALYSIS, &self.resource.window_url(), &args.address)
            .await
        {
            Ok(body) => body,
            Err(e) => {
                warn!("[CAPABILITY] Window for {} failed: {}", args.address, e);
                return CapabilityResult::error(format!(
                    "Failed to retrieve top 10 sensor data: {}",
                    e
                ));
            }
        };

        // A malformed entry counts as a reading without accelerometer data
        let readings: Vec<SensorReading> = body
            .get("last")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .map(|entry| serde_json::from_value(entry.clone()).unwrap_or_default())
                    .collect()
            })
            .unwrap_or_default();

        match analyze(&readings) {
            Ok(result) => {
                info!(
                    "[CAPABILITY] {}: {} valid readings, abnormal={}",
                    args.address, result.valid_readings, result.abnormal
                );
                CapabilityResult::success(render_report(&result), serde_json::to_value(&result).ok())
            }
            Err(e) => CapabilityResult::error(e.to_string()),
        }
    }
}
