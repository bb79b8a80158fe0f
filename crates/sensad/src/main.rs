//! Sensa Daemon - conversational front door to payment-gated IoT sensors
//!
//! Routes each chat message through the model, runs at most one sensor
//! capability per turn, and pays for sensor data on demand.

use anyhow::{Context, Result};
use clap::Parser;
use sensad::capabilities::CapabilityRegistry;
use sensad::config::Config;
use sensad::health::LivenessProbe;
use sensad::model::ModelClient;
use sensad::ollama::OllamaClient;
use sensad::payment::PaymentGatedClient;
use sensad::router::TurnRouter;
use sensad::server::{self, AppState};
use sensad::signer::SignerSet;
use sensad::store::{ConversationStore, InMemoryStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sensad", version, about = "Payment-gated sensor assistant daemon")]
struct Args {
    /// Path to config.toml (defaults to $SENSA_CONFIG or /etc/sensa/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    info!("Sensa Daemon v{} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::load(args.config.as_deref())?;
    if config.server.api_key.is_empty() {
        warn!("No API key configured (SENSA_API_KEY): every request will be rejected");
    }

    let signers = SignerSet::from_config(&config.payment).context("Invalid payment accounts")?;
    if config.payment.accounts.is_empty() {
        warn!("No payer accounts configured: paid capabilities will report errors");
    }

    let payment_client = PaymentGatedClient::new(config.resource.timeout_secs)?;
    let registry = Arc::new(CapabilityRegistry::new(
        payment_client,
        signers,
        config.resource.clone(),
    ));
    let model: Arc<dyn ModelClient> = Arc::new(OllamaClient::new(config.llm.clone())?);
    let store: Arc<dyn ConversationStore> = Arc::new(InMemoryStore::new(config.store.max_threads));
    info!("  Model {} at {}", config.llm.model, config.llm.endpoint);
    info!("  Sensor resource {}", config.resource.base_url);

    if config.health.enabled {
        LivenessProbe::new(&config.health.url, &config.server.api_key, model.clone())
            .context("Failed to create liveness probe client")?
            .spawn(Duration::from_secs(config.health.interval_secs.max(1)));
    }

    let router = TurnRouter::new(model, registry, store);
    let state = AppState::new(router, config.server.api_key.clone());
    let addr = format!("{}:{}", config.server.bind, config.server.port);

    tokio::select! {
        result = server::run(state, &addr) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down gracefully"),
    }

    Ok(())
}
