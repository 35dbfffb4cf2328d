//! gastos webhook server.

use std::sync::Arc;

use ai_client::AiClient;
use channels::{KapsoClient, KapsoConfig, SignatureConfig, SignatureVerifier, TelegramClient, TelegramConfig};
use database::{Database, LocalObjectStore};
use expense_core::ChannelTransport;
use pipeline::{AiPorts, ChatRouter, ExpenseFlow, MediaArchive, PipelineConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use webhook_server::{build_app, sweeps, AppState, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env()?;
    info!(addr = %config.addr, "server.starting");

    let db = Database::connect(&config.database_url).await?;
    db.migrate().await?;

    let ai = Arc::new(AiClient::from_env()?);
    let ports = AiPorts {
        extractor: ai.clone(),
        classifier: ai.clone(),
        generator: ai.clone(),
    };
    let pipeline_config = PipelineConfig::from_env();
    let flow = Arc::new(ExpenseFlow::new(db.clone(), ports, pipeline_config.clone()));

    let store = Arc::new(LocalObjectStore::new(config.media_dir.clone()));
    let media = MediaArchive::new(db.clone(), store, pipeline_config.media_retention_days);
    let router = Arc::new(ChatRouter::new(flow, ai, media.clone()));

    let whatsapp_signatures = SignatureVerifier::new(SignatureConfig::kapso_from_env()?);
    info!(mode = whatsapp_signatures.mode().as_str(), "server.whatsapp_signature_mode");
    let kapso = KapsoClient::new(KapsoConfig::from_env(), whatsapp_signatures.clone())?;
    if !kapso.config().is_configured() {
        warn!("server.kapso_unconfigured");
    }

    let telegram: Option<Arc<dyn ChannelTransport>> = match TelegramConfig::from_env().map(TelegramClient::new) {
        Some(Ok(client)) => Some(Arc::new(client)),
        Some(Err(e)) => {
            warn!(error = %e, "server.telegram_disabled");
            None
        }
        None => {
            info!("server.telegram_unconfigured");
            None
        }
    };

    let email_signatures = SignatureVerifier::new(SignatureConfig::email_from_env()?);

    let state = AppState {
        db: db.clone(),
        router,
        whatsapp: Arc::new(kapso),
        whatsapp_signatures: Arc::new(whatsapp_signatures),
        telegram,
        email_signatures: Arc::new(email_signatures),
    };

    sweeps::spawn(db.clone(), media, config.sweep_interval, config.webhook_retention_days);

    let app = build_app(state);

    info!(addr = %config.addr, "server.listening");
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("server.shutdown");
        })
        .await?;

    db.close().await;
    Ok(())
}
