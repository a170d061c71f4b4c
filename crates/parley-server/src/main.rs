//! # parley-server
//!
//! Backend for the Parley chat application.
//!
//! This binary provides:
//! - **Document store** holding chats, prompts and generation settings in a
//!   single JSON file rewritten on every change
//! - **Credential manager** that obtains and caches bearer tokens for the
//!   upstream language-model API
//! - **Completion gateway** that turns stored conversations into completion
//!   calls and persists the replies
//! - **REST API** (axum) exposing all of the above to the client

mod api;
mod config;
mod credentials;
mod error;
mod gateway;

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use parley_shared::constants::APP_NAME;
use parley_store::DocumentStore;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::credentials::CredentialManager;
use crate::gateway::CompletionGateway;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,parley_server=debug")),
        )
        .init();

    info!("Starting {} server v{}", APP_NAME, env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    if config.auth_key.is_none() {
        warn!("No AUTH_KEY or CLIENT_ID/CLIENT_SECRET set; completion calls will fail");
    }
    if config.accept_invalid_certs {
        warn!("TLS certificate verification is disabled for upstream calls");
    }

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let store = match &config.store_path {
        Some(path) => DocumentStore::open_at(path)?,
        None => DocumentStore::open_default()?,
    };
    info!(path = %store.path().display(), "Document store ready");

    let http = gateway::http_client(&config)?;
    let credentials = CredentialManager::new(http.clone(), &config);
    let gateway = CompletionGateway::new(http, &config, credentials);

    let app_state = AppState {
        store: Arc::new(Mutex::new(store)),
        gateway,
    };

    // -----------------------------------------------------------------------
    // 4. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
