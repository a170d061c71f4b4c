//! Server configuration loaded from environment variables.
//!
//! Everything except the upstream credential has a default so the server can
//! start with zero configuration for local development. Without a credential
//! the chat endpoints fail at the token exchange.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use parley_shared::constants::{DEFAULT_HTTP_PORT, DEFAULT_TOKEN_SCOPE};

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`, or `PORT` to change only the port.
    /// Default: `0.0.0.0:5000`
    pub http_addr: SocketAddr,

    /// Path of the JSON document holding chats, prompts and settings.
    /// Env: `STORE_PATH`
    /// Default: `None` (platform data directory).
    pub store_path: Option<PathBuf>,

    /// Chat completion endpoint of the language-model provider.
    /// Env: `API_URL`
    pub api_url: String,

    /// OAuth token endpoint of the provider.
    /// Env: `TOKEN_URL`
    pub token_url: String,

    /// Pre-encoded basic-auth credential for the token exchange.
    /// Env: `AUTH_KEY`, or `CLIENT_ID` + `CLIENT_SECRET` which are encoded here.
    pub auth_key: Option<String>,

    /// Scope requested during the token exchange.
    /// Env: `TOKEN_SCOPE`
    /// Default: `GIGACHAT_API_PERS`
    pub token_scope: String,

    /// Skip TLS certificate verification on upstream calls.
    /// Env: `ACCEPT_INVALID_CERTS` (true/false)
    /// Default: `true`
    pub accept_invalid_certs: bool,

    /// Timeout applied to every upstream call.
    /// Env: `UPSTREAM_TIMEOUT_SECS`
    /// Default: none (wait indefinitely).
    pub upstream_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            store_path: None,
            api_url: "https://gigachat.devices.sberbank.ru/api/v1/chat/completions".to_string(),
            token_url: "https://ngw.devices.sberbank.ru:9443/api/v2/oauth".to_string(),
            auth_key: None,
            token_scope: DEFAULT_TOKEN_SCOPE.to_string(),
            accept_invalid_certs: true,
            upstream_timeout: None,
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("store_path", &self.store_path)
            .field("api_url", &self.api_url)
            .field("token_url", &self.token_url)
            .field("auth_key", &self.auth_key.as_ref().map(|_| "<redacted>"))
            .field("token_scope", &self.token_scope)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("upstream_timeout", &self.upstream_timeout)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.http_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default"),
            }
        }

        if let Some(port) = lookup("PORT") {
            match port.parse::<u16>() {
                Ok(parsed) => config.http_addr.set_port(parsed),
                Err(_) => tracing::warn!(value = %port, "Invalid PORT, using default"),
            }
        }

        if let Some(path) = lookup("STORE_PATH") {
            if !path.is_empty() {
                config.store_path = Some(PathBuf::from(path));
            }
        }

        if let Some(url) = lookup("API_URL") {
            config.api_url = url;
        }

        if let Some(url) = lookup("TOKEN_URL") {
            config.token_url = url;
        }

        config.auth_key = lookup("AUTH_KEY").filter(|k| !k.is_empty()).or_else(|| {
            match (lookup("CLIENT_ID"), lookup("CLIENT_SECRET")) {
                (Some(id), Some(secret)) => Some(encode_basic_credential(&id, &secret)),
                _ => None,
            }
        });

        if let Some(scope) = lookup("TOKEN_SCOPE") {
            config.token_scope = scope;
        }

        if let Some(val) = lookup("ACCEPT_INVALID_CERTS") {
            config.accept_invalid_certs = val != "false" && val != "0";
        }

        if let Some(val) = lookup("UPSTREAM_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(0) => config.upstream_timeout = None,
                Ok(secs) => config.upstream_timeout = Some(Duration::from_secs(secs)),
                Err(_) => tracing::warn!(value = %val, "Invalid UPSTREAM_TIMEOUT_SECS, ignoring"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

/// Encode `client_id:client_secret` the way HTTP basic auth expects it.
fn encode_basic_credential(client_id: &str, client_secret: &str) -> String {
    BASE64.encode(format!("{client_id}:{client_secret}"))
}
