//! Bearer token acquisition and caching for the completion API.
//!
//! The provider issues short-lived access tokens through a client-credentials
//! style exchange. [`CredentialManager`] keeps the last token and its expiry,
//! hands it out while it is still valid, and performs a new exchange once it
//! lapses.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use parley_shared::constants::REQUEST_ID_HEADER;

use crate::config::ServerConfig;
use crate::error::ServerError;

// ---------------------------------------------------------------------------
// Cached token
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Utc::now() < self.expires_at
    }
}

/// Successful reply of the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Lifetime in seconds.
    expires_in: i64,
}

// ---------------------------------------------------------------------------
// Credential manager
// ---------------------------------------------------------------------------

/// Produces valid bearer tokens, refreshing them on expiry.
#[derive(Clone)]
pub struct CredentialManager {
    http: reqwest::Client,
    token_url: String,
    auth_key: Option<String>,
    scope: String,
    /// Held across the exchange so concurrent callers share one refresh.
    cache: Arc<Mutex<Option<CachedToken>>>,
}

impl CredentialManager {
    pub fn new(http: reqwest::Client, config: &ServerConfig) -> Self {
        Self {
            http,
            token_url: config.token_url.clone(),
            auth_key: config.auth_key.clone(),
            scope: config.token_scope.clone(),
            cache: Arc::new(Mutex::new(None)),
        }
    }

    /// Return the cached token if it has not expired, otherwise exchange
    /// the client credential for a new one.
    pub async fn bearer_token(&self) -> Result<String, ServerError> {
        let mut cache = self.cache.lock().await;

        if let Some(token) = cache.as_ref() {
            if token.is_fresh() {
                debug!("Access token served from cache");
                return Ok(token.access_token.clone());
            }
        }

        let token = self.exchange().await?;
        let access_token = token.access_token.clone();
        *cache = Some(token);
        Ok(access_token)
    }

    async fn exchange(&self) -> Result<CachedToken, ServerError> {
        let auth_key = self.auth_key.as_deref().ok_or_else(|| {
            ServerError::Authentication("no upstream credential configured".into())
        })?;

        let request_id = Uuid::new_v4();
        let response = self
            .http
            .post(&self.token_url)
            .header("Authorization", format!("Basic {auth_key}"))
            .header("Accept", "application/json")
            .header(REQUEST_ID_HEADER, request_id.to_string())
            .form(&[("scope", self.scope.as_str())])
            .send()
            .await
            .map_err(|e| ServerError::Authentication(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, %request_id, body = %body, "Token exchange rejected");
            return Err(ServerError::Authentication(format!(
                "token endpoint responded {status}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ServerError::Authentication(format!("invalid token response: {e}")))?;

        let expires_at = Duration::try_seconds(token.expires_in)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                warn!(%request_id, expires_in = token.expires_in, "Token lifetime out of range");
                ServerError::Authentication("invalid token lifetime".into())
            })?;
        info!(%request_id, until = %expires_at, "Access token refreshed");

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at,
        })
    }
}
