use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use eyre::{eyre, Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::OAuthConfig;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: String,
}

/// Exchanges a long-lived refresh token for short-lived access tokens and
/// caches the current one until shortly before it expires.
#[derive(Debug, Clone)]
pub struct TokenManager {
    oauth: OAuthConfig,
    client: reqwest::Client,
    cached: Arc<Mutex<Option<(Token, DateTime<Utc>)>>>,
}

impl TokenManager {
    pub fn new(oauth: OAuthConfig) -> TokenManager {
        TokenManager {
            oauth,
            client: reqwest::Client::new(),
            cached: Arc::new(Mutex::new(None)),
        }
    }

    /// Current access token, refreshed through the token endpoint if the
    /// cached one is gone or about to expire.
    pub async fn bearer(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some((token, acquired_at)) = cached.as_ref() {
            // refresh a minute early so in-flight requests don't race expiry
            let expires_at = *acquired_at + Duration::seconds((token.expires_in - 60).max(0));
            if Utc::now() < expires_at {
                return Ok(token.access_token.clone());
            }
        }

        debug!("Refreshing YouTube access token");
        let res = self
            .client
            .post(&self.oauth.token_url)
            .form(&[
                ("client_id", self.oauth.client_id.as_str()),
                ("client_secret", self.oauth.client_secret.as_str()),
                ("refresh_token", self.oauth.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .context("Sending token refresh request")?;
        if !res.status().is_success() {
            return Err(eyre!(
                "Token refresh failed {}. Response: {}",
                res.status(),
                res.text().await?
            ));
        }

        let token: Token = res.json().await.context("Parsing token response")?;
        if token.access_token.is_empty() {
            return Err(eyre!("Token endpoint returned an empty access token"));
        }

        let access_token = token.access_token.clone();
        *cached = Some((token, Utc::now()));
        Ok(access_token)
    }
}
