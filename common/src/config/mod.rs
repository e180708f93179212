use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Service configuration, deserialized from a YAML file and validated once at
/// startup. `LOG` is the only environment variable the service reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "web_api", derive(utoipa::ToSchema))]
pub struct Config {
    /// Public URL of the push callback, exactly as the hub should call it
    #[validate(url)]
    pub callback_url: String,
    /// PubSubHubbub endpoint subscription requests are sent to
    #[serde(default = "default_hub_url")]
    #[validate(url)]
    pub hub_url: String,
    /// Shared secret forwarded to the hub and used to verify notification
    /// signatures. Unsigned notifications are accepted when unset.
    #[serde(default)]
    pub secret: Option<String>,
    /// Requested subscription lease in seconds
    #[serde(default = "default_lease_seconds")]
    pub lease_seconds: u32,
    /// Resolve channel ids remotely when URL matching is not enough
    #[serde(default = "default_true")]
    pub auto_resolve_channels: bool,
    #[serde(default = "default_database")]
    pub database: String,
    #[validate(nested)]
    #[serde(default)]
    pub youtube: YouTubeConfig,
    #[validate(nested)]
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "web_api", derive(utoipa::ToSchema))]
pub struct YouTubeConfig {
    /// Data API key. Remote lookups are skipped when neither this nor `oauth`
    /// is set.
    #[serde(default)]
    pub api_key: Option<String>,
    #[validate(nested)]
    #[serde(default)]
    pub oauth: Option<OAuthConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "web_api", derive(utoipa::ToSchema))]
pub struct OAuthConfig {
    #[validate(length(min = 1))]
    pub client_id: String,
    #[validate(length(min = 1))]
    pub client_secret: String,
    #[validate(length(min = 1))]
    pub refresh_token: String,
    #[serde(default = "default_token_url")]
    #[validate(url)]
    pub token_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "web_api", derive(utoipa::ToSchema))]
pub struct CacheConfig {
    /// Maximum entries per lookup cache
    #[serde(default = "default_cache_capacity")]
    #[validate(range(min = 1))]
    pub capacity: u64,
    /// Seconds a cached lookup stays valid
    #[serde(default = "default_cache_ttl")]
    #[validate(range(min = 1))]
    pub ttl_secs: u64,
}

impl Config {
    pub fn parse_and_validate(&mut self) -> Result<()> {
        self.validate()?;

        if self.lease_seconds == 0 {
            return Err(eyre!("lease_seconds must be greater than zero"));
        }
        if matches!(self.secret.as_deref(), Some("")) {
            return Err(eyre!("secret cannot be empty, leave it unset instead"));
        }
        if self.database.is_empty() {
            return Err(eyre!("database path cannot be empty"));
        }

        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl(),
        }
    }
}

fn default_hub_url() -> String {
    "https://pubsubhubbub.appspot.com/subscribe".to_owned()
}

fn default_lease_seconds() -> u32 {
    432000
}

fn default_true() -> bool {
    true
}

fn default_database() -> String {
    "bridge.db".to_owned()
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_owned()
}

fn default_cache_capacity() -> u64 {
    512
}

fn default_cache_ttl() -> u64 {
    86400
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    fn minimal() -> Config {
        serde_json::from_value(json!({
            "callback_url": "https://hub.example.com/api/push/callback"
        }))
        .unwrap()
    }

    #[test]
    fn defaults_fill_in() {
        let mut config = minimal();
        config.parse_and_validate().unwrap();

        assert_eq!(config.hub_url, "https://pubsubhubbub.appspot.com/subscribe");
        assert_eq!(config.lease_seconds, 432000);
        assert!(config.auto_resolve_channels);
        assert_eq!(config.database, "bridge.db");
        assert_eq!(config.secret, None);
        assert_eq!(config.cache.capacity, 512);
        assert_eq!(config.cache.ttl_secs, 86400);
    }

    #[test]
    fn rejects_bad_urls() {
        let mut config = minimal();
        config.callback_url = "not a url".to_owned();
        assert!(config.parse_and_validate().is_err());

        let mut config = minimal();
        config.hub_url = "also not a url".to_owned();
        assert!(config.parse_and_validate().is_err());
    }

    #[test]
    fn rejects_empty_secret() {
        let mut config = minimal();
        config.secret = Some(String::new());
        assert!(config.parse_and_validate().is_err());
    }

    #[test]
    fn oauth_block_is_validated() {
        let mut config = minimal();
        config.youtube.oauth = Some(OAuthConfig {
            client_id: String::new(),
            client_secret: "s".to_owned(),
            refresh_token: "r".to_owned(),
            token_url: default_token_url(),
        });
        assert!(config.parse_and_validate().is_err());
    }
}
