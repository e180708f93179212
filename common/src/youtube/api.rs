use eyre::Result;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{error, warn};

use super::{auth::TokenManager, is_channel_id};

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

#[derive(Debug, Clone)]
pub enum Auth {
    /// No credentials configured, every lookup returns `None`
    None,
    ApiKey(String),
    OAuth(TokenManager),
}

/// Minimal YouTube Data API v3 client covering the lookups the bridge needs:
/// video metadata and identifier to channel id resolution.
#[derive(Debug, Clone)]
pub struct Client {
    auth: Auth,
    base_url: String,
    client: reqwest::Client,
}

impl Client {
    pub fn new(auth: Auth, base_url: String) -> Client {
        Client {
            auth,
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// Snippet metadata for a single video.
    pub async fn video_details(&self, video_id: &str) -> Result<Option<VideoDetails>> {
        let res: Option<VideoListResponse> = self
            .get("/videos", &[("part", "snippet"), ("id", video_id)])
            .await?;
        Ok(res.and_then(|r| r.items.into_iter().next()))
    }

    /// Snippet metadata for a single channel.
    pub async fn channel_details(&self, channel_id: &str) -> Result<Option<ChannelDetails>> {
        let res: Option<ChannelListResponse> = self
            .get("/channels", &[("part", "snippet"), ("id", channel_id)])
            .await?;
        Ok(res.and_then(|r| r.items.into_iter().next()))
    }

    /// Maps a channel identifier (`@handle`, legacy username or vanity name)
    /// to a channel id. Raw `UC…` ids pass through untouched.
    pub async fn resolve_channel_id(&self, ident: &str) -> Result<Option<String>> {
        if is_channel_id(ident) {
            return Ok(Some(ident.to_owned()));
        }

        let lookup = if ident.starts_with('@') {
            ("forHandle", ident)
        } else {
            ("forUsername", ident)
        };
        let res: Option<ChannelListResponse> =
            self.get("/channels", &[("part", "snippet"), lookup]).await?;
        if let Some(channel) = res.and_then(|r| r.items.into_iter().next()) {
            return Ok(Some(channel.id));
        }

        // vanity names predating handles only show up through search
        let res: Option<SearchListResponse> = self
            .get(
                "/search",
                &[
                    ("part", "snippet"),
                    ("type", "channel"),
                    ("maxResults", "1"),
                    ("q", ident),
                ],
            )
            .await?;
        Ok(res
            .and_then(|r| r.items.into_iter().next())
            .and_then(|item| item.id.channel_id))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<Option<T>> {
        let mut req = self
            .client
            .get(format!("{}{path}", self.base_url))
            .query(query);
        match &self.auth {
            Auth::None => {
                warn!("No YouTube API credentials configured, skipping {path} lookup");
                return Ok(None);
            }
            Auth::ApiKey(key) => req = req.query(&[("key", key.as_str())]),
            Auth::OAuth(manager) => req = req.bearer_auth(manager.bearer().await?),
        }

        let res = req.send().await?;
        if !res.status().is_success() {
            error!(
                "YouTube API {path} request failed {}. Response: {}",
                res.status(),
                res.text().await?
            );
            return Ok(None);
        }
        Ok(Some(res.json().await?))
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct VideoListResponse {
    #[serde(default)]
    pub items: Vec<VideoDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "web_api", derive(utoipa::ToSchema))]
pub struct VideoDetails {
    pub id: String,
    pub snippet: VideoSnippet,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "web_api", derive(utoipa::ToSchema))]
pub struct VideoSnippet {
    pub title: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub channel_title: String,
    #[serde(default)]
    pub thumbnails: Thumbnails,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "web_api", derive(utoipa::ToSchema))]
pub struct Thumbnails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<Thumbnail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium: Option<Thumbnail>,
    #[serde(default, rename = "default", skip_serializing_if = "Option::is_none")]
    pub standard: Option<Thumbnail>,
}

impl Thumbnails {
    /// Highest quality variant available.
    pub fn best(&self) -> Option<&str> {
        self.high
            .as_ref()
            .or(self.medium.as_ref())
            .or(self.standard.as_ref())
            .map(|t| t.url.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "web_api", derive(utoipa::ToSchema))]
pub struct Thumbnail {
    pub url: String,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ChannelListResponse {
    #[serde(default)]
    pub items: Vec<ChannelDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "web_api", derive(utoipa::ToSchema))]
pub struct ChannelDetails {
    pub id: String,
    pub snippet: ChannelSnippet,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "web_api", derive(utoipa::ToSchema))]
pub struct ChannelSnippet {
    pub title: String,
    #[serde(default)]
    pub custom_url: String,
    #[serde(default)]
    pub thumbnails: Thumbnails,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SearchListResponse {
    #[serde(default)]
    pub items: Vec<SearchItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchItem {
    pub id: SearchId,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchId {
    #[serde(default)]
    pub channel_id: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn thumbnail_quality_order() {
        let url = |u: &str| {
            Some(Thumbnail {
                url: u.to_owned(),
            })
        };

        let full = Thumbnails {
            high: url("high"),
            medium: url("medium"),
            standard: url("standard"),
        };
        assert_eq!(full.best(), Some("high"));

        let partial = Thumbnails {
            high: None,
            medium: None,
            standard: url("standard"),
        };
        assert_eq!(partial.best(), Some("standard"));

        assert_eq!(Thumbnails::default().best(), None);
    }

    #[test]
    fn list_responses_tolerate_missing_items() {
        let empty: VideoListResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.items.is_empty());

        let res: ChannelListResponse = serde_json::from_str(
            r#"{"kind":"youtube#channelListResponse","items":[{"id":"UCx","snippet":{"title":"Someone","customUrl":"@someone"}}]}"#,
        )
        .unwrap();
        assert_eq!(res.items[0].snippet.custom_url, "@someone");
    }
}
