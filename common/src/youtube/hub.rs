use eyre::{eyre, Context, Result};
use tracing::debug;

pub const TOPIC_BASE: &str = "https://www.youtube.com/xml/feeds/videos.xml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubMode {
    Subscribe,
    Unsubscribe,
}

impl HubMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            HubMode::Subscribe => "subscribe",
            HubMode::Unsubscribe => "unsubscribe",
        }
    }
}

/// PubSubHubbub client. Subscription requests are fire-and-forget form posts;
/// the hub verifies them later with its own handshake against the callback.
#[derive(Debug, Clone)]
pub struct Hub {
    hub_url: String,
    callback_url: String,
    secret: Option<String>,
    lease_seconds: u32,
    client: reqwest::Client,
}

impl Hub {
    pub fn new(
        hub_url: String,
        callback_url: String,
        secret: Option<String>,
        lease_seconds: u32,
    ) -> Hub {
        Hub {
            hub_url,
            callback_url,
            secret,
            lease_seconds,
            client: reqwest::Client::new(),
        }
    }

    /// Feed topic URL for a channel, the identity the hub keys leases on.
    pub fn topic_url(channel_id: &str) -> String {
        format!("{TOPIC_BASE}?channel_id={channel_id}")
    }

    pub async fn subscribe(&self, channel_id: &str) -> Result<()> {
        self.send(HubMode::Subscribe, channel_id).await
    }

    pub async fn unsubscribe(&self, channel_id: &str) -> Result<()> {
        self.send(HubMode::Unsubscribe, channel_id).await
    }

    async fn send(&self, mode: HubMode, channel_id: &str) -> Result<()> {
        let topic = Self::topic_url(channel_id);
        let mut form = vec![
            ("hub.mode", mode.as_str().to_owned()),
            ("hub.topic", topic.clone()),
            ("hub.callback", self.callback_url.clone()),
            ("hub.verify", "async".to_owned()),
            ("hub.lease_seconds", self.lease_seconds.to_string()),
        ];
        if let Some(secret) = &self.secret {
            form.push(("hub.secret", secret.clone()));
        }

        let res = self
            .client
            .post(&self.hub_url)
            .form(&form)
            .send()
            .await
            .context("Sending hub request")?;
        if !res.status().is_success() {
            return Err(eyre!(
                "Hub {} request for {topic} failed {}. Response: {}",
                mode.as_str(),
                res.status(),
                res.text().await?
            ));
        }

        debug!("Hub accepted {} request for {topic}", mode.as_str());
        Ok(())
    }
}
