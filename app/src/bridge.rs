use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::Local;
use color_eyre::eyre::Result;
use common::{
    config::{CacheConfig, Config},
    youtube::{
        api::{ChannelDetails, Client},
        channel_ident_from_url,
        hub::{Hub, HubMode},
        is_channel_id, Notification, WATCH_URL_BASE,
    },
};
use flume::Sender;
use moka::sync::{Cache, CacheBuilder};
use serde::Serialize;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::store::{
    model::{MediaItem, MediaKind, Platform, Streamer},
    Request, StoreError, StoreWrapper,
};

/// Title used when video metadata cannot be fetched
pub const FALLBACK_TITLE: &str = "Live on YouTube";
const THUMBNAIL_URL_BASE: &str = "https://i.ytimg.com/vi";

/// Everything the push pipeline and the admin API operate on: configuration,
/// outbound clients, the store handles and operational counters.
#[derive(Clone)]
pub struct Bridge {
    pub config: Config,
    pub yt: Client,
    pub hub: Hub,
    pub cache: ChannelCache,
    pub store: Arc<StoreWrapper>,
    pub store_tx: Sender<Request>,
    pub stats: Arc<Stats>,
    /// Most recently parsed push payload, kept for the state endpoint
    pub last_notification: Option<Notification>,
    pub log_path: Option<String>,
}

impl Bridge {
    pub fn new(
        config: Config,
        yt: Client,
        hub: Hub,
        cache: ChannelCache,
        store: Arc<StoreWrapper>,
        store_tx: Sender<Request>,
        log_path: Option<String>,
    ) -> Bridge {
        Bridge {
            config,
            yt,
            hub,
            cache,
            store,
            store_tx,
            stats: Arc::new(Stats::default()),
            last_notification: None,
            log_path,
        }
    }

    pub async fn state(&self) -> Result<BridgeState, StoreError> {
        let live_streamers = self
            .store
            .execute(|s| s.live_streamers())
            .await?
            .into_iter()
            .map(|s| s.name)
            .collect();
        Ok(BridgeState {
            stats: self.stats.snapshot(),
            last_notification: self.last_notification.clone(),
            live_streamers,
            auto_resolve_channels: self.config.auto_resolve_channels,
            lease_seconds: self.config.lease_seconds,
        })
    }

    /// Identifier to channel id, through the cache. Remote failures are
    /// logged by the client and surface as `None`.
    pub async fn lookup_channel_id(&self, ident: &str) -> Result<Option<String>> {
        if let Some(hit) = self.cache.ids.get(ident) {
            return Ok(Some(hit));
        }
        let resolved = self.yt.resolve_channel_id(ident).await?;
        if let Some(id) = &resolved {
            self.cache.ids.insert(ident.to_owned(), id.clone());
        }
        Ok(resolved)
    }

    /// Channel snippet metadata, through the cache.
    pub async fn channel_details(&self, channel_id: &str) -> Result<Option<ChannelDetails>> {
        if let Some(hit) = self.cache.details.get(channel_id) {
            return Ok(Some(hit));
        }
        let details = self.yt.channel_details(channel_id).await?;
        if let Some(details) = &details {
            self.cache
                .details
                .insert(channel_id.to_owned(), details.clone());
        }
        Ok(details)
    }

    /// Maps an inbound channel id back to a stored streamer.
    ///
    /// First pass matches the id against the last path segment of each
    /// YouTube streamer's URL. Second pass, when remote resolution is
    /// enabled, resolves each candidate's URL identifier through the cache
    /// and stops at the first hit. Returns `None` when nothing matches.
    pub async fn resolve_streamer(&self, channel_id: &str) -> Result<Option<Streamer>> {
        let candidates = self
            .store
            .execute(|s| s.streamers_on_platform(Platform::Youtube))
            .await?;

        let mut direct = candidates
            .iter()
            .filter(|s| channel_ident_from_url(&s.platform_url) == Some(channel_id));
        if let Some(first) = direct.next() {
            if direct.next().is_some() {
                warn!(
                    "Multiple streamers point at channel {channel_id}, keeping {}",
                    first.name
                );
            }
            return Ok(Some(first.clone()));
        }

        if self.config.auto_resolve_channels {
            for streamer in candidates {
                let Some(ident) = channel_ident_from_url(&streamer.platform_url) else {
                    continue;
                };
                match self.lookup_channel_id(ident).await {
                    Ok(Some(resolved)) if resolved == channel_id => {
                        return Ok(Some(streamer));
                    }
                    Ok(_) => {}
                    Err(err) => warn!("Channel lookup for {ident} failed: {err}"),
                }
            }
        }

        self.stats.resolver_misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }

    /// Issues a subscribe/unsubscribe request for a streamer. Soft-fails with
    /// `Ok(false)` when no channel id can be determined; hub request errors
    /// propagate to the caller.
    pub async fn ensure_subscription(
        &self,
        mode: HubMode,
        streamer: &Streamer,
    ) -> Result<bool> {
        let Some(channel_id) = self.subscription_channel_id(streamer).await? else {
            self.stats.subscribe_failures.fetch_add(1, Ordering::Relaxed);
            warn!(
                "No channel id for {}, skipping {} request",
                streamer.name,
                mode.as_str()
            );
            return Ok(false);
        };

        match mode {
            HubMode::Subscribe => self.hub.subscribe(&channel_id).await?,
            HubMode::Unsubscribe => self.hub.unsubscribe(&channel_id).await?,
        }
        Ok(true)
    }

    /// Channel id for a streamer: the cached column, a raw id embedded in the
    /// URL, or a remote lookup when enabled. Newly resolved ids are persisted
    /// fire-and-forget through the writer channel.
    async fn subscription_channel_id(&self, streamer: &Streamer) -> Result<Option<String>> {
        if let Some(id) = &streamer.channel_id {
            return Ok(Some(id.clone()));
        }

        let Some(ident) = channel_ident_from_url(&streamer.platform_url) else {
            return Ok(None);
        };
        if is_channel_id(ident) {
            return Ok(Some(ident.to_owned()));
        }
        if !self.config.auto_resolve_channels {
            return Ok(None);
        }

        let resolved = self.lookup_channel_id(ident).await?;
        if let Some(id) = &resolved {
            let streamer_id = streamer.id;
            let id = id.clone();
            _ = self
                .store_tx
                .send(Box::new(move |s| s.set_channel_id(streamer_id, &id)));
        }
        Ok(resolved)
    }

    /// Marks the streamer live and records the video as a media row.
    pub async fn apply_live(&self, streamer: &Streamer, video_id: &str) -> Result<Applied> {
        let metadata = match self.yt.video_details(video_id).await {
            Ok(details) => details,
            Err(err) => {
                warn!("Video metadata fetch for {video_id} failed: {err}");
                None
            }
        };

        let fallback_thumbnail = || format!("{THUMBNAIL_URL_BASE}/{video_id}/hqdefault.jpg");
        let (title, thumbnail) = match &metadata {
            Some(video) => (
                video.snippet.title.clone(),
                video
                    .snippet
                    .thumbnails
                    .best()
                    .map(ToOwned::to_owned)
                    .unwrap_or_else(fallback_thumbnail),
            ),
            None => (FALLBACK_TITLE.to_owned(), fallback_thumbnail()),
        };

        let streamer_id = streamer.id;
        let live_title = title.clone();
        self.store
            .execute(move |s| s.set_streamer_live(streamer_id, true, &live_title))
            .await?;

        let item = MediaItem {
            id: format!("yt-{video_id}"),
            kind: MediaKind::Stream,
            title: title.clone(),
            thumbnail,
            url: format!("{WATCH_URL_BASE}{video_id}"),
            creator: streamer.name.clone(),
            date: Local::now().to_rfc3339(),
        };
        let media_id = item.id.clone();
        let media_inserted = self.store.execute(move |s| s.insert_media(&item)).await?;
        if !media_inserted {
            debug!("Media {media_id} already recorded");
        }

        Ok(Applied {
            title,
            media_inserted,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub title: String,
    pub media_inserted: bool,
}

/// Bounded, TTL-evicted lookup caches shared by the resolver and the
/// subscription manager.
#[derive(Clone)]
pub struct ChannelCache {
    pub ids: Cache<String, String>,
    pub details: Cache<String, ChannelDetails>,
}

impl ChannelCache {
    pub fn new(config: &CacheConfig) -> ChannelCache {
        ChannelCache {
            ids: CacheBuilder::new(config.capacity)
                .time_to_live(Duration::from_secs(config.ttl_secs))
                .build(),
            details: CacheBuilder::new(config.capacity)
                .time_to_live(Duration::from_secs(config.ttl_secs))
                .build(),
        }
    }
}

impl std::fmt::Debug for ChannelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelCache")
            .field("ids", &self.ids.entry_count())
            .field("details", &self.details.entry_count())
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct Stats {
    pub notifications: AtomicU64,
    pub processed: AtomicU64,
    pub ignored: AtomicU64,
    pub signature_failures: AtomicU64,
    pub resolver_misses: AtomicU64,
    pub subscribe_failures: AtomicU64,
}

impl Stats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            notifications: self.notifications.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            signature_failures: self.signature_failures.load(Ordering::Relaxed),
            resolver_misses: self.resolver_misses.load(Ordering::Relaxed),
            subscribe_failures: self.subscribe_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatsSnapshot {
    pub notifications: u64,
    pub processed: u64,
    pub ignored: u64,
    pub signature_failures: u64,
    pub resolver_misses: u64,
    pub subscribe_failures: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BridgeState {
    pub stats: StatsSnapshot,
    pub last_notification: Option<Notification>,
    pub live_streamers: Vec<String>,
    pub auto_resolve_channels: bool,
    pub lease_seconds: u32,
}
