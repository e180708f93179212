use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::{get, post},
    Form, Json, Router,
};
use common::youtube::{
    api::{
        ChannelDetails, ChannelListResponse, SearchId, SearchItem, SearchListResponse,
        VideoDetails, VideoListResponse,
    },
    auth::Token,
};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

/// Stand-in for the PubSubHubbub hub and the YouTube Data API, used by the
/// test suites and as a standalone server for manual runs. Lookup data is
/// seeded directly on the state or over the POST routes.
#[derive(Debug, Default)]
pub struct AppState {
    pub videos: HashMap<String, VideoDetails>,
    pub channels: HashMap<String, ChannelDetails>,
    /// Handle, username or vanity name to channel id
    pub channel_idents: HashMap<String, String>,
    pub subscriptions: Vec<SubscriptionRecord>,
    /// Counts YouTube lookup requests, lets tests observe caching
    pub youtube_hits: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionRecord {
    pub mode: String,
    pub topic: String,
    pub callback: String,
    pub lease_seconds: Option<u32>,
    pub has_secret: bool,
    /// Unset until the handshake round trip finishes
    pub verified: Option<bool>,
}

pub fn router(state: Arc<Mutex<AppState>>) -> Router {
    Router::new()
        .route("/hub/subscribe", post(hub_subscribe))
        .route(
            "/hub/subscriptions",
            get(get_subscriptions).delete(clear_subscriptions),
        )
        .route("/youtube/videos", get(get_videos).post(set_videos))
        .route("/youtube/channels", get(get_channels).post(set_channels))
        .route("/youtube/idents", post(set_idents))
        .route("/youtube/search", get(search_channels))
        .route("/token", post(issue_token))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[derive(Debug, Deserialize)]
struct HubForm {
    #[serde(rename = "hub.mode")]
    mode: String,
    #[serde(rename = "hub.topic")]
    topic: String,
    #[serde(rename = "hub.callback")]
    callback: String,
    #[serde(rename = "hub.lease_seconds")]
    lease_seconds: Option<u32>,
    #[serde(rename = "hub.secret")]
    secret: Option<String>,
}

/// Records the request and spawns the async handshake against the callback,
/// the way a real hub verifies subscription intent.
async fn hub_subscribe(
    State(state): State<Arc<Mutex<AppState>>>,
    Form(form): Form<HubForm>,
) -> StatusCode {
    debug!("hub {} request for {}", form.mode, form.topic);
    let record = SubscriptionRecord {
        mode: form.mode.clone(),
        topic: form.topic.clone(),
        callback: form.callback.clone(),
        lease_seconds: form.lease_seconds,
        has_secret: form.secret.is_some(),
        verified: None,
    };
    let index = {
        let mut state = state.lock().await;
        state.subscriptions.push(record);
        state.subscriptions.len() - 1
    };

    tokio::spawn(verify_subscription(state, index, form));
    StatusCode::ACCEPTED
}

async fn verify_subscription(state: Arc<Mutex<AppState>>, index: usize, form: HubForm) {
    let challenge = format!("challenge-{index}");
    let res = reqwest::Client::new()
        .get(&form.callback)
        .query(&[
            ("hub.mode", form.mode.as_str()),
            ("hub.topic", form.topic.as_str()),
            ("hub.challenge", challenge.as_str()),
        ])
        .send()
        .await;

    let verified = match res {
        Ok(res) if res.status().is_success() => res
            .text()
            .await
            .map(|body| body == challenge)
            .unwrap_or(false),
        Ok(res) => {
            warn!("handshake for {} got {}", form.topic, res.status());
            false
        }
        Err(err) => {
            warn!("handshake request for {} failed: {err}", form.topic);
            false
        }
    };

    if let Some(sub) = state.lock().await.subscriptions.get_mut(index) {
        sub.verified = Some(verified);
    }
}

async fn get_subscriptions(
    State(state): State<Arc<Mutex<AppState>>>,
) -> Json<Vec<SubscriptionRecord>> {
    Json(state.lock().await.subscriptions.clone())
}

async fn clear_subscriptions(State(state): State<Arc<Mutex<AppState>>>) -> StatusCode {
    state.lock().await.subscriptions.clear();
    StatusCode::OK
}

#[derive(Debug, Deserialize)]
struct VideoQuery {
    id: String,
}

async fn get_videos(
    State(state): State<Arc<Mutex<AppState>>>,
    Query(query): Query<VideoQuery>,
) -> Json<VideoListResponse> {
    let mut state = state.lock().await;
    state.youtube_hits += 1;
    let items = state.videos.get(&query.id).cloned().into_iter().collect();
    Json(VideoListResponse { items })
}

async fn set_videos(
    State(state): State<Arc<Mutex<AppState>>>,
    Json(body): Json<HashMap<String, VideoDetails>>,
) -> impl IntoResponse {
    state.lock().await.videos = body;
    StatusCode::ACCEPTED
}

#[derive(Debug, Default, Deserialize)]
struct ChannelQuery {
    id: Option<String>,
    #[serde(rename = "forHandle")]
    for_handle: Option<String>,
    #[serde(rename = "forUsername")]
    for_username: Option<String>,
}

async fn get_channels(
    State(state): State<Arc<Mutex<AppState>>>,
    Query(query): Query<ChannelQuery>,
) -> Json<ChannelListResponse> {
    let mut state = state.lock().await;
    state.youtube_hits += 1;

    let items = if let Some(id) = &query.id {
        state.channels.get(id).cloned().into_iter().collect()
    } else if let Some(ident) = query.for_handle.as_ref().or(query.for_username.as_ref()) {
        state
            .channel_idents
            .get(ident)
            .map(|id| {
                state.channels.get(id).cloned().unwrap_or(ChannelDetails {
                    id: id.clone(),
                    snippet: Default::default(),
                })
            })
            .into_iter()
            .collect()
    } else {
        Vec::new()
    };
    Json(ChannelListResponse { items })
}

async fn set_channels(
    State(state): State<Arc<Mutex<AppState>>>,
    Json(body): Json<HashMap<String, ChannelDetails>>,
) -> impl IntoResponse {
    state.lock().await.channels = body;
    StatusCode::ACCEPTED
}

async fn set_idents(
    State(state): State<Arc<Mutex<AppState>>>,
    Json(body): Json<HashMap<String, String>>,
) -> impl IntoResponse {
    state.lock().await.channel_idents = body;
    StatusCode::ACCEPTED
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: String,
}

async fn search_channels(
    State(state): State<Arc<Mutex<AppState>>>,
    Query(query): Query<SearchQuery>,
) -> Json<SearchListResponse> {
    let mut state = state.lock().await;
    state.youtube_hits += 1;
    let items = state
        .channel_idents
        .get(&query.q)
        .map(|id| SearchItem {
            id: SearchId {
                channel_id: Some(id.clone()),
            },
        })
        .into_iter()
        .collect();
    Json(SearchListResponse { items })
}

async fn issue_token() -> Json<Token> {
    Json(Token {
        access_token: "mock-token".to_owned(),
        expires_in: 3600,
        token_type: "Bearer".to_owned(),
    })
}
