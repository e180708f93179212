use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use common::youtube::{
    api::ChannelDetails, channel_ident_from_url, hub::HubMode, is_channel_id,
};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::{
    make_paths,
    store::model::{NewStreamer, OneTimeEvents, Platform, Schedule, Streamer},
    sub_error,
};

use super::{ApiError, ApiState, RouterBuild, WebApiError};

pub fn build(state: ApiState) -> RouterBuild {
    let routes = Router::new()
        .route("/", get(get_streamers))
        .route("/live", get(get_live_streamers))
        .route(
            "/:name",
            get(get_streamer).put(add_streamer).delete(remove_streamer),
        )
        .route("/:name/resubscribe", post(resubscribe))
        .with_state(state);

    let schemas = vec![AddStreamer::schema(), StreamerDetail::schema()];

    let paths = make_paths!(
        __path_get_streamers,
        __path_get_live_streamers,
        __path_get_streamer,
        __path_add_streamer,
        __path_remove_streamer,
        __path_resubscribe
    );

    (routes, schemas, paths)
}

#[derive(Debug, Error)]
pub enum StreamerError {
    #[error("Streamer already exists")]
    StreamerAlreadyExists,
    #[error("Invalid channel id: {0}")]
    InvalidChannelId(String),
    #[error("Could not determine a channel id for the streamer")]
    ChannelNotResolved,
}

impl WebApiError for StreamerError {
    fn make_response(&self) -> axum::response::Response {
        use StreamerError::*;
        let status_code = match self {
            StreamerAlreadyExists => StatusCode::CONFLICT,
            InvalidChannelId(_) | ChannelNotResolved => StatusCode::BAD_REQUEST,
        };

        (status_code, self.to_string()).into_response()
    }
}

#[derive(Debug, Deserialize, ToSchema)]
struct AddStreamer {
    platform: Platform,
    /// Channel page URL on the platform
    url: String,
    /// Known channel id, skips any later resolution
    channel_id: Option<String>,
    game: Option<String>,
    linked_account: Option<String>,
    schedule: Option<Schedule>,
    one_time_events: Option<OneTimeEvents>,
    assigned_user: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
struct StreamerDetail {
    streamer: Streamer,
    channel: Option<ChannelDetails>,
}

#[utoipa::path(
    get,
    path = "/api/streamers",
    responses(
        (status = 200, description = "All stored streamers", body = Vec<Streamer>)
    )
)]
async fn get_streamers(State(data): State<ApiState>) -> Result<Json<Vec<Streamer>>, ApiError> {
    let bridge = data.read().await.clone();
    Ok(Json(bridge.store.execute(|s| s.streamers()).await?))
}

#[utoipa::path(
    get,
    path = "/api/streamers/live",
    responses(
        (status = 200, description = "Streamers currently marked live", body = Vec<Streamer>)
    )
)]
async fn get_live_streamers(
    State(data): State<ApiState>,
) -> Result<Json<Vec<Streamer>>, ApiError> {
    let bridge = data.read().await.clone();
    Ok(Json(bridge.store.execute(|s| s.live_streamers()).await?))
}

#[utoipa::path(
    get,
    path = "/api/streamers/{name}",
    responses(
        (status = 200, description = "Streamer with cached channel metadata", body = StreamerDetail),
        (status = 400, description = "Streamer does not exist")
    ),
    params(
        ("name" = String, Path, description = "Name of the streamer"),
    )
)]
async fn get_streamer(
    State(data): State<ApiState>,
    Path(name): Path<String>,
) -> Result<Json<StreamerDetail>, ApiError> {
    let bridge = data.read().await.clone();
    let streamer = bridge
        .store
        .execute(move |s| s.streamer_by_name(&name))
        .await?
        .ok_or(ApiError::StreamerDoesNotExist)?;

    let channel = match &streamer.channel_id {
        Some(id) => match bridge.channel_details(id).await {
            Ok(details) => details,
            Err(err) => {
                warn!("Channel details lookup failed: {err}");
                None
            }
        },
        None => None,
    };

    Ok(Json(StreamerDetail { streamer, channel }))
}

#[utoipa::path(
    put,
    path = "/api/streamers/{name}",
    responses(
        (status = 201, description = "Streamer added, a hub subscription was requested for YouTube streamers"),
        (status = 400, description = "Channel id is not a valid YouTube channel id"),
        (status = 409, description = "A streamer with this name already exists")
    ),
    params(
        ("name" = String, Path, description = "Name of the streamer to add"),
    ),
    request_body = AddStreamer
)]
async fn add_streamer(
    State(data): State<ApiState>,
    Path(name): Path<String>,
    Json(payload): Json<AddStreamer>,
) -> Result<StatusCode, ApiError> {
    let bridge = data.read().await.clone();

    if let Some(id) = &payload.channel_id {
        if !is_channel_id(id) {
            return sub_error!(StreamerError::InvalidChannelId(id.clone()));
        }
    }
    let channel_id = payload.channel_id.or_else(|| {
        channel_ident_from_url(&payload.url)
            .filter(|ident| is_channel_id(ident))
            .map(ToOwned::to_owned)
    });

    let platform = payload.platform;
    let new = NewStreamer {
        name: name.clone(),
        platform,
        platform_url: payload.url,
        live: false,
        title: None,
        game: payload.game,
        linked_account: payload.linked_account,
        schedule: payload.schedule,
        one_time_events: payload.one_time_events,
        assigned_user: payload.assigned_user,
        channel_id,
    };
    if !bridge.store.execute(move |s| s.insert_streamer(&new)).await? {
        return sub_error!(StreamerError::StreamerAlreadyExists);
    }
    info!("Added streamer {name}");

    // Best effort, the lease loop retries and the streamer is stored either way
    if platform == Platform::Youtube {
        let lookup = name.clone();
        if let Some(streamer) = bridge
            .store
            .execute(move |s| s.streamer_by_name(&lookup))
            .await?
        {
            if let Err(err) = bridge
                .ensure_subscription(HubMode::Subscribe, &streamer)
                .await
            {
                warn!("Subscribe request for {name} failed: {err}");
            }
        }
    }

    Ok(StatusCode::CREATED)
}

#[utoipa::path(
    delete,
    path = "/api/streamers/{name}",
    responses(
        (status = 200, description = "Streamer removed, an unsubscribe was requested for YouTube streamers"),
        (status = 400, description = "Streamer does not exist")
    ),
    params(
        ("name" = String, Path, description = "Name of the streamer to remove"),
    )
)]
async fn remove_streamer(
    State(data): State<ApiState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    let bridge = data.read().await.clone();
    let lookup = name.clone();
    let streamer = bridge
        .store
        .execute(move |s| s.streamer_by_name(&lookup))
        .await?
        .ok_or(ApiError::StreamerDoesNotExist)?;

    if streamer.platform == Platform::Youtube {
        if let Err(err) = bridge
            .ensure_subscription(HubMode::Unsubscribe, &streamer)
            .await
        {
            warn!("Unsubscribe request for {name} failed: {err}");
        }
    }

    let remove = name.clone();
    bridge
        .store
        .execute(move |s| s.remove_streamer(&remove))
        .await?;
    info!("Removed streamer {name}");
    Ok(StatusCode::OK)
}

#[utoipa::path(
    post,
    path = "/api/streamers/{name}/resubscribe",
    responses(
        (status = 200, description = "Hub accepted the subscribe request"),
        (status = 400, description = "Streamer does not exist or has no resolvable channel id"),
        (status = 503, description = "Hub rejected or did not answer the request")
    ),
    params(
        ("name" = String, Path, description = "Name of the streamer to resubscribe"),
    )
)]
async fn resubscribe(
    State(data): State<ApiState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    let bridge = data.read().await.clone();
    let streamer = bridge
        .store
        .execute(move |s| s.streamer_by_name(&name))
        .await?
        .ok_or(ApiError::StreamerDoesNotExist)?;

    let subscribed = bridge
        .ensure_subscription(HubMode::Subscribe, &streamer)
        .await
        .map_err(ApiError::hub_error)?;
    if !subscribed {
        return sub_error!(StreamerError::ChannelNotResolved);
    }
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use axum::body::Body;
    use color_eyre::eyre::Result;
    use http::Request;
    use http_body_util::BodyExt;
    use rstest::rstest;
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::{
        test::{spawn_mock, test_config, test_state},
        web_api::build_router,
    };

    fn put_streamer(name: &str, payload: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("PUT")
            .uri(format!("/api/streamers/{name}"))
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap()
    }

    #[rstest]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test(flavor = "multi_thread")]
    async fn add_list_and_duplicate() -> Result<()> {
        let state = test_state(test_config()).await;
        let router = build_router(state.clone());

        let payload = json!({
            "platform": "youtube",
            "url": "https://www.youtube.com/@somehandle",
        });
        let res = router
            .clone()
            .oneshot(put_streamer("a", payload.clone()))
            .await?;
        assert_eq!(res.status(), StatusCode::CREATED);

        let res = router
            .clone()
            .oneshot(put_streamer("a", payload))
            .await?;
        assert_eq!(res.status(), StatusCode::CONFLICT);

        let res = router
            .oneshot(
                Request::builder()
                    .uri("/api/streamers")
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(res.status(), StatusCode::OK);
        let body = res.into_body().collect().await?.to_bytes();
        let streamers: Vec<Streamer> = serde_json::from_slice(&body)?;
        assert_eq!(streamers.len(), 1);
        assert_eq!(streamers[0].name, "a");
        assert_eq!(streamers[0].channel_id, None);
        Ok(())
    }

    #[rstest]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test(flavor = "multi_thread")]
    async fn channel_url_id_is_adopted_on_add() -> Result<()> {
        let state = test_state(test_config()).await;
        let router = build_router(state.clone());

        let res = router
            .oneshot(put_streamer(
                "a",
                json!({
                    "platform": "youtube",
                    "url": "https://www.youtube.com/channel/UCtestchannelidentifier0",
                }),
            ))
            .await?;
        assert_eq!(res.status(), StatusCode::CREATED);

        let bridge = state.read().await.clone();
        let streamer = bridge
            .store
            .execute(|s| s.streamer_by_name("a"))
            .await?
            .unwrap();
        assert_eq!(
            streamer.channel_id.as_deref(),
            Some("UCtestchannelidentifier0")
        );
        Ok(())
    }

    #[rstest]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test(flavor = "multi_thread")]
    async fn malformed_channel_id_is_rejected() -> Result<()> {
        let state = test_state(test_config()).await;
        let router = build_router(state);

        let res = router
            .oneshot(put_streamer(
                "a",
                json!({
                    "platform": "youtube",
                    "url": "https://www.youtube.com/@somehandle",
                    "channel_id": "not-a-channel-id",
                }),
            ))
            .await?;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[rstest]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_streamer_operations_fail() -> Result<()> {
        let state = test_state(test_config()).await;
        let router = build_router(state);

        let res = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/streamers/ghost")
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = router
            .oneshot(
                Request::builder()
                    .uri("/api/streamers/ghost")
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[rstest]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test(flavor = "multi_thread")]
    async fn resubscribe_through_hub() -> Result<()> {
        let (base, mock_state) = spawn_mock().await;
        let mut config = test_config();
        config.hub_url = format!("{base}/hub/subscribe");
        let state = test_state(config).await;
        let router = build_router(state);

        let res = router
            .clone()
            .oneshot(put_streamer(
                "a",
                json!({
                    "platform": "youtube",
                    "url": "https://www.youtube.com/channel/UCtestchannelidentifier0",
                }),
            ))
            .await?;
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(mock_state.lock().await.subscriptions.len(), 1);

        let res = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/streamers/a/resubscribe")
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(mock_state.lock().await.subscriptions.len(), 2);
        Ok(())
    }

    #[rstest]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test(flavor = "multi_thread")]
    async fn resubscribe_without_channel_id_fails() -> Result<()> {
        let state = test_state(test_config()).await;
        let router = build_router(state);

        let res = router
            .clone()
            .oneshot(put_streamer(
                "a",
                json!({
                    "platform": "youtube",
                    "url": "https://www.youtube.com/@somehandle",
                }),
            ))
            .await?;
        assert_eq!(res.status(), StatusCode::CREATED);

        let res = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/streamers/a/resubscribe")
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[rstest]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test(flavor = "multi_thread")]
    async fn delete_requests_unsubscribe() -> Result<()> {
        let (base, mock_state) = spawn_mock().await;
        let mut config = test_config();
        config.hub_url = format!("{base}/hub/subscribe");
        let state = test_state(config).await;
        let router = build_router(state.clone());

        let res = router
            .clone()
            .oneshot(put_streamer(
                "a",
                json!({
                    "platform": "youtube",
                    "url": "https://www.youtube.com/channel/UCtestchannelidentifier0",
                }),
            ))
            .await?;
        assert_eq!(res.status(), StatusCode::CREATED);

        let res = router
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/streamers/a")
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(res.status(), StatusCode::OK);

        let subscriptions = mock_state.lock().await.subscriptions.clone();
        assert_eq!(subscriptions.len(), 2);
        assert_eq!(subscriptions[1].mode, "unsubscribe");

        let bridge = state.read().await.clone();
        assert!(bridge.store.execute(|s| s.streamers()).await?.is_empty());
        Ok(())
    }
}
