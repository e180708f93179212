use std::{io::SeekFrom, path::Path, sync::Arc};

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    serve::Serve,
    Json, Router,
};
use color_eyre::eyre::{Context, Report, Result};
use common::youtube::{
    api::{ChannelDetails, ChannelSnippet, Thumbnail, Thumbnails},
    Notification,
};
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, BufReader},
    sync::RwLock,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::{PathItem, RefOr, Schema},
    OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    bridge::{Bridge, BridgeState, StatsSnapshot},
    store::{
        model::{
            ConfigEntry, Event, EventStatus, Images, MediaItem, MediaKind, MediaRefs, NewEvent,
            OneTimeEvent, OneTimeEvents, Participants, Platform, Schedule, ScheduleSlot,
            ScoreRow, Scoreboard, Streamer,
        },
        StoreError,
    },
};

mod config;
mod event;
mod media;
mod push;
mod streamer;

type ApiState = Arc<RwLock<Bridge>>;
type RouterBuild = (
    Router,
    Vec<(&'static str, RefOr<Schema>)>,
    Vec<(String, PathItem)>,
);

#[macro_export]
macro_rules! make_paths {
    ($($path:tt),*) => {
        {
            use utoipa::Path;
            vec![
                $(
                    (
                        $path::path(),
                        $path::path_item(None)
                    ),
                )*
            ]
        }
    };
}

#[macro_export]
macro_rules! sub_error {
    ($rule:expr) => {
        Err(ApiError::SubError(Box::new($rule)))
    };
}

pub(crate) fn build_router(bridge: ApiState) -> Router {
    #[derive(OpenApi)]
    #[openapi(
        paths(
            app_state,
            get_logs
        ),
        components(
            schemas(
                BridgeState, StatsSnapshot, Notification, Streamer, Platform, Schedule,
                ScheduleSlot, OneTimeEvents, OneTimeEvent, MediaItem, MediaKind, Event, NewEvent,
                EventStatus, Participants, Scoreboard, ScoreRow, MediaRefs, Images, ConfigEntry,
                ChannelDetails, ChannelSnippet, Thumbnails, Thumbnail
            ),
        ),
        tags(
            (name = "crate", description = "YouTube live notification bridge API")
        )
    )]
    struct ApiDoc;

    let mut openapi = ApiDoc::openapi();
    let components = openapi.components.as_mut().unwrap();

    let mut paths = Vec::new();
    let mut schemas = Vec::new();

    let push = push::build(bridge.clone());
    schemas.extend(push.1);
    paths.extend(push.2);

    let streamer = streamer::build(bridge.clone());
    schemas.extend(streamer.1);
    paths.extend(streamer.2);

    let media = media::build(bridge.clone());
    schemas.extend(media.1);
    paths.extend(media.2);

    let event = event::build(bridge.clone());
    schemas.extend(event.1);
    paths.extend(event.2);

    let config = config::build(bridge.clone());
    schemas.extend(config.1);
    paths.extend(config.2);

    // Several routes expose multiple methods on one path, merge instead of
    // letting the last entry win
    for (path, item) in paths {
        match openapi.paths.paths.get_mut(&path) {
            Some(existing) => existing.operations.extend(item.operations),
            None => {
                openapi.paths.paths.insert(path, item);
            }
        }
    }
    for s in schemas {
        components.schemas.insert(s.0.to_owned(), s.1);
    }

    let api = Router::new()
        .nest("/streamers", streamer.0)
        .nest("/media", media.0)
        .nest("/events", event.0)
        .nest("/config", config.0)
        .route("/logs", get(get_logs).with_state(bridge.clone()))
        .route("/", get(app_state).with_state(bridge.clone()));

    Router::new()
        .merge(SwaggerUi::new("/docs").url("/docs/openapi.json", openapi))
        .nest("/push", push.0)
        .nest("/api", api)
        .layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn get_api_server(address: String, bridge: ApiState) -> Serve<Router, Router> {
    let router = build_router(bridge);

    let listener = tokio::net::TcpListener::bind(address).await.unwrap();
    axum::serve(listener, router)
}

#[utoipa::path(
    get,
    path = "/api",
    responses(
        (status = 200, description = "Bridge state, counters and live streamers", body = BridgeState)
    )
)]
async fn app_state(State(data): State<ApiState>) -> Result<Json<BridgeState>, ApiError> {
    let bridge = data.read().await.clone();
    Ok(Json(bridge.state().await?))
}

#[derive(Debug, thiserror::Error)]
enum ApiError {
    #[error("Streamer does not exist")]
    StreamerDoesNotExist,
    #[error("Notification signature mismatch")]
    SignatureMismatch,
    #[error("Store error {0}")]
    StoreError(#[from] StoreError),
    #[error("Error sending request to the hub {0}")]
    HubError(String),
    #[error("SubError")]
    SubError(Box<dyn WebApiError>),
    #[error("Internal server error {0}")]
    InternalError(String),
}

trait WebApiError: std::fmt::Debug + Send {
    fn make_response(&self) -> axum::response::Response;
}

impl ApiError {
    fn hub_error(err: Report) -> ApiError {
        ApiError::HubError(err.to_string())
    }

    fn internal_error(err: Report) -> ApiError {
        ApiError::InternalError(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status_code = match self {
            ApiError::StreamerDoesNotExist => StatusCode::BAD_REQUEST,
            ApiError::SignatureMismatch => StatusCode::FORBIDDEN,
            ApiError::StoreError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::HubError(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::SubError(s) => return s.make_response(),
        };

        (status_code, self.to_string()).into_response()
    }
}

async fn read_last_n_lines(file: &mut File, mut n: usize) -> Result<Vec<String>> {
    let mut lines = Vec::new();

    let file_size = file.metadata().await?.len();
    let mut file = BufReader::new(file);

    let mut prev_buffer: Vec<u8> = Vec::new();

    file.seek(SeekFrom::End(0)).await?;
    while n > 0 && file_size > 0 {
        file.seek(SeekFrom::Current(-1024)).await?;
        let mut buffer = [0; 1024];
        let bytes_read = file.read(&mut buffer).await?;

        let mut temp_buffer = buffer[0..bytes_read].to_vec();
        temp_buffer.append(&mut prev_buffer);
        prev_buffer = temp_buffer;
        if !buffer[0..bytes_read].contains(&b'\n') {
            file.seek(SeekFrom::Current(-(bytes_read as i64) - 1)).await?;
            continue;
        }

        let raw_lines = prev_buffer
            .split(|x| *x == b'\n')
            .map(|x| x.to_vec())
            .rev()
            .collect::<Vec<_>>();

        let size = raw_lines.len();
        for (idx, line) in raw_lines.into_iter().enumerate() {
            if n == 0 {
                break;
            }

            let line = String::from_utf8(line)?;
            if !line.trim().is_empty() {
                if idx + 1 == size {
                    prev_buffer = line.as_bytes().to_vec();
                } else {
                    lines.push(format!("{line}\n"));
                }
                n -= 1;
            }
        }
        file.seek(SeekFrom::Current(-(bytes_read as i64) - 1)).await?;

        if file.stream_position().await? == 0 {
            tracing::debug!("Reached start of log file, stopping {n}");
            break;
        }
    }

    lines.reverse();
    Ok(lines)
}

#[utoipa::path(
    get,
    path = "/api/logs",
    responses(
        (status = 200, description = "Get last logs as rendered html", body = String, content_type = "text/html"),
    )
)]
async fn get_logs(State(data): State<ApiState>) -> Result<Html<String>, ApiError> {
    let log_path = data.read().await.log_path.clone();
    let Some(log_path) = log_path else {
        return Ok(Html(
            "Logging to file not enabled, use the --log-file flag!".to_string(),
        ));
    };
    if !Path::new(&log_path).exists() {
        return Ok(Html(String::new()));
    }

    let mut file = tokio::fs::OpenOptions::new()
        .read(true)
        .open(&log_path)
        .await
        .context("Opening log file")
        .map_err(ApiError::internal_error)?;

    let text = read_last_n_lines(&mut file, 30)
        .await
        .context("Grabbing log lines")
        .map_err(ApiError::internal_error)?
        .into_iter()
        .filter(|x| !x.trim().is_empty())
        .filter(|x| !x.starts_with('\n'))
        .collect::<Vec<_>>()
        .join("");
    let html = ansi_to_html::convert(&text)
        .context("Rendering log lines")
        .map_err(ApiError::internal_error)?;
    Ok(Html(html))
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use axum::{body::Body, http::Request};
    use color_eyre::eyre::Result;
    use http_body_util::BodyExt;
    use rstest::rstest;
    use tower::ServiceExt;

    use super::*;
    use crate::test::{test_config, test_state};

    #[rstest]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test(flavor = "multi_thread")]
    async fn state_endpoint_reports_counters() -> Result<()> {
        let state = test_state(test_config()).await;
        let router = build_router(state);

        let res = router
            .oneshot(Request::builder().uri("/api").body(Body::empty())?)
            .await?;
        assert_eq!(res.status(), StatusCode::OK);

        let body = res.into_body().collect().await?.to_bytes();
        let state: serde_json::Value = serde_json::from_slice(&body)?;
        assert_eq!(state["stats"]["notifications"], 0);
        assert_eq!(state["live_streamers"], serde_json::json!([]));
        assert_eq!(state["lease_seconds"], test_config().lease_seconds);
        Ok(())
    }

    #[rstest]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test(flavor = "multi_thread")]
    async fn logs_route_reports_disabled_logging() -> Result<()> {
        let state = test_state(test_config()).await;
        let router = build_router(state);

        let res = router
            .oneshot(Request::builder().uri("/api/logs").body(Body::empty())?)
            .await?;
        assert_eq!(res.status(), StatusCode::OK);

        let body = res.into_body().collect().await?.to_bytes();
        assert!(String::from_utf8(body.to_vec())?.contains("Logging to file not enabled"));
        Ok(())
    }
}
