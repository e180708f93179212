use std::{collections::HashMap, sync::atomic::Ordering};

use axum::{
    body::Bytes,
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use common::{signature, signature::SignatureCheck, youtube::parse_notification};
use http::{HeaderMap, StatusCode};
use tracing::{debug, info, warn};

use crate::make_paths;

use super::{ApiError, ApiState, RouterBuild};

pub fn build(state: ApiState) -> RouterBuild {
    let routes = Router::new()
        .route("/", get(verify_callback).post(receive_notification))
        .with_state(state);

    let schemas = vec![];

    let paths = make_paths!(__path_verify_callback, __path_receive_notification);

    (routes, schemas, paths)
}

/// Hub handshake. Echoing the challenge confirms (un)subscription intent,
/// anything without the hub parameters is not a handshake.
#[utoipa::path(
    get,
    path = "/push",
    responses(
        (status = 200, description = "Handshake accepted, the challenge is echoed back"),
        (status = 404, description = "Not a hub handshake")
    ),
    params(
        ("hub.mode" = Option<String>, Query, description = "Subscription mode the hub is verifying"),
        ("hub.challenge" = Option<String>, Query, description = "Token to echo back"),
        ("hub.topic" = Option<String>, Query, description = "Feed topic under verification"),
    )
)]
async fn verify_callback(Query(params): Query<HashMap<String, String>>) -> axum::response::Response {
    match (params.get("hub.mode"), params.get("hub.challenge")) {
        (Some(mode), Some(challenge)) => {
            info!(
                "Hub {mode} handshake for {}",
                params
                    .get("hub.topic")
                    .map(String::as_str)
                    .unwrap_or("<no topic>")
            );
            (StatusCode::OK, challenge.clone()).into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/push",
    responses(
        (status = 200, description = "Notification processed, or no stored streamer matched"),
        (status = 204, description = "Payload carried no usable video and channel ids"),
        (status = 403, description = "Signature did not match the configured secret")
    ),
    request_body(content = String, content_type = "application/atom+xml")
)]
async fn receive_notification(
    State(data): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let bridge = data.read().await.clone();
    bridge.stats.notifications.fetch_add(1, Ordering::Relaxed);

    let signature_256 = headers
        .get("x-hub-signature-256")
        .and_then(|v| v.to_str().ok());
    let legacy = headers.get("x-hub-signature").and_then(|v| v.to_str().ok());
    match signature::verify(bridge.config.secret.as_deref(), signature_256, legacy, &body) {
        SignatureCheck::Invalid => {
            warn!("Rejecting notification with bad signature");
            bridge.stats.signature_failures.fetch_add(1, Ordering::Relaxed);
            return Err(ApiError::SignatureMismatch);
        }
        SignatureCheck::Valid | SignatureCheck::NotSigned => {}
    }

    let notification = parse_notification(&String::from_utf8_lossy(&body));
    data.write().await.last_notification = Some(notification.clone());

    let (Some(video_id), Some(channel_id)) = (&notification.video_id, &notification.channel_id)
    else {
        debug!("Payload without usable ids, ignoring: {notification:?}");
        bridge.stats.ignored.fetch_add(1, Ordering::Relaxed);
        return Ok(StatusCode::NO_CONTENT);
    };

    let streamer = bridge
        .resolve_streamer(channel_id)
        .await
        .map_err(ApiError::internal_error)?;
    let Some(streamer) = streamer else {
        info!("No stored streamer matches channel {channel_id}");
        return Ok(StatusCode::OK);
    };

    let applied = bridge
        .apply_live(&streamer, video_id)
        .await
        .map_err(ApiError::internal_error)?;
    bridge.stats.processed.fetch_add(1, Ordering::Relaxed);
    info!("{} is live: {}", streamer.name, applied.title);
    Ok(StatusCode::OK)
}
