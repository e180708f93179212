use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use http::StatusCode;
use thiserror::Error;
use tracing::info;

use crate::{make_paths, store::model::MediaItem, sub_error};

use super::{ApiError, ApiState, RouterBuild, WebApiError};

pub fn build(state: ApiState) -> RouterBuild {
    let routes = Router::new()
        .route("/", get(get_media).post(add_media))
        .with_state(state);

    let schemas = vec![];

    let paths = make_paths!(__path_get_media, __path_add_media);

    (routes, schemas, paths)
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Media item already exists")]
    MediaAlreadyExists,
}

impl WebApiError for MediaError {
    fn make_response(&self) -> axum::response::Response {
        use MediaError::*;
        let status_code = match self {
            MediaAlreadyExists => StatusCode::CONFLICT,
        };

        (status_code, self.to_string()).into_response()
    }
}

#[utoipa::path(
    get,
    path = "/api/media",
    responses(
        (status = 200, description = "All media items, newest first", body = Vec<MediaItem>)
    )
)]
async fn get_media(State(data): State<ApiState>) -> Result<Json<Vec<MediaItem>>, ApiError> {
    let bridge = data.read().await.clone();
    Ok(Json(bridge.store.execute(|s| s.media()).await?))
}

#[utoipa::path(
    post,
    path = "/api/media",
    responses(
        (status = 201, description = "Media item stored"),
        (status = 409, description = "A media item with this id already exists")
    ),
    request_body = MediaItem
)]
async fn add_media(
    State(data): State<ApiState>,
    Json(item): Json<MediaItem>,
) -> Result<StatusCode, ApiError> {
    let bridge = data.read().await.clone();
    let id = item.id.clone();
    if !bridge.store.execute(move |s| s.insert_media(&item)).await? {
        return sub_error!(MediaError::MediaAlreadyExists);
    }
    info!("Added media item {id}");
    Ok(StatusCode::CREATED)
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
        test::{test_config, test_state},
        web_api::build_router,
    };

    fn media_json(id: &str, date: &str) -> serde_json::Value {
        json!({
            "id": id,
            "kind": "video",
            "title": "Highlights",
            "thumbnail": "https://example.com/thumb.jpg",
            "url": "https://example.com/video",
            "creator": "a",
            "date": date,
        })
    }

    fn post_media(payload: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/media")
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap()
    }

    #[rstest]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test(flavor = "multi_thread")]
    async fn create_list_and_duplicate() -> Result<()> {
        let state = test_state(test_config()).await;
        let router = build_router(state);

        let res = router
            .clone()
            .oneshot(post_media(media_json("m1", "2026-08-20T10:00:00+02:00")))
            .await?;
        assert_eq!(res.status(), StatusCode::CREATED);

        let res = router
            .clone()
            .oneshot(post_media(media_json("m2", "2026-08-21T10:00:00+02:00")))
            .await?;
        assert_eq!(res.status(), StatusCode::CREATED);

        let res = router
            .clone()
            .oneshot(post_media(media_json("m1", "2026-08-22T10:00:00+02:00")))
            .await?;
        assert_eq!(res.status(), StatusCode::CONFLICT);

        let res = router
            .oneshot(Request::builder().uri("/api/media").body(Body::empty())?)
            .await?;
        assert_eq!(res.status(), StatusCode::OK);
        let body = res.into_body().collect().await?.to_bytes();
        let media: Vec<MediaItem> = serde_json::from_slice(&body)?;
        assert_eq!(media.len(), 2);
        // newest first
        assert_eq!(media[0].id, "m2");
        assert_eq!(media[1].id, "m1");
        Ok(())
    }
}
