use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use http::StatusCode;
use thiserror::Error;
use tracing::info;

use crate::{make_paths, store::model::ConfigEntry, sub_error};

use super::{ApiError, ApiState, RouterBuild, WebApiError};

pub fn build(state: ApiState) -> RouterBuild {
    let routes = Router::new()
        .route("/", get(get_config))
        .route("/:key", get(get_config_value).put(set_config_value))
        .with_state(state);

    let schemas = vec![];

    let paths = make_paths!(
        __path_get_config,
        __path_get_config_value,
        __path_set_config_value
    );

    (routes, schemas, paths)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config key does not exist")]
    KeyDoesNotExist,
}

impl WebApiError for ConfigError {
    fn make_response(&self) -> axum::response::Response {
        use ConfigError::*;
        let status_code = match self {
            KeyDoesNotExist => StatusCode::NOT_FOUND,
        };

        (status_code, self.to_string()).into_response()
    }
}

#[utoipa::path(
    get,
    path = "/api/config",
    responses(
        (status = 200, description = "All stored configuration entries", body = Vec<ConfigEntry>)
    )
)]
async fn get_config(State(data): State<ApiState>) -> Result<Json<Vec<ConfigEntry>>, ApiError> {
    let bridge = data.read().await.clone();
    Ok(Json(bridge.store.execute(|s| s.config_entries()).await?))
}

#[utoipa::path(
    get,
    path = "/api/config/{key}",
    responses(
        (status = 200, description = "Value stored under the key", body = String),
        (status = 404, description = "Config key does not exist")
    ),
    params(
        ("key" = String, Path, description = "Config key to read"),
    )
)]
async fn get_config_value(
    State(data): State<ApiState>,
    Path(key): Path<String>,
) -> Result<Json<String>, ApiError> {
    let bridge = data.read().await.clone();
    match bridge
        .store
        .execute(move |s| s.get_config_value(&key))
        .await?
    {
        Some(value) => Ok(Json(value)),
        None => sub_error!(ConfigError::KeyDoesNotExist),
    }
}

#[utoipa::path(
    put,
    path = "/api/config/{key}",
    responses(
        (status = 200, description = "Value stored, overwriting any previous one")
    ),
    params(
        ("key" = String, Path, description = "Config key to write"),
    ),
    request_body = String
)]
async fn set_config_value(
    State(data): State<ApiState>,
    Path(key): Path<String>,
    Json(value): Json<String>,
) -> Result<StatusCode, ApiError> {
    let bridge = data.read().await.clone();
    let update_key = key.clone();
    bridge
        .store
        .execute(move |s| s.set_config_value(&update_key, &value))
        .await?;
    info!("Updated config key {key}");
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
    use tower::ServiceExt;

    use super::*;
    use crate::{
        test::{test_config, test_state},
        web_api::build_router,
    };

    fn put_value(key: &str, value: &str) -> Request<Body> {
        Request::builder()
            .method("PUT")
            .uri(format!("/api/config/{key}"))
            .header("content-type", "application/json")
            .body(Body::from(format!("\"{value}\"")))
            .unwrap()
    }

    #[rstest]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test(flavor = "multi_thread")]
    async fn set_get_and_overwrite() -> Result<()> {
        let state = test_state(test_config()).await;
        let router = build_router(state);

        let res = router
            .clone()
            .oneshot(Request::builder().uri("/api/config/theme").body(Body::empty())?)
            .await?;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = router.clone().oneshot(put_value("theme", "dark")).await?;
        assert_eq!(res.status(), StatusCode::OK);
        let res = router.clone().oneshot(put_value("theme", "light")).await?;
        assert_eq!(res.status(), StatusCode::OK);

        let res = router
            .clone()
            .oneshot(Request::builder().uri("/api/config/theme").body(Body::empty())?)
            .await?;
        assert_eq!(res.status(), StatusCode::OK);
        let body = res.into_body().collect().await?.to_bytes();
        let value: String = serde_json::from_slice(&body)?;
        assert_eq!(value, "light");

        let res = router
            .oneshot(Request::builder().uri("/api/config").body(Body::empty())?)
            .await?;
        let body = res.into_body().collect().await?.to_bytes();
        let entries: Vec<ConfigEntry> = serde_json::from_slice(&body)?;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "theme");
        Ok(())
    }
}
