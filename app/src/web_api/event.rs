use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};
use http::StatusCode;
use thiserror::Error;
use tracing::info;

use crate::{
    make_paths,
    store::model::{Event, NewEvent},
    sub_error,
};

use super::{ApiError, ApiState, RouterBuild, WebApiError};

pub fn build(state: ApiState) -> RouterBuild {
    let routes = Router::new()
        .route("/", get(get_events).post(add_event))
        .route("/:id", delete(remove_event))
        .with_state(state);

    let schemas = vec![];

    let paths = make_paths!(__path_get_events, __path_add_event, __path_remove_event);

    (routes, schemas, paths)
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("Event does not exist")]
    EventDoesNotExist,
}

impl WebApiError for EventError {
    fn make_response(&self) -> axum::response::Response {
        use EventError::*;
        let status_code = match self {
            EventDoesNotExist => StatusCode::BAD_REQUEST,
        };

        (status_code, self.to_string()).into_response()
    }
}

#[utoipa::path(
    get,
    path = "/api/events",
    responses(
        (status = 200, description = "All events ordered by start time", body = Vec<Event>)
    )
)]
async fn get_events(State(data): State<ApiState>) -> Result<Json<Vec<Event>>, ApiError> {
    let bridge = data.read().await.clone();
    Ok(Json(bridge.store.execute(|s| s.events()).await?))
}

#[utoipa::path(
    post,
    path = "/api/events",
    responses(
        (status = 201, description = "Event stored")
    ),
    request_body = NewEvent
)]
async fn add_event(
    State(data): State<ApiState>,
    Json(event): Json<NewEvent>,
) -> Result<StatusCode, ApiError> {
    let bridge = data.read().await.clone();
    let title = event.title.clone();
    bridge.store.execute(move |s| s.insert_event(&event)).await?;
    info!("Added event {title}");
    Ok(StatusCode::CREATED)
}

#[utoipa::path(
    delete,
    path = "/api/events/{id}",
    responses(
        (status = 200, description = "Event removed"),
        (status = 400, description = "Event does not exist")
    ),
    params(
        ("id" = i32, Path, description = "Id of the event to remove"),
    )
)]
async fn remove_event(
    State(data): State<ApiState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    let bridge = data.read().await.clone();
    if !bridge.store.execute(move |s| s.remove_event(id)).await? {
        return sub_error!(EventError::EventDoesNotExist);
    }
    info!("Removed event {id}");
    Ok(StatusCode::OK)
}
