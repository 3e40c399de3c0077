// HTTP request handlers
//
// Line-item CRUD, ad selection, tracking ingestion and health check

use adserve_core::{Ad, LineItem, LineItemCreate, StoreError, TrackingEvent};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use metrics::counter;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::{AppError, AppState};

const MAX_ADS_LIMIT: i64 = 10;

/// GET /health - Basic health check
pub(crate) async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({"status": "ok", "version": state.app.version})),
    )
}

/// POST /api/v1/lineitems - Create a line item
pub(crate) async fn create_line_item(
    State(state): State<AppState>,
    payload: Result<Json<LineItemCreate>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(input) = payload.map_err(|rejection| {
        AppError::bad_request("Invalid request body").with_details(rejection.body_text())
    })?;

    input.validate().map_err(|err| {
        AppError::bad_request("Invalid line item").with_details(err.to_string())
    })?;

    let item = state.store.create(input);
    Ok((StatusCode::CREATED, Json(item)))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListQuery {
    advertiser_id: Option<String>,
    placement: Option<String>,
}

/// GET /api/v1/lineitems - List line items with optional filters
pub(crate) async fn list_line_items(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<LineItem>>, AppError> {
    let Query(query) = query.map_err(|rejection| {
        AppError::bad_request("Invalid query parameters").with_details(rejection.body_text())
    })?;

    let items = state.store.list(
        non_empty(query.advertiser_id.as_deref()),
        non_empty(query.placement.as_deref()),
    );
    Ok(Json(items))
}

/// GET /api/v1/lineitems/:id - Fetch one line item
pub(crate) async fn get_line_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LineItem>, AppError> {
    match state.store.get(&id) {
        Ok(item) => Ok(Json(item)),
        Err(err @ StoreError::NotFound(_)) => {
            Err(AppError::not_found("Line item not found").with_details(err.to_string()))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AdsQuery {
    placement: Option<String>,
    category: Option<String>,
    keyword: Option<String>,
    limit: Option<i64>,
}

/// GET /api/v1/ads - Winning ads for a placement
pub(crate) async fn get_winning_ads(
    State(state): State<AppState>,
    query: Result<Query<AdsQuery>, QueryRejection>,
) -> Result<Json<Vec<Ad>>, AppError> {
    let Query(query) = query.map_err(|rejection| {
        AppError::bad_request("Invalid query parameters").with_details(rejection.body_text())
    })?;

    let placement = non_empty(query.placement.as_deref())
        .ok_or_else(|| AppError::bad_request("'placement' query parameter is empty"))?;

    let limit = query.limit.unwrap_or(1);
    if !(1..=MAX_ADS_LIMIT).contains(&limit) {
        return Err(AppError::bad_request(format!(
            "'limit' must be in the range [1-{}]",
            MAX_ADS_LIMIT
        )));
    }

    let ads = state.selector.winning_ads(
        placement,
        non_empty(query.category.as_deref()),
        non_empty(query.keyword.as_deref()),
        limit as usize,
    );
    debug!(placement, limit, returned = ads.len(), "Selected winning ads");
    Ok(Json(ads))
}

/// POST /api/v1/tracking - Queue one tracking event
///
/// Responds 202 either way; `success` is false when the ingest queue is full
/// or the tracking pipeline has stopped.
pub(crate) async fn track_event(
    State(state): State<AppState>,
    payload: Result<Json<TrackingEvent>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(event) = payload.map_err(|rejection| {
        AppError::bad_request("Invalid request body").with_details(rejection.body_text())
    })?;

    let event_type = event.event_type.as_str();
    let accepted = state.queue.accept(event);
    counter!(
        "http.tracking.requests",
        "event_type" => event_type,
        "accepted" => if accepted { "true" } else { "false" }
    )
    .increment(1);

    Ok((StatusCode::ACCEPTED, Json(json!({"success": accepted}))))
}

/// Treat empty query values like absent ones
fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
