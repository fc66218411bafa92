use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::aggregator::Aggregator;
use crate::api::health::{HealthSnapshot, HealthState};
use crate::api::latency::{SourceLatency, SourceLatencySnapshot};
use crate::config::split_keys;
use crate::db::models::{ListingSnapshotRow, PriceObservationRow, TrackedQueryRow};
use crate::db::{ListingResolver, PriceLedger, TrackedQueryStore};
use crate::error::AppError;
use crate::scheduler::Scheduler;
use crate::types::Listing;

#[derive(Clone)]
pub struct ApiState {
    pub aggregator: Aggregator,
    pub tracked: TrackedQueryStore,
    pub resolver: ListingResolver,
    pub ledger: PriceLedger,
    pub scheduler: Arc<Scheduler>,
    pub health: Arc<HealthState>,
    pub latency: Arc<SourceLatency>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(get_health))
        .route("/api/stores", get(get_stores))
        .route("/api/search", get(search))
        .route("/api/tracked-products", get(list_tracked).post(create_tracked))
        .route("/api/tracked-products/:id", put(update_tracked).delete(delete_tracked))
        .route("/api/product-listings/:id/prices", get(get_price_history))
        .route("/api/dashboard/data/:query_term", get(get_dashboard_data))
        .route("/api/stats/latency", get(get_stats_latency))
        .route("/api/scheduler/run", post(trigger_run))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct SearchQuery {
    pub product_name: Option<String>,
    /// Comma-separated source keys; absent or empty means all.
    pub stores: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateTrackedRequest {
    pub query_term: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateTrackedRequest {
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn root() -> &'static str {
    "Price tracker API is running"
}

async fn get_health(State(state): State<ApiState>) -> Json<HealthSnapshot> {
    Json(state.health.snapshot())
}

async fn get_stores(State(state): State<ApiState>) -> Json<Vec<String>> {
    Json(state.aggregator.source_keys())
}

async fn search(
    State(state): State<ApiState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<Vec<Listing>>, AppError> {
    let term = params.product_name.unwrap_or_default();
    if term.trim().is_empty() {
        return Err(AppError::Validation("Product name is required".to_string()));
    }
    let stores = params.stores.as_deref().map(split_keys).unwrap_or_default();

    let listings = state.aggregator.search(&term, &stores).await?;
    Ok(Json(listings))
}

async fn list_tracked(State(state): State<ApiState>) -> Result<Json<Vec<TrackedQueryRow>>, AppError> {
    Ok(Json(state.tracked.list().await?))
}

async fn create_tracked(
    State(state): State<ApiState>,
    Json(body): Json<CreateTrackedRequest>,
) -> Result<(StatusCode, Json<TrackedQueryRow>), AppError> {
    let term = body.query_term.unwrap_or_default();
    let row = state.tracked.create(&term, body.description.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

async fn update_tracked(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateTrackedRequest>,
) -> Result<Json<TrackedQueryRow>, AppError> {
    let row = state
        .tracked
        .update(id, body.description.as_deref(), body.is_active)
        .await?;
    Ok(Json(row))
}

async fn delete_tracked(State(state): State<ApiState>, Path(id): Path<i64>) -> Result<StatusCode, AppError> {
    state.tracked.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Oldest first. 404 when the listing does not exist.
async fn get_price_history(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<PriceObservationRow>>, AppError> {
    state.resolver.get(id).await?;
    Ok(Json(state.ledger.history(id).await?))
}

/// Latest-price snapshot for a tracked term. Listings first scraped by another
/// tracked query are listed under that query, not this one.
async fn get_dashboard_data(
    State(state): State<ApiState>,
    Path(query_term): Path<String>,
) -> Result<Json<Vec<ListingSnapshotRow>>, AppError> {
    Ok(Json(state.resolver.snapshot_for_term(&query_term).await?))
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<Vec<SourceLatencySnapshot>> {
    Json(state.latency.snapshot())
}

async fn trigger_run(State(state): State<ApiState>) -> Result<impl IntoResponse, AppError> {
    if !state.scheduler.trigger() {
        return Err(AppError::Conflict("A scrape run is already in progress.".to_string()));
    }
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "started" })),
    ))
}
