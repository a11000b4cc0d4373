use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use ladle_dispatch::models::{Delivery, DeliveryStatus, Route, RouteStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    /// Number of deliveries created by this run.
    pub created: u32,
}

#[derive(Debug, Deserialize)]
pub struct AssembleRequest {
    pub route_date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct RouteResponse {
    pub id: Uuid,
    pub route_date: NaiveDate,
    pub driver_id: Uuid,
    pub status: RouteStatus,
    pub optimized: bool,
    pub total_distance_meters: Option<i32>,
    pub total_duration_seconds: Option<i32>,
}

impl From<Route> for RouteResponse {
    fn from(route: Route) -> Self {
        RouteResponse {
            id: route.id,
            route_date: route.route_date,
            driver_id: route.driver_id,
            status: route.status,
            optimized: route.optimized,
            total_distance_meters: route.total_distance_meters,
            total_duration_seconds: route.total_duration_seconds,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AssembleResponse {
    pub routes: Vec<RouteResponse>,
}

#[derive(Debug, Serialize)]
pub struct DeliveryResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub status: DeliveryStatus,
    pub driver_id: Option<Uuid>,
    pub route_id: Option<Uuid>,
    pub sequence: Option<u32>,
    pub estimated_arrival: NaiveDate,
    pub failure_reason: Option<String>,
    pub delivered_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<Delivery> for DeliveryResponse {
    fn from(d: Delivery) -> Self {
        DeliveryResponse {
            id: d.id,
            order_id: d.order_id,
            status: d.status,
            driver_id: d.driver_id,
            route_id: d.route_id,
            sequence: d.sequence,
            estimated_arrival: d.estimated_arrival,
            failure_reason: d.failure_reason,
            delivered_at: d.delivered_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RouteDetailResponse {
    #[serde(flatten)]
    pub route: RouteResponse,
    pub stops: Vec<DeliveryResponse>,
}

#[derive(Debug, Deserialize, Default)]
pub struct CompleteDeliveryRequest {
    pub proof_note: Option<String>,
    pub proof_photo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FailDeliveryRequest {
    pub reason: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/admin/deliveries/sync
/// Create a delivery for every eligible order lacking one. Safe to re-run.
pub async fn sync_deliveries(
    State(state): State<AppState>,
) -> Result<Json<SyncResponse>, AppError> {
    let created = state.synchronizer.sync().await?;
    Ok(Json(SyncResponse { created }))
}

/// POST /v1/admin/routes
/// Group unassigned deliveries into driver routes for the given date.
/// Returns an empty set when there is not enough work for a route.
pub async fn assemble_routes(
    State(state): State<AppState>,
    Json(req): Json<AssembleRequest>,
) -> Result<Json<AssembleResponse>, AppError> {
    let routes = state.assembler.assemble_all(req.route_date).await?;
    Ok(Json(AssembleResponse {
        routes: routes.into_iter().map(RouteResponse::from).collect(),
    }))
}

/// GET /v1/admin/routes/{id}
pub async fn get_route(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RouteDetailResponse>, AppError> {
    let (route, stops) = state.assembler.route_with_stops(id).await?;
    Ok(Json(RouteDetailResponse {
        route: route.into(),
        stops: stops.into_iter().map(DeliveryResponse::from).collect(),
    }))
}

/// POST /v1/admin/routes/{id}/activate
pub async fn activate_route(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RouteResponse>, AppError> {
    let route = state
        .assembler
        .transition_route(id, RouteStatus::Active)
        .await?;
    Ok(Json(route.into()))
}

/// POST /v1/admin/routes/{id}/complete
pub async fn complete_route(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RouteResponse>, AppError> {
    let route = state
        .assembler
        .transition_route(id, RouteStatus::Completed)
        .await?;
    Ok(Json(route.into()))
}

/// POST /v1/admin/deliveries/{id}/start
pub async fn start_delivery(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryResponse>, AppError> {
    let delivery = state.progress.start(id).await?;
    Ok(Json(delivery.into()))
}

/// POST /v1/admin/deliveries/{id}/complete
pub async fn complete_delivery(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<CompleteDeliveryRequest>,
) -> Result<Json<DeliveryResponse>, AppError> {
    let delivery = state
        .progress
        .complete(id, req.proof_note, req.proof_photo_url)
        .await?;
    Ok(Json(delivery.into()))
}

/// POST /v1/admin/deliveries/{id}/fail
pub async fn fail_delivery(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<FailDeliveryRequest>,
) -> Result<Json<DeliveryResponse>, AppError> {
    let delivery = state.progress.fail(id, req.reason).await?;
    Ok(Json(delivery.into()))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/deliveries/sync", post(sync_deliveries))
        .route("/v1/admin/routes", post(assemble_routes))
        .route("/v1/admin/routes/{id}", get(get_route))
        .route("/v1/admin/routes/{id}/activate", post(activate_route))
        .route("/v1/admin/routes/{id}/complete", post(complete_route))
        .route("/v1/admin/deliveries/{id}/start", post(start_delivery))
        .route("/v1/admin/deliveries/{id}/complete", post(complete_delivery))
        .route("/v1/admin/deliveries/{id}/fail", post(fail_delivery))
}
