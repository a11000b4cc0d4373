use crate::models::{Delivery, Driver, Route, RouteStatus};
use crate::repository::{DeliveryRepository, DriverRepository, RouteRepository};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use ladle_core::StoreError;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    /// Per-route delivery-count window. Assembly refuses to create a route
    /// with fewer than `window_min` stops and never loads more than
    /// `window_max`.
    pub window_min: u32,
    pub window_max: u32,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            window_min: 5,
            window_max: 10,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Nothing to assemble: not an error condition for callers, just an
    /// empty result.
    #[error("no unassigned deliveries to route")]
    NoWorkAvailable,

    #[error("no active driver available")]
    NoDriverAvailable,

    #[error("illegal delivery transition from {from:?} to {to:?}")]
    IllegalTransition {
        from: crate::models::DeliveryStatus,
        to: crate::models::DeliveryStatus,
    },

    #[error("delivery not found: {0}")]
    DeliveryNotFound(Uuid),

    #[error("route not found: {0}")]
    RouteNotFound(Uuid),

    #[error("illegal route transition from {from:?} to {to:?}")]
    IllegalRouteTransition { from: RouteStatus, to: RouteStatus },

    #[error("order transition failed: {0}")]
    OrderTransition(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Driver selection policy. Pluggable so a smarter dispatcher can replace
/// the default without touching the assembler's transactional core.
pub trait DriverPicker: Send + Sync {
    fn pick(&self, drivers: &[Driver]) -> Option<Driver>;
}

/// Default policy: the active driver who has gone longest without an
/// assignment (never-assigned drivers first).
pub struct FifoDriverPicker;

impl DriverPicker for FifoDriverPicker {
    fn pick(&self, drivers: &[Driver]) -> Option<Driver> {
        drivers
            .iter()
            .filter(|d| d.active)
            .min_by_key(|d| d.last_assigned_at)
            .cloned()
    }
}

/// Result of an external optimization run.
#[derive(Debug, Clone)]
pub struct RoutePlan {
    /// Delivery ids in optimized visiting order.
    pub stop_order: Vec<Uuid>,
    pub total_distance_meters: i32,
    pub total_duration_seconds: i32,
}

/// Seam to the external route optimizer. Optimization is best-effort
/// enrichment: a failure here never blocks route creation.
#[async_trait]
pub trait RouteOptimizer: Send + Sync {
    async fn optimize(&self, deliveries: &[Delivery]) -> Result<RoutePlan, String>;
}

/// Groups unassigned deliveries into capacity-bounded driver routes and
/// stamps the visiting sequence, atomically per route.
pub struct RouteAssembler {
    deliveries: Arc<dyn DeliveryRepository>,
    routes: Arc<dyn RouteRepository>,
    drivers: Arc<dyn DriverRepository>,
    picker: Arc<dyn DriverPicker>,
    optimizer: Option<Arc<dyn RouteOptimizer>>,
    config: AssemblerConfig,
}

impl RouteAssembler {
    pub fn new(
        deliveries: Arc<dyn DeliveryRepository>,
        routes: Arc<dyn RouteRepository>,
        drivers: Arc<dyn DriverRepository>,
        picker: Arc<dyn DriverPicker>,
        optimizer: Option<Arc<dyn RouteOptimizer>>,
        config: AssemblerConfig,
    ) -> Self {
        Self {
            deliveries,
            routes,
            drivers,
            picker,
            optimizer,
            config,
        }
    }

    /// Assemble a single route for the given date, or report that there is
    /// nothing (or nobody) to route.
    pub async fn assemble(&self, route_date: NaiveDate) -> Result<Route, DispatchError> {
        let batch = self.deliveries.unassigned(self.config.window_max).await?;
        if batch.is_empty() || (batch.len() as u32) < self.config.window_min {
            return Err(DispatchError::NoWorkAvailable);
        }

        let pool = self.drivers.active_drivers().await?;
        let driver = self
            .picker
            .pick(&pool)
            .ok_or(DispatchError::NoDriverAvailable)?;

        let mut route = Route::new(route_date, driver.id);
        let ordered = self.plan_stops(&mut route, batch).await;

        // Route row and all sequence assignments land together or not at all.
        self.routes
            .create_route_with_assignments(&route, &ordered)
            .await?;
        self.drivers.mark_assigned(driver.id, Utc::now()).await?;

        tracing::info!(
            route_id = %route.id,
            driver = %driver.name,
            stops = ordered.len(),
            optimized = route.optimized,
            "route assembled"
        );
        Ok(route)
    }

    /// Keep assembling routes until deliveries or drivers run out.
    pub async fn assemble_all(&self, route_date: NaiveDate) -> Result<Vec<Route>, DispatchError> {
        let mut created = Vec::new();
        loop {
            match self.assemble(route_date).await {
                Ok(route) => created.push(route),
                Err(DispatchError::NoWorkAvailable) | Err(DispatchError::NoDriverAvailable) => {
                    return Ok(created)
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// A route together with its stops in sequence order.
    pub async fn route_with_stops(
        &self,
        route_id: Uuid,
    ) -> Result<(Route, Vec<Delivery>), DispatchError> {
        let route = self
            .routes
            .get_route(route_id)
            .await?
            .ok_or(DispatchError::RouteNotFound(route_id))?;
        let stops = self.routes.route_deliveries(route_id).await?;
        Ok((route, stops))
    }

    /// Move a route along its lifecycle (Planned -> Active -> Completed).
    pub async fn transition_route(
        &self,
        route_id: Uuid,
        target: RouteStatus,
    ) -> Result<Route, DispatchError> {
        let mut route = self
            .routes
            .get_route(route_id)
            .await?
            .ok_or(DispatchError::RouteNotFound(route_id))?;

        if !route.status.can_transition(target) {
            return Err(DispatchError::IllegalRouteTransition {
                from: route.status,
                to: target,
            });
        }

        self.routes.update_route_status(route_id, target).await?;
        route.status = target;
        route.updated_at = Utc::now();
        Ok(route)
    }

    /// Run the optimizer if one is wired in. Returns the delivery ids in
    /// final visiting order; on optimizer failure the selection order is
    /// kept and the route stays unoptimized.
    async fn plan_stops(&self, route: &mut Route, batch: Vec<Delivery>) -> Vec<Uuid> {
        let selection_order: Vec<Uuid> = batch.iter().map(|d| d.id).collect();

        let Some(optimizer) = &self.optimizer else {
            return selection_order;
        };

        match optimizer.optimize(&batch).await {
            Ok(plan) => {
                let known: HashMap<Uuid, ()> = selection_order.iter().map(|id| (*id, ())).collect();
                let mut ordered: Vec<Uuid> = plan
                    .stop_order
                    .into_iter()
                    .filter(|id| known.contains_key(id))
                    .collect();
                // A plan that dropped stops still has to deliver them.
                for id in &selection_order {
                    if !ordered.contains(id) {
                        ordered.push(*id);
                    }
                }
                route.optimized = true;
                route.total_distance_meters = Some(plan.total_distance_meters);
                route.total_duration_seconds = Some(plan.total_duration_seconds);
                ordered
            }
            Err(reason) => {
                tracing::warn!("route optimizer unavailable, keeping selection order: {}", reason);
                selection_order
            }
        }
    }
}
