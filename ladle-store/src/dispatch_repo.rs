use crate::order_repo::map_pg_err;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use ladle_core::StoreError;
use ladle_dispatch::models::{Delivery, DeliveryStatus, Driver, Route, RouteStatus};
use ladle_dispatch::repository::{
    DeliveryRepository, DriverRepository, RouteRepository, SyncCandidate,
};
use ladle_order::ledger::FulfillmentProgress;
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgDispatchRepository {
    pool: PgPool,
}

impl PgDispatchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct DeliveryRow {
    id: Uuid,
    order_id: Uuid,
    status: String,
    driver_id: Option<Uuid>,
    route_id: Option<Uuid>,
    sequence: Option<i32>,
    estimated_arrival: NaiveDate,
    latitude: Option<f64>,
    longitude: Option<f64>,
    proof_note: Option<String>,
    proof_photo_url: Option<String>,
    failure_reason: Option<String>,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct RouteRow {
    id: Uuid,
    route_date: NaiveDate,
    driver_id: Uuid,
    status: String,
    optimized: bool,
    total_distance_meters: Option<i32>,
    total_duration_seconds: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct DriverRow {
    id: Uuid,
    name: String,
    active: bool,
    last_assigned_at: Option<DateTime<Utc>>,
}

fn delivery_status_to_str(status: DeliveryStatus) -> &'static str {
    match status {
        DeliveryStatus::Pending => "PENDING",
        DeliveryStatus::InProgress => "IN_PROGRESS",
        DeliveryStatus::Delivered => "DELIVERED",
        DeliveryStatus::Failed => "FAILED",
    }
}

fn delivery_status_from_str(s: &str) -> Result<DeliveryStatus, StoreError> {
    match s {
        "PENDING" => Ok(DeliveryStatus::Pending),
        "IN_PROGRESS" => Ok(DeliveryStatus::InProgress),
        "DELIVERED" => Ok(DeliveryStatus::Delivered),
        "FAILED" => Ok(DeliveryStatus::Failed),
        other => Err(StoreError::Backend(format!(
            "unknown delivery status {other}"
        ))),
    }
}

fn route_status_to_str(status: RouteStatus) -> &'static str {
    match status {
        RouteStatus::Planned => "PLANNED",
        RouteStatus::Active => "ACTIVE",
        RouteStatus::Completed => "COMPLETED",
    }
}

fn route_status_from_str(s: &str) -> Result<RouteStatus, StoreError> {
    match s {
        "PLANNED" => Ok(RouteStatus::Planned),
        "ACTIVE" => Ok(RouteStatus::Active),
        "COMPLETED" => Ok(RouteStatus::Completed),
        other => Err(StoreError::Backend(format!("unknown route status {other}"))),
    }
}

fn row_to_delivery(row: DeliveryRow) -> Result<Delivery, StoreError> {
    Ok(Delivery {
        id: row.id,
        order_id: row.order_id,
        status: delivery_status_from_str(&row.status)?,
        driver_id: row.driver_id,
        route_id: row.route_id,
        sequence: row.sequence.map(|s| s as u32),
        estimated_arrival: row.estimated_arrival,
        latitude: row.latitude,
        longitude: row.longitude,
        proof_note: row.proof_note,
        proof_photo_url: row.proof_photo_url,
        failure_reason: row.failure_reason,
        delivered_at: row.delivered_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn row_to_route(row: RouteRow) -> Result<Route, StoreError> {
    Ok(Route {
        id: row.id,
        route_date: row.route_date,
        driver_id: row.driver_id,
        status: route_status_from_str(&row.status)?,
        optimized: row.optimized,
        total_distance_meters: row.total_distance_meters,
        total_duration_seconds: row.total_duration_seconds,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

const SELECT_DELIVERY: &str = "SELECT id, order_id, status, driver_id, route_id, sequence, estimated_arrival, \
     latitude, longitude, proof_note, proof_photo_url, failure_reason, delivered_at, created_at, updated_at \
     FROM deliveries";

#[async_trait]
impl DeliveryRepository for PgDispatchRepository {
    async fn sync_candidates(&self) -> Result<Vec<SyncCandidate>, StoreError> {
        #[derive(sqlx::FromRow)]
        struct CandidateRow {
            id: Uuid,
            requested_date: NaiveDate,
        }

        let rows = sqlx::query_as::<_, CandidateRow>(
            "SELECT o.id, o.requested_date FROM orders o \
             LEFT JOIN deliveries d ON d.order_id = o.id \
             WHERE o.status IN ('PAID', 'COMPLETED', 'DELIVERED') AND d.id IS NULL \
             ORDER BY o.created_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_pg_err)?;

        Ok(rows
            .into_iter()
            .map(|r| SyncCandidate {
                order_id: r.id,
                requested_date: r.requested_date,
            })
            .collect())
    }

    async fn insert_delivery(&self, delivery: &Delivery) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO deliveries (id, order_id, status, driver_id, route_id, sequence, estimated_arrival, \
             latitude, longitude, proof_note, proof_photo_url, failure_reason, delivered_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(delivery.id)
        .bind(delivery.order_id)
        .bind(delivery_status_to_str(delivery.status))
        .bind(delivery.driver_id)
        .bind(delivery.route_id)
        .bind(delivery.sequence.map(|s| s as i32))
        .bind(delivery.estimated_arrival)
        .bind(delivery.latitude)
        .bind(delivery.longitude)
        .bind(&delivery.proof_note)
        .bind(&delivery.proof_photo_url)
        .bind(&delivery.failure_reason)
        .bind(delivery.delivered_at)
        .bind(delivery.created_at)
        .bind(delivery.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_pg_err)?;
        Ok(())
    }

    async fn get_delivery(&self, id: Uuid) -> Result<Option<Delivery>, StoreError> {
        let row = sqlx::query_as::<_, DeliveryRow>(&format!("{SELECT_DELIVERY} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_pg_err)?;
        row.map(row_to_delivery).transpose()
    }

    async fn delivery_for_order(&self, order_id: Uuid) -> Result<Option<Delivery>, StoreError> {
        let row =
            sqlx::query_as::<_, DeliveryRow>(&format!("{SELECT_DELIVERY} WHERE order_id = $1"))
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_pg_err)?;
        row.map(row_to_delivery).transpose()
    }

    async fn unassigned(&self, limit: u32) -> Result<Vec<Delivery>, StoreError> {
        let rows = sqlx::query_as::<_, DeliveryRow>(&format!(
            "{SELECT_DELIVERY} WHERE route_id IS NULL ORDER BY created_at LIMIT $1"
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_pg_err)?;
        rows.into_iter().map(row_to_delivery).collect()
    }

    async fn update_delivery(&self, delivery: &Delivery) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE deliveries SET status = $1, driver_id = $2, route_id = $3, sequence = $4, \
             latitude = $5, longitude = $6, proof_note = $7, proof_photo_url = $8, \
             failure_reason = $9, delivered_at = $10, updated_at = NOW() WHERE id = $11",
        )
        .bind(delivery_status_to_str(delivery.status))
        .bind(delivery.driver_id)
        .bind(delivery.route_id)
        .bind(delivery.sequence.map(|s| s as i32))
        .bind(delivery.latitude)
        .bind(delivery.longitude)
        .bind(&delivery.proof_note)
        .bind(&delivery.proof_photo_url)
        .bind(&delivery.failure_reason)
        .bind(delivery.delivered_at)
        .bind(delivery.id)
        .execute(&self.pool)
        .await
        .map_err(map_pg_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl RouteRepository for PgDispatchRepository {
    async fn create_route_with_assignments(
        &self,
        route: &Route,
        deliveries: &[Uuid],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_pg_err)?;

        sqlx::query(
            "INSERT INTO routes (id, route_date, driver_id, status, optimized, total_distance_meters, \
             total_duration_seconds, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(route.id)
        .bind(route.route_date)
        .bind(route.driver_id)
        .bind(route_status_to_str(route.status))
        .bind(route.optimized)
        .bind(route.total_distance_meters)
        .bind(route.total_duration_seconds)
        .bind(route.created_at)
        .bind(route.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_pg_err)?;

        for (i, id) in deliveries.iter().enumerate() {
            let result = sqlx::query(
                "UPDATE deliveries SET route_id = $1, sequence = $2, driver_id = $3, updated_at = NOW() \
                 WHERE id = $4 AND route_id IS NULL",
            )
            .bind(route.id)
            .bind(i as i32 + 1)
            .bind(route.driver_id)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_pg_err)?;

            // A concurrent assembler raced us to this delivery; the whole
            // batch rolls back with the transaction.
            if result.rows_affected() == 0 {
                return Err(StoreError::Conflict("route_assignment"));
            }
        }

        tx.commit().await.map_err(map_pg_err)?;
        Ok(())
    }

    async fn get_route(&self, id: Uuid) -> Result<Option<Route>, StoreError> {
        let row = sqlx::query_as::<_, RouteRow>(
            "SELECT id, route_date, driver_id, status, optimized, total_distance_meters, \
             total_duration_seconds, created_at, updated_at FROM routes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_pg_err)?;
        row.map(row_to_route).transpose()
    }

    async fn route_deliveries(&self, route_id: Uuid) -> Result<Vec<Delivery>, StoreError> {
        let rows = sqlx::query_as::<_, DeliveryRow>(&format!(
            "{SELECT_DELIVERY} WHERE route_id = $1 ORDER BY sequence"
        ))
        .bind(route_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_pg_err)?;
        rows.into_iter().map(row_to_delivery).collect()
    }

    async fn update_route_status(&self, id: Uuid, status: RouteStatus) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE routes SET status = $1, updated_at = NOW() WHERE id = $2")
                .bind(route_status_to_str(status))
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(map_pg_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl DriverRepository for PgDispatchRepository {
    async fn active_drivers(&self) -> Result<Vec<Driver>, StoreError> {
        let rows = sqlx::query_as::<_, DriverRow>(
            "SELECT id, name, active, last_assigned_at FROM drivers WHERE active \
             ORDER BY last_assigned_at NULLS FIRST, name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_pg_err)?;

        Ok(rows
            .into_iter()
            .map(|r| Driver {
                id: r.id,
                name: r.name,
                active: r.active,
                last_assigned_at: r.last_assigned_at,
            })
            .collect())
    }

    async fn mark_assigned(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE drivers SET last_assigned_at = $1 WHERE id = $2")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_pg_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl FulfillmentProgress for PgDispatchRepository {
    async fn delivery_started(&self, order_id: Uuid) -> Result<bool, StoreError> {
        #[derive(sqlx::FromRow)]
        struct StatusRow {
            status: String,
        }

        let row = sqlx::query_as::<_, StatusRow>(
            "SELECT status FROM deliveries WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_pg_err)?;

        match row {
            Some(r) => Ok(delivery_status_from_str(&r.status)? != DeliveryStatus::Pending),
            None => Ok(false),
        }
    }
}
