use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use ladle_core::StoreError;
use ladle_order::models::{Address, Customer, Order, OrderItem, OrderStatus};
use ladle_order::repository::OrderRepository;
use ladle_shared::pii::Masked;
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    customer_user_id: Option<Uuid>,
    guest_name: Option<String>,
    guest_email: Option<String>,
    guest_phone: Option<String>,
    address_line1: String,
    address_line2: Option<String>,
    city: String,
    state: String,
    zip: String,
    requested_date: NaiveDate,
    subtotal_cents: i32,
    tax_cents: i32,
    discount_cents: i32,
    total_cents: i32,
    status: String,
    payment_reference: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    menu_item_id: Uuid,
    name: String,
    price_cents: i32,
    quantity: i32,
}

pub(crate) fn order_status_to_str(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "PENDING",
        OrderStatus::Paid => "PAID",
        OrderStatus::Completed => "COMPLETED",
        OrderStatus::Delivered => "DELIVERED",
        OrderStatus::Cancelled => "CANCELLED",
    }
}

pub(crate) fn order_status_from_str(s: &str) -> Result<OrderStatus, StoreError> {
    match s {
        "PENDING" => Ok(OrderStatus::Pending),
        "PAID" => Ok(OrderStatus::Paid),
        "COMPLETED" => Ok(OrderStatus::Completed),
        "DELIVERED" => Ok(OrderStatus::Delivered),
        "CANCELLED" => Ok(OrderStatus::Cancelled),
        other => Err(StoreError::Backend(format!("unknown order status {other}"))),
    }
}

/// Map Postgres unique violations to the logical key they protect.
pub(crate) fn map_pg_err(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some("23505") {
            let key = match db.constraint() {
                Some("orders_order_number_key") => "order_number",
                Some("orders_payment_reference_key") => "payment_reference",
                Some("deliveries_order_id_key") => "delivery_order_id",
                Some("deliveries_route_sequence_key") => "route_assignment",
                _ => "unique",
            };
            return StoreError::Conflict(key);
        }
    }
    if matches!(e, sqlx::Error::RowNotFound) {
        return StoreError::NotFound;
    }
    StoreError::Backend(e.to_string())
}

fn row_to_order(row: OrderRow, item_rows: Vec<OrderItemRow>) -> Result<Order, StoreError> {
    let customer = match row.customer_user_id {
        Some(user_id) => Customer::Registered { user_id },
        None => Customer::Guest {
            name: row.guest_name.unwrap_or_default(),
            email: Masked(row.guest_email.unwrap_or_default()),
            phone: Masked(row.guest_phone.unwrap_or_default()),
        },
    };

    let items = item_rows
        .into_iter()
        .map(|i| OrderItem {
            id: i.id,
            order_id: i.order_id,
            menu_item_id: i.menu_item_id,
            name: i.name,
            price_cents: i.price_cents,
            quantity: i.quantity as u32,
        })
        .collect();

    Ok(Order {
        id: row.id,
        order_number: row.order_number,
        customer,
        address: Address {
            line1: row.address_line1,
            line2: row.address_line2,
            city: row.city,
            state: row.state,
            zip: row.zip,
        },
        requested_date: row.requested_date,
        items,
        subtotal_cents: row.subtotal_cents,
        tax_cents: row.tax_cents,
        discount_cents: row.discount_cents,
        total_cents: row.total_cents,
        status: order_status_from_str(&row.status)?,
        payment_reference: row.payment_reference,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

const SELECT_ORDER: &str = "SELECT id, order_number, customer_user_id, guest_name, guest_email, guest_phone, \
     address_line1, address_line2, city, state, zip, requested_date, subtotal_cents, tax_cents, \
     discount_cents, total_cents, status, payment_reference, created_at, updated_at FROM orders";

const SELECT_ITEMS: &str =
    "SELECT id, order_id, menu_item_id, name, price_cents, quantity FROM order_items WHERE order_id = $1";

impl PgOrderRepository {
    async fn load_order(&self, row: Option<OrderRow>) -> Result<Option<Order>, StoreError> {
        let Some(row) = row else {
            return Ok(None);
        };
        let items = sqlx::query_as::<_, OrderItemRow>(SELECT_ITEMS)
            .bind(row.id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_pg_err)?;
        Ok(Some(row_to_order(row, items)?))
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_pg_err)?;

        let (customer_user_id, guest_name, guest_email, guest_phone) = match &order.customer {
            Customer::Registered { user_id } => (Some(*user_id), None, None, None),
            Customer::Guest { name, email, phone } => (
                None,
                Some(name.clone()),
                Some(email.as_inner().clone()),
                Some(phone.as_inner().clone()),
            ),
        };

        sqlx::query(
            "INSERT INTO orders (id, order_number, customer_user_id, guest_name, guest_email, guest_phone, \
             address_line1, address_line2, city, state, zip, requested_date, subtotal_cents, tax_cents, \
             discount_cents, total_cents, status, payment_reference, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)",
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(customer_user_id)
        .bind(guest_name)
        .bind(guest_email)
        .bind(guest_phone)
        .bind(&order.address.line1)
        .bind(&order.address.line2)
        .bind(&order.address.city)
        .bind(&order.address.state)
        .bind(&order.address.zip)
        .bind(order.requested_date)
        .bind(order.subtotal_cents)
        .bind(order.tax_cents)
        .bind(order.discount_cents)
        .bind(order.total_cents)
        .bind(order_status_to_str(order.status))
        .bind(&order.payment_reference)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_pg_err)?;

        for item in &order.items {
            sqlx::query(
                "INSERT INTO order_items (id, order_id, menu_item_id, name, price_cents, quantity) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(item.id)
            .bind(item.order_id)
            .bind(item.menu_item_id)
            .bind(&item.name)
            .bind(item.price_cents)
            .bind(item.quantity as i32)
            .execute(&mut *tx)
            .await
            .map_err(map_pg_err)?;
        }

        tx.commit().await.map_err(map_pg_err)?;
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("{SELECT_ORDER} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_pg_err)?;
        self.load_order(row).await
    }

    async fn get_by_number(&self, order_number: &str) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("{SELECT_ORDER} WHERE order_number = $1"))
            .bind(order_number)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_pg_err)?;
        self.load_order(row).await
    }

    async fn find_by_payment_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Order>, StoreError> {
        let row =
            sqlx::query_as::<_, OrderRow>(&format!("{SELECT_ORDER} WHERE payment_reference = $1"))
                .bind(reference)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_pg_err)?;
        self.load_order(row).await
    }

    async fn update_status(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<(), StoreError> {
        // Guarded write: a transition that raced us leaves zero rows touched
        // instead of stomping the other writer's status.
        let result = sqlx::query(
            "UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2 AND status = $3",
        )
        .bind(order_status_to_str(to))
        .bind(id)
        .bind(order_status_to_str(from))
        .execute(&self.pool)
        .await
        .map_err(map_pg_err)?;

        if result.rows_affected() == 0 {
            let exists = sqlx::query_scalar::<_, String>("SELECT status FROM orders WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_pg_err)?;
            return Err(match exists {
                Some(_) => StoreError::Conflict("order_status"),
                None => StoreError::NotFound,
            });
        }
        Ok(())
    }

    async fn list_by_status(&self, statuses: &[OrderStatus]) -> Result<Vec<Order>, StoreError> {
        let names: Vec<String> = statuses
            .iter()
            .map(|s| order_status_to_str(*s).to_string())
            .collect();

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "{SELECT_ORDER} WHERE status = ANY($1) ORDER BY created_at"
        ))
        .bind(names)
        .fetch_all(&self.pool)
        .await
        .map_err(map_pg_err)?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(order) = self.load_order(Some(row)).await? {
                orders.push(order);
            }
        }
        Ok(orders)
    }
}
