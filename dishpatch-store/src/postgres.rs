//! Postgres backend. Transitions and redemptions are conditional writes at
//! the storage layer ("update only if the row still matches"), so multiple
//! service instances can safely handle requests for the same order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dishpatch_core::{
    ActorRole, Cancellation, DeliveryAddress, DriverChange, Order, OrderItem, OrderStatus,
    OrderStore, PaymentStatus, Promotion, PromotionStore, RedeemOutcome, StatusHistoryEntry,
    StatusUpdate, StoreError,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(connection_string: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;
        Ok(Self { pool })
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    customer_id: Uuid,
    restaurant_id: Uuid,
    driver_id: Option<Uuid>,
    status: String,
    subtotal: i64,
    delivery_fee: i64,
    discount: i64,
    total: i64,
    payment_method: String,
    payment_status: String,
    delivery_address: String,
    delivery_lat: f64,
    delivery_lng: f64,
    promotion_id: Option<Uuid>,
    cancel_reason: Option<String>,
    cancelled_by: Option<String>,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, StoreError> {
        let cancellation = match (self.cancel_reason, self.cancelled_by) {
            (Some(reason), Some(role)) => Some(Cancellation {
                reason,
                cancelled_by: role.parse::<ActorRole>().map_err(StoreError::decode)?,
            }),
            _ => None,
        };
        Ok(Order {
            id: self.id,
            customer_id: self.customer_id,
            restaurant_id: self.restaurant_id,
            driver_id: self.driver_id,
            items,
            subtotal: self.subtotal,
            delivery_fee: self.delivery_fee,
            discount: self.discount,
            total: self.total,
            status: self.status.parse::<OrderStatus>().map_err(StoreError::decode)?,
            payment_method: self.payment_method,
            payment_status: self
                .payment_status
                .parse::<PaymentStatus>()
                .map_err(StoreError::decode)?,
            delivery_address: DeliveryAddress {
                address: self.delivery_address,
                latitude: self.delivery_lat,
                longitude: self.delivery_lng,
            },
            promotion_id: self.promotion_id,
            cancellation,
            delivered_at: self.delivered_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    menu_item_id: Uuid,
    quantity: i32,
    unit_price: i64,
    notes: Option<String>,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            id: row.id,
            menu_item_id: row.menu_item_id,
            quantity: row.quantity,
            unit_price: row.unit_price,
            notes: row.notes,
        }
    }
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    id: Uuid,
    order_id: Uuid,
    status: String,
    actor_role: String,
    actor_id: Option<Uuid>,
    note: Option<String>,
    created_at: DateTime<Utc>,
}

impl HistoryRow {
    fn into_entry(self) -> Result<StatusHistoryEntry, StoreError> {
        Ok(StatusHistoryEntry {
            id: self.id,
            order_id: self.order_id,
            status: self.status.parse::<OrderStatus>().map_err(StoreError::decode)?,
            actor_role: self.actor_role.parse::<ActorRole>().map_err(StoreError::decode)?,
            actor_id: self.actor_id,
            note: self.note,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PromotionRow {
    id: Uuid,
    code: String,
    discount_type: String,
    value: i64,
    max_discount: Option<i64>,
    min_order: Option<i64>,
    restaurant_ids: Option<Vec<Uuid>>,
    valid_from: DateTime<Utc>,
    valid_until: DateTime<Utc>,
    usage_limit: Option<i64>,
    used_count: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl PromotionRow {
    fn into_promotion(self) -> Result<Promotion, StoreError> {
        Ok(Promotion {
            id: self.id,
            code: self.code,
            discount_type: self.discount_type.parse().map_err(StoreError::decode)?,
            value: self.value,
            max_discount: self.max_discount,
            min_order: self.min_order,
            restaurant_ids: self.restaurant_ids,
            valid_from: self.valid_from,
            valid_until: self.valid_until,
            usage_limit: self.usage_limit,
            used_count: self.used_count,
            is_active: self.is_active,
            created_at: self.created_at,
        })
    }
}

async fn fetch_items(pool: &PgPool, order_id: Uuid) -> Result<Vec<OrderItem>, StoreError> {
    let rows: Vec<OrderItemRow> = sqlx::query_as(
        "SELECT id, menu_item_id, quantity, unit_price, notes
         FROM order_items WHERE order_id = $1 ORDER BY position",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await
    .map_err(StoreError::backend)?;
    Ok(rows.into_iter().map(OrderItem::from).collect())
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn insert_order(&self, order: &Order, initial: &StatusHistoryEntry) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::backend)?;

        sqlx::query(
            "INSERT INTO orders (id, customer_id, restaurant_id, driver_id, status,
                subtotal, delivery_fee, discount, total,
                payment_method, payment_status,
                delivery_address, delivery_lat, delivery_lng,
                promotion_id, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
        )
        .bind(order.id)
        .bind(order.customer_id)
        .bind(order.restaurant_id)
        .bind(order.driver_id)
        .bind(order.status.as_str())
        .bind(order.subtotal)
        .bind(order.delivery_fee)
        .bind(order.discount)
        .bind(order.total)
        .bind(&order.payment_method)
        .bind(order.payment_status.as_str())
        .bind(&order.delivery_address.address)
        .bind(order.delivery_address.latitude)
        .bind(order.delivery_address.longitude)
        .bind(order.promotion_id)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::backend)?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_items (id, order_id, menu_item_id, quantity, unit_price, notes, position)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(item.id)
            .bind(order.id)
            .bind(item.menu_item_id)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(&item.notes)
            .bind(position as i32)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::backend)?;
        }

        insert_history(&mut tx, initial).await?;

        tx.commit().await.map_err(StoreError::backend)?;
        Ok(())
    }

    async fn fetch_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let row: Option<OrderRow> = sqlx::query_as("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        match row {
            Some(row) => {
                let items = fetch_items(&self.pool, id).await?;
                Ok(Some(row.into_order(items)?))
            }
            None => Ok(None),
        }
    }

    async fn fetch_history(&self, order_id: Uuid) -> Result<Vec<StatusHistoryEntry>, StoreError> {
        let rows: Vec<HistoryRow> = sqlx::query_as(
            "SELECT id, order_id, status, actor_role, actor_id, note, created_at
             FROM status_history WHERE order_id = $1 ORDER BY created_at",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        rows.into_iter().map(HistoryRow::into_entry).collect()
    }

    async fn list_orders(&self, customer_id: Uuid) -> Result<Vec<Order>, StoreError> {
        let rows: Vec<OrderRow> =
            sqlx::query_as("SELECT * FROM orders WHERE customer_id = $1 ORDER BY created_at DESC")
                .bind(customer_id)
                .fetch_all(&self.pool)
                .await
                .map_err(StoreError::backend)?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let items = fetch_items(&self.pool, row.id).await?;
            orders.push(row.into_order(items)?);
        }
        Ok(orders)
    }

    async fn apply_transition(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        update: &StatusUpdate,
        entry: &StatusHistoryEntry,
    ) -> Result<bool, StoreError> {
        let (driver_mode, driver_id) = match update.driver {
            DriverChange::Keep => ("KEEP", None),
            DriverChange::Assign(id) => ("ASSIGN", Some(id)),
            DriverChange::Release => ("RELEASE", None),
        };
        let (cancel_reason, cancelled_by) = match &update.cancellation {
            Some(c) => (Some(c.reason.clone()), Some(c.cancelled_by.as_str())),
            None => (None, None),
        };

        let mut tx = self.pool.begin().await.map_err(StoreError::backend)?;

        // The optimistic-concurrency guard: the write only lands if the
        // status still matches the value read at validation time.
        let result = sqlx::query(
            "UPDATE orders SET
                status = $3,
                updated_at = $4,
                delivered_at = COALESCE($5, delivered_at),
                cancel_reason = COALESCE($6, cancel_reason),
                cancelled_by = COALESCE($7, cancelled_by),
                driver_id = CASE $8
                    WHEN 'ASSIGN' THEN $9
                    WHEN 'RELEASE' THEN NULL
                    ELSE driver_id
                END
             WHERE id = $1 AND status = $2",
        )
        .bind(order_id)
        .bind(expected.as_str())
        .bind(update.status.as_str())
        .bind(entry.created_at)
        .bind(update.delivered_at)
        .bind(cancel_reason)
        .bind(cancelled_by)
        .bind(driver_mode)
        .bind(driver_id)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::backend)?;

        if result.rows_affected() == 0 {
            tx.rollback().await.map_err(StoreError::backend)?;
            return Ok(false);
        }

        insert_history(&mut tx, entry).await?;
        tx.commit().await.map_err(StoreError::backend)?;
        Ok(true)
    }

    async fn clear_discount(&self, order_id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE orders SET discount = 0, promotion_id = NULL,
                total = subtotal + delivery_fee
             WHERE id = $1",
        )
        .bind(order_id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        Ok(())
    }

    async fn count_active(&self) -> Result<HashMap<OrderStatus, i64>, StoreError> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) AS n FROM orders
             WHERE status NOT IN ('DELIVERED', 'CANCELLED')
             GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        let mut counts = HashMap::new();
        for row in rows {
            let status: String = row.try_get("status").map_err(StoreError::backend)?;
            let n: i64 = row.try_get("n").map_err(StoreError::backend)?;
            counts.insert(status.parse::<OrderStatus>().map_err(StoreError::decode)?, n);
        }
        Ok(counts)
    }
}

async fn insert_history(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    entry: &StatusHistoryEntry,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO status_history (id, order_id, status, actor_role, actor_id, note, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(entry.id)
    .bind(entry.order_id)
    .bind(entry.status.as_str())
    .bind(entry.actor_role.as_str())
    .bind(entry.actor_id)
    .bind(&entry.note)
    .bind(entry.created_at)
    .execute(&mut **tx)
    .await
    .map_err(StoreError::backend)?;
    Ok(())
}

#[async_trait]
impl PromotionStore for PostgresStore {
    async fn fetch_by_code(&self, code: &str) -> Result<Option<Promotion>, StoreError> {
        let row: Option<PromotionRow> =
            sqlx::query_as("SELECT * FROM promotions WHERE lower(code) = lower($1)")
                .bind(code)
                .fetch_optional(&self.pool)
                .await
                .map_err(StoreError::backend)?;
        row.map(PromotionRow::into_promotion).transpose()
    }

    async fn has_redemption(&self, promotion_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let row = sqlx::query(
            "SELECT 1 AS one FROM promotion_redemptions WHERE promotion_id = $1 AND user_id = $2",
        )
        .bind(promotion_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        Ok(row.is_some())
    }

    async fn redeem(&self, promotion_id: Uuid, user_id: Uuid) -> Result<RedeemOutcome, StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::backend)?;

        // Uniqueness invariant closes the per-user race: the second insert
        // for the same pair matches zero rows.
        let inserted = sqlx::query(
            "INSERT INTO promotion_redemptions (promotion_id, user_id, created_at)
             VALUES ($1, $2, $3)
             ON CONFLICT (promotion_id, user_id) DO NOTHING",
        )
        .bind(promotion_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(StoreError::backend)?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await.map_err(StoreError::backend)?;
            return Ok(RedeemOutcome::AlreadyUsed);
        }

        // Single conditional increment closes the usage-limit race between
        // two customers taking the last remaining use.
        let incremented = sqlx::query(
            "UPDATE promotions SET used_count = used_count + 1
             WHERE id = $1 AND (usage_limit IS NULL OR used_count < usage_limit)",
        )
        .bind(promotion_id)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::backend)?;

        if incremented.rows_affected() == 0 {
            tx.rollback().await.map_err(StoreError::backend)?;
            return Ok(RedeemOutcome::LimitReached);
        }

        tx.commit().await.map_err(StoreError::backend)?;
        Ok(RedeemOutcome::Redeemed)
    }

    async fn insert_promotion(&self, promotion: &Promotion) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO promotions (id, code, discount_type, value, max_discount, min_order,
                restaurant_ids, valid_from, valid_until, usage_limit, used_count, is_active, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(promotion.id)
        .bind(&promotion.code)
        .bind(promotion.discount_type.as_str())
        .bind(promotion.value)
        .bind(promotion.max_discount)
        .bind(promotion.min_order)
        .bind(&promotion.restaurant_ids)
        .bind(promotion.valid_from)
        .bind(promotion.valid_until)
        .bind(promotion.usage_limit)
        .bind(promotion.used_count)
        .bind(promotion.is_active)
        .bind(promotion.created_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        Ok(())
    }

    async fn deactivate(&self, code: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE promotions SET is_active = FALSE WHERE lower(code) = lower($1)")
            .bind(code)
            .execute(&self.pool)
            .await
            .map_err(StoreError::backend)?;
        Ok(result.rows_affected() > 0)
    }
}
