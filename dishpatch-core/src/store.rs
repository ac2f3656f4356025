use crate::error::StoreError;
use crate::order::{Cancellation, Order, StatusHistoryEntry};
use crate::promotion::Promotion;
use crate::status::OrderStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// What a validated transition writes alongside the status itself.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancellation: Option<Cancellation>,
    pub driver: DriverChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverChange {
    Keep,
    Assign(Uuid),
    Release,
}

/// Order persistence. Conditional operations return whether the expected
/// row state still matched; callers treat `false` as a lost race, not an
/// error. Implementations must make each method all-or-nothing.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist the order, its items and the initial history entry as one
    /// atomic unit.
    async fn insert_order(&self, order: &Order, initial: &StatusHistoryEntry) -> Result<(), StoreError>;

    async fn fetch_order(&self, id: Uuid) -> Result<Option<Order>, StoreError>;

    async fn fetch_history(&self, order_id: Uuid) -> Result<Vec<StatusHistoryEntry>, StoreError>;

    async fn list_orders(&self, customer_id: Uuid) -> Result<Vec<Order>, StoreError>;

    /// Apply `update` and append `entry` only if the order's status still
    /// equals `expected`. Returns whether the write happened.
    async fn apply_transition(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        update: &StatusUpdate,
        entry: &StatusHistoryEntry,
    ) -> Result<bool, StoreError>;

    /// Drop a granted discount after a lost redemption race, recomputing
    /// the total from the stored subtotal and fee.
    async fn clear_discount(&self, order_id: Uuid) -> Result<(), StoreError>;

    /// Orders per non-terminal status, for dashboard collaborators.
    async fn count_active(&self) -> Result<HashMap<OrderStatus, i64>, StoreError>;
}

/// Result of the atomic redemption write: redemption insert guarded by the
/// `(promotion, user)` uniqueness invariant plus a conditional usage-counter
/// increment, in a single transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedeemOutcome {
    Redeemed,
    /// The uniqueness insert hit an existing pair.
    AlreadyUsed,
    /// The conditional increment matched zero rows.
    LimitReached,
}

#[async_trait]
pub trait PromotionStore: Send + Sync {
    /// Case-insensitive code lookup.
    async fn fetch_by_code(&self, code: &str) -> Result<Option<Promotion>, StoreError>;

    async fn has_redemption(&self, promotion_id: Uuid, user_id: Uuid) -> Result<bool, StoreError>;

    /// The race-closing write: never check-then-act in application code.
    async fn redeem(&self, promotion_id: Uuid, user_id: Uuid) -> Result<RedeemOutcome, StoreError>;

    async fn insert_promotion(&self, promotion: &Promotion) -> Result<(), StoreError>;

    /// Returns whether the code existed.
    async fn deactivate(&self, code: &str) -> Result<bool, StoreError>;
}

/// Configuration source for the current delivery fee. Read once per order
/// creation; the value is stamped onto the order and never revisited.
pub trait DeliveryFees: Send + Sync {
    fn delivery_fee(&self) -> i64;
}

/// Constant fee, for tests and local runs.
pub struct FixedDeliveryFee(pub i64);

impl DeliveryFees for FixedDeliveryFee {
    fn delivery_fee(&self) -> i64 {
        self.0
    }
}
