//! In-memory backend with the same conditional-update contract as the SQL
//! backend. Each trait method takes the state lock exactly once, so the
//! compare-and-write operations are atomic the way their SQL counterparts
//! are. Used by tests and local runs.

use async_trait::async_trait;
use dishpatch_core::{
    DriverChange, Order, OrderStatus, OrderStore, Promotion, PromotionStore, RedeemOutcome,
    StatusHistoryEntry, StatusUpdate, StoreError,
};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    orders: HashMap<Uuid, Order>,
    history: HashMap<Uuid, Vec<StatusHistoryEntry>>,
    promotions: HashMap<Uuid, Promotion>,
    redemptions: HashSet<(Uuid, Uuid)>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(&self, order: &Order, initial: &StatusHistoryEntry) -> Result<(), StoreError> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        inner.orders.insert(order.id, order.clone());
        inner.history.insert(order.id, vec![initial.clone()]);
        Ok(())
    }

    async fn fetch_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner.orders.get(&id).cloned())
    }

    async fn fetch_history(&self, order_id: Uuid) -> Result<Vec<StatusHistoryEntry>, StoreError> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner.history.get(&order_id).cloned().unwrap_or_default())
    }

    async fn list_orders(&self, customer_id: Uuid) -> Result<Vec<Order>, StoreError> {
        let inner = self.inner.read().expect("store lock poisoned");
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| o.customer_id == customer_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn apply_transition(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        update: &StatusUpdate,
        entry: &StatusHistoryEntry,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        let Some(order) = inner.orders.get_mut(&order_id) else {
            return Ok(false);
        };
        if order.status != expected {
            return Ok(false);
        }

        order.status = update.status;
        order.updated_at = entry.created_at;
        if let Some(delivered_at) = update.delivered_at {
            order.delivered_at = Some(delivered_at);
        }
        if let Some(cancellation) = &update.cancellation {
            order.cancellation = Some(cancellation.clone());
        }
        match update.driver {
            DriverChange::Keep => {}
            DriverChange::Assign(driver_id) => order.driver_id = Some(driver_id),
            DriverChange::Release => order.driver_id = None,
        }

        inner.history.entry(order_id).or_default().push(entry.clone());
        Ok(true)
    }

    async fn clear_discount(&self, order_id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        if let Some(order) = inner.orders.get_mut(&order_id) {
            order.discount = 0;
            order.promotion_id = None;
            order.total = order.subtotal + order.delivery_fee;
        }
        Ok(())
    }

    async fn count_active(&self) -> Result<HashMap<OrderStatus, i64>, StoreError> {
        let inner = self.inner.read().expect("store lock poisoned");
        let mut counts = HashMap::new();
        for order in inner.orders.values() {
            if !order.status.is_terminal() {
                *counts.entry(order.status).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl PromotionStore for MemoryStore {
    async fn fetch_by_code(&self, code: &str) -> Result<Option<Promotion>, StoreError> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner
            .promotions
            .values()
            .find(|p| p.code.eq_ignore_ascii_case(code))
            .cloned())
    }

    async fn has_redemption(&self, promotion_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner.redemptions.contains(&(promotion_id, user_id)))
    }

    async fn redeem(&self, promotion_id: Uuid, user_id: Uuid) -> Result<RedeemOutcome, StoreError> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        if inner.redemptions.contains(&(promotion_id, user_id)) {
            return Ok(RedeemOutcome::AlreadyUsed);
        }
        // Matches the SQL backend, where this insert trips the foreign key.
        let Some(promotion) = inner.promotions.get_mut(&promotion_id) else {
            return Err(StoreError::backend(format!("unknown promotion: {promotion_id}")));
        };
        // Conditional increment and uniqueness insert under one lock, the
        // in-memory equivalent of the single SQL transaction.
        if !promotion.has_usage_headroom() {
            return Ok(RedeemOutcome::LimitReached);
        }
        promotion.used_count += 1;
        inner.redemptions.insert((promotion_id, user_id));
        Ok(RedeemOutcome::Redeemed)
    }

    async fn insert_promotion(&self, promotion: &Promotion) -> Result<(), StoreError> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        inner.promotions.insert(promotion.id, promotion.clone());
        Ok(())
    }

    async fn deactivate(&self, code: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        match inner
            .promotions
            .values_mut()
            .find(|p| p.code.eq_ignore_ascii_case(code))
        {
            Some(promotion) => {
                promotion.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_redeeming_unknown_promotion_is_a_backend_error() {
        let store = MemoryStore::new();
        let result = store.redeem(Uuid::new_v4(), Uuid::new_v4()).await;
        assert!(matches!(result, Err(StoreError::Backend(_))));
    }
}
