//! The order status state machine: validates transitions, enforces actor
//! permissions, appends history, and hands committed changes to the
//! broadcaster.
//!
//! Per-order serialization is delegated to the store's conditional update
//! rather than in-process locks, since multiple service instances may
//! handle requests for the same order. A transition that loses the race is
//! re-evaluated once against the fresh status, then surfaced as `Conflict`.

use crate::permissions::permitted;
use chrono::Utc;
use dishpatch_core::{
    Actor, ActorRole, Cancellation, DeliveryAddress, DeliveryFees, DriverChange, Order,
    OrderError, OrderEvent, OrderItem, OrderStatus, OrderStore, PaymentStatus,
    StatusHistoryEntry, StatusUpdate,
};
use dishpatch_events::Broadcaster;
use dishpatch_pricing::{items_subtotal, price_order};
use dishpatch_promo::{PromotionEngine, ValidatedPromotion};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Checkout submission.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub customer_id: Uuid,
    pub restaurant_id: Uuid,
    pub items: Vec<OrderItem>,
    pub delivery_address: DeliveryAddress,
    pub payment_method: String,
    pub promo_code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OrderWithHistory {
    pub order: Order,
    pub history: Vec<StatusHistoryEntry>,
}

pub struct LifecycleManager {
    store: Arc<dyn OrderStore>,
    promotions: PromotionEngine,
    broadcaster: Arc<Broadcaster>,
    fees: Arc<dyn DeliveryFees>,
}

impl LifecycleManager {
    pub fn new(
        store: Arc<dyn OrderStore>,
        promotions: PromotionEngine,
        broadcaster: Arc<Broadcaster>,
        fees: Arc<dyn DeliveryFees>,
    ) -> Self {
        Self { store, promotions, broadcaster, fees }
    }

    /// Create an order: price it, apply the promotion if one validates,
    /// persist order + items + the initial `PENDING` history entry as one
    /// atomic unit, then redeem the promotion and emit `created`.
    ///
    /// A promotion that fails validation degrades checkout to no discount
    /// rather than failing it; the standalone validate surface is where
    /// rejections reach the user.
    pub async fn create(&self, req: CreateOrder) -> Result<OrderWithHistory, OrderError> {
        // Fee snapshot: read once, stamped onto the order, immutable after.
        let delivery_fee = self.fees.delivery_fee();

        let subtotal =
            items_subtotal(&req.items).map_err(|e| OrderError::Validation(e.to_string()))?;

        let validated = match &req.promo_code {
            Some(code) => {
                match self
                    .promotions
                    .validate(code, subtotal, req.restaurant_id, req.customer_id)
                    .await?
                {
                    Ok(v) => Some(v),
                    Err(reason) => {
                        tracing::warn!(%code, %reason, "promotion rejected at checkout, pricing without discount");
                        None
                    }
                }
            }
            None => None,
        };

        let discount = validated.map(|v| v.discount).unwrap_or(0);
        let quote = price_order(&req.items, delivery_fee, discount)
            .map_err(|e| OrderError::Validation(e.to_string()))?;

        let now = Utc::now();
        let mut order = Order {
            id: Uuid::new_v4(),
            customer_id: req.customer_id,
            restaurant_id: req.restaurant_id,
            driver_id: None,
            items: req.items,
            subtotal: quote.subtotal,
            delivery_fee: quote.delivery_fee,
            discount: quote.discount,
            total: quote.total,
            status: OrderStatus::Pending,
            payment_method: req.payment_method,
            payment_status: PaymentStatus::Pending,
            delivery_address: req.delivery_address,
            promotion_id: validated.map(|v| v.promotion_id),
            cancellation: None,
            delivered_at: None,
            created_at: now,
            updated_at: now,
        };

        let customer = Actor::new(req.customer_id, ActorRole::Customer);
        let initial = StatusHistoryEntry::new(order.id, OrderStatus::Pending, customer, None);

        self.store.insert_order(&order, &initial).await?;

        if let Some(v) = validated {
            self.settle_redemption(&mut order, v).await?;
        }

        tracing::info!(order_id = %order.id, total = order.total, "order created");
        self.broadcaster.publish_lifecycle(&OrderEvent::created(order.id));

        Ok(OrderWithHistory { order, history: vec![initial] })
    }

    /// Redeem after the order is persisted. Losing the redemption race is
    /// not an error: the stored totals are conditionally rewritten without
    /// the discount, per the promotion contract.
    async fn settle_redemption(
        &self,
        order: &mut Order,
        v: ValidatedPromotion,
    ) -> Result<(), OrderError> {
        match self.promotions.redeem(v.promotion_id, order.customer_id).await? {
            Ok(()) => Ok(()),
            Err(reason) => {
                tracing::warn!(
                    order_id = %order.id,
                    promotion_id = %v.promotion_id,
                    %reason,
                    "redemption lost the race, repricing order without discount"
                );
                self.store.clear_discount(order.id).await?;
                order.discount = 0;
                order.promotion_id = None;
                order.total = order.subtotal + order.delivery_fee;
                Ok(())
            }
        }
    }

    /// Apply a validated status transition. Optimistic concurrency: the
    /// write is conditioned on the status still matching the value read at
    /// validation time; a mismatch is retried once against the fresh
    /// status, then surfaced as `Conflict`.
    pub async fn transition(
        &self,
        order_id: Uuid,
        target: OrderStatus,
        actor: Actor,
        reason: Option<String>,
    ) -> Result<OrderWithHistory, OrderError> {
        for attempt in 0..2 {
            let order = self
                .store
                .fetch_order(order_id)
                .await?
                .ok_or(OrderError::NotFound(order_id))?;
            let current = order.status;

            validate_transition(current, target, actor, reason.as_deref())?;

            let update = build_update(current, target, actor, reason.clone());
            let entry = StatusHistoryEntry::new(order_id, target, actor, reason.clone());

            if self.store.apply_transition(order_id, current, &update, &entry).await? {
                tracing::info!(%order_id, from = %current, to = %target, role = %actor.role, "order transitioned");
                // Events go out only after the persistence commit.
                self.broadcaster
                    .publish_lifecycle(&OrderEvent::status_changed(order_id, current, target));
                return self.get_order(order_id).await;
            }

            tracing::debug!(%order_id, attempt, "transition lost status race, re-evaluating");
        }

        Err(OrderError::Conflict(format!(
            "order {order_id} was concurrently updated"
        )))
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderWithHistory, OrderError> {
        let order = self
            .store
            .fetch_order(order_id)
            .await?
            .ok_or(OrderError::NotFound(order_id))?;
        let history = self.store.fetch_history(order_id).await?;
        Ok(OrderWithHistory { order, history })
    }

    pub async fn list_orders(&self, customer_id: Uuid) -> Result<Vec<Order>, OrderError> {
        Ok(self.store.list_orders(customer_id).await?)
    }

    /// Orders per non-terminal status, for dashboards.
    pub async fn active_counts(&self) -> Result<HashMap<OrderStatus, i64>, OrderError> {
        Ok(self.store.count_active().await?)
    }
}

fn validate_transition(
    current: OrderStatus,
    target: OrderStatus,
    actor: Actor,
    reason: Option<&str>,
) -> Result<(), OrderError> {
    if current.is_terminal() {
        return Err(OrderError::InvalidTransition { from: current, to: target });
    }

    if target == OrderStatus::Cancelled {
        if !permitted(actor.role, current, target) {
            return Err(OrderError::Forbidden(format!(
                "{} may not cancel an order in status {current}",
                actor.role
            )));
        }
        match reason {
            Some(r) if !r.trim().is_empty() => {}
            _ => return Err(OrderError::Validation("cancellation requires a reason".into())),
        }
        return Ok(());
    }

    if !current.can_advance_to(target) {
        return Err(OrderError::InvalidTransition { from: current, to: target });
    }
    if !permitted(actor.role, current, target) {
        return Err(OrderError::Forbidden(format!(
            "{} may not move an order from {current} to {target}",
            actor.role
        )));
    }
    Ok(())
}

fn build_update(
    current: OrderStatus,
    target: OrderStatus,
    actor: Actor,
    reason: Option<String>,
) -> StatusUpdate {
    let driver = if target == OrderStatus::Assigned && actor.role == ActorRole::Driver {
        DriverChange::Assign(actor.id)
    } else if current == OrderStatus::Assigned && target == OrderStatus::Ready {
        DriverChange::Release
    } else {
        DriverChange::Keep
    };

    StatusUpdate {
        status: target,
        delivered_at: (target == OrderStatus::Delivered).then(Utc::now),
        cancellation: (target == OrderStatus::Cancelled).then(|| Cancellation {
            reason: reason.unwrap_or_default(),
            cancelled_by: actor.role,
        }),
        driver,
    }
}
