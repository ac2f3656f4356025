//! Promotion validation and redemption.
//!
//! `validate` runs the checks in a fixed order and short-circuits on the
//! first failure so callers always get the most specific rejection.
//! `redeem` delegates to the store's atomic redemption write; the engine
//! never does a read-then-write on the usage counter.

use chrono::Utc;
use dishpatch_core::{
    DiscountType, PromoError, Promotion, PromotionStore, RedeemOutcome, StoreError,
};
use std::sync::Arc;
use uuid::Uuid;

/// Outcome of a successful validation: the discount the order would be
/// granted, plus the promotion to redeem at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedPromotion {
    pub promotion_id: Uuid,
    pub discount: i64,
}

#[derive(Clone)]
pub struct PromotionEngine {
    store: Arc<dyn PromotionStore>,
}

impl PromotionEngine {
    pub fn new(store: Arc<dyn PromotionStore>) -> Self {
        Self { store }
    }

    /// Validate `code` against the order being built. `order_total` is the
    /// pre-discount items subtotal.
    pub async fn validate(
        &self,
        code: &str,
        order_total: i64,
        restaurant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Result<ValidatedPromotion, PromoError>, StoreError> {
        let promotion = match self.store.fetch_by_code(code).await? {
            Some(p) if p.is_active => p,
            _ => return Ok(Err(PromoError::CodeNotFound)),
        };

        if !promotion.within_window(Utc::now()) {
            return Ok(Err(PromoError::Expired));
        }
        if !promotion.has_usage_headroom() {
            return Ok(Err(PromoError::LimitReached));
        }
        if let Some(minimum) = promotion.min_order {
            if order_total < minimum {
                return Ok(Err(PromoError::BelowMinimum { minimum }));
            }
        }
        if !promotion.applies_to(restaurant_id) {
            return Ok(Err(PromoError::NotApplicable));
        }
        if self.store.has_redemption(promotion.id, user_id).await? {
            return Ok(Err(PromoError::AlreadyUsed));
        }

        Ok(Ok(ValidatedPromotion {
            promotion_id: promotion.id,
            discount: discount_for(&promotion, order_total),
        }))
    }

    /// Consume one unit of the promotion's usage limit for `user_id`.
    /// Both failure modes mean another request won the race after our
    /// earlier `validate`; the caller falls back to pricing without the
    /// discount.
    pub async fn redeem(
        &self,
        promotion_id: Uuid,
        user_id: Uuid,
    ) -> Result<Result<(), PromoError>, StoreError> {
        match self.store.redeem(promotion_id, user_id).await? {
            RedeemOutcome::Redeemed => Ok(Ok(())),
            RedeemOutcome::AlreadyUsed => {
                tracing::warn!(%promotion_id, %user_id, "redemption lost uniqueness race");
                Ok(Err(PromoError::AlreadyUsed))
            }
            RedeemOutcome::LimitReached => {
                tracing::warn!(%promotion_id, "redemption lost usage-limit race");
                Ok(Err(PromoError::LimitReached))
            }
        }
    }

    /// Register a new promotion. Admin surface only.
    pub async fn create(&self, promotion: &Promotion) -> Result<(), StoreError> {
        self.store.insert_promotion(promotion).await?;
        tracing::info!(promotion_id = %promotion.id, code = %promotion.code, "promotion created");
        Ok(())
    }

    /// Deactivate a promotion by code. Returns whether the code existed.
    /// Orders that already redeemed it keep their discount.
    pub async fn deactivate(&self, code: &str) -> Result<bool, StoreError> {
        self.store.deactivate(code).await
    }
}

/// Discount granted by `promotion` on `order_total`. The flat amount is not
/// floored here; the pricing calculator clamps it to the subtotal. The
/// percentage product is widened to i128 so extreme configured values
/// saturate instead of wrapping.
pub fn discount_for(promotion: &Promotion, order_total: i64) -> i64 {
    match promotion.discount_type {
        DiscountType::Percentage => {
            let raw = i128::from(order_total) * i128::from(promotion.value) / 100;
            let discount = i64::try_from(raw).unwrap_or(i64::MAX);
            match promotion.max_discount {
                Some(cap) => discount.min(cap),
                None => discount,
            }
        }
        DiscountType::Flat => promotion.value,
    }
}
