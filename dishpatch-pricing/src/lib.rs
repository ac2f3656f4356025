//! Pure order pricing: subtotal, delivery fee, discount, total.
//!
//! No I/O and no state; safe for unlimited concurrent use. The delivery fee
//! is whatever the caller read from configuration at creation time — it is
//! stamped onto the order and never recomputed here.

use dishpatch_core::OrderItem;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("order has no items")]
    EmptyOrder,

    #[error("item quantity must be positive, got {0}")]
    NonPositiveQuantity(i32),

    #[error("item unit price must not be negative, got {0}")]
    NegativePrice(i64),

    #[error("delivery fee must not be negative, got {0}")]
    NegativeFee(i64),

    #[error("order amounts exceed the representable range")]
    AmountOverflow,
}

/// Computed money breakdown for one order. All amounts in minor units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Quote {
    pub subtotal: i64,
    pub delivery_fee: i64,
    pub discount: i64,
    pub total: i64,
}

/// Subtotal of the line items alone, used to evaluate promotions before
/// the full quote exists.
pub fn items_subtotal(items: &[OrderItem]) -> Result<i64, PricingError> {
    if items.is_empty() {
        return Err(PricingError::EmptyOrder);
    }
    let mut subtotal = 0i64;
    for item in items {
        if item.quantity <= 0 {
            return Err(PricingError::NonPositiveQuantity(item.quantity));
        }
        if item.unit_price < 0 {
            return Err(PricingError::NegativePrice(item.unit_price));
        }
        let line = item
            .unit_price
            .checked_mul(i64::from(item.quantity))
            .ok_or(PricingError::AmountOverflow)?;
        subtotal = subtotal.checked_add(line).ok_or(PricingError::AmountOverflow)?;
    }
    Ok(subtotal)
}

/// Price an order. The discount is clamped to `[0, subtotal]` before
/// subtraction, so the total can never go negative.
pub fn price_order(items: &[OrderItem], delivery_fee: i64, discount: i64) -> Result<Quote, PricingError> {
    if delivery_fee < 0 {
        return Err(PricingError::NegativeFee(delivery_fee));
    }
    let subtotal = items_subtotal(items)?;
    let discount = discount.clamp(0, subtotal);
    let total = subtotal
        .checked_add(delivery_fee)
        .ok_or(PricingError::AmountOverflow)?
        - discount;
    Ok(Quote { subtotal, delivery_fee, discount, total })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn item(unit_price: i64, quantity: i32) -> OrderItem {
        OrderItem::new(Uuid::new_v4(), quantity, unit_price, None)
    }

    #[test]
    fn test_basic_quote() {
        let quote = price_order(&[item(1200, 2), item(600, 1)], 300, 0).unwrap();
        assert_eq!(quote.subtotal, 3000);
        assert_eq!(quote.total, 3300);
    }

    #[test]
    fn test_total_invariant_holds() {
        let quote = price_order(&[item(500, 1)], 30, 50).unwrap();
        assert_eq!(quote.total, quote.subtotal + quote.delivery_fee - quote.discount);
        assert_eq!(quote.total, 480);
    }

    #[test]
    fn test_discount_clamped_to_subtotal() {
        let quote = price_order(&[item(200, 1)], 30, 900).unwrap();
        assert_eq!(quote.discount, 200);
        assert_eq!(quote.total, 30);
    }

    #[test]
    fn test_negative_discount_clamped_to_zero() {
        let quote = price_order(&[item(200, 1)], 30, -5).unwrap();
        assert_eq!(quote.discount, 0);
        assert_eq!(quote.total, 230);
    }

    #[test]
    fn test_empty_order_rejected() {
        assert_eq!(price_order(&[], 30, 0), Err(PricingError::EmptyOrder));
    }

    #[test]
    fn test_bad_quantity_rejected() {
        assert_eq!(
            price_order(&[item(100, 0)], 30, 0),
            Err(PricingError::NonPositiveQuantity(0))
        );
    }

    #[test]
    fn test_extreme_amounts_rejected_not_wrapped() {
        assert_eq!(
            price_order(&[item(i64::MAX, 2)], 30, 0),
            Err(PricingError::AmountOverflow)
        );
        assert_eq!(
            items_subtotal(&[item(i64::MAX, 1), item(1, 1)]),
            Err(PricingError::AmountOverflow)
        );
        assert_eq!(
            price_order(&[item(i64::MAX, 1)], 30, 0),
            Err(PricingError::AmountOverflow)
        );
    }

    #[test]
    fn test_negative_price_rejected() {
        assert_eq!(
            price_order(&[item(-1, 1)], 30, 0),
            Err(PricingError::NegativePrice(-1))
        );
    }
}
