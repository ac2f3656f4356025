use crate::actor::{Actor, ActorRole};
use crate::status::OrderStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Settlement state of the order's payment. Carried as data only; gateway
/// integration lives outside this core.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "PAID" => Ok(PaymentStatus::Paid),
            "FAILED" => Ok(PaymentStatus::Failed),
            "REFUNDED" => Ok(PaymentStatus::Refunded),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryAddress {
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// A line item. Unit price is a snapshot taken at checkout and never
/// recomputed from the menu afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub menu_item_id: Uuid,
    pub quantity: i32,
    pub unit_price: i64,
    pub notes: Option<String>,
}

impl OrderItem {
    pub fn new(menu_item_id: Uuid, quantity: i32, unit_price: i64, notes: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            menu_item_id,
            quantity,
            unit_price,
            notes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cancellation {
    pub reason: String,
    pub cancelled_by: ActorRole,
}

/// The single source of truth for one customer order. Status and the
/// driver/delivered fields are mutated only through the lifecycle manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub restaurant_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub items: Vec<OrderItem>,
    pub subtotal: i64,
    pub delivery_fee: i64,
    pub discount: i64,
    pub total: i64,
    pub status: OrderStatus,
    pub payment_method: String,
    pub payment_status: PaymentStatus,
    pub delivery_address: DeliveryAddress,
    pub promotion_id: Option<Uuid>,
    pub cancellation: Option<Cancellation>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Money invariant: total is exactly subtotal + fee - discount, never
    /// negative, with the discount bounded by the subtotal.
    pub fn totals_consistent(&self) -> bool {
        self.total == self.subtotal + self.delivery_fee - self.discount
            && self.total >= 0
            && (0..=self.subtotal).contains(&self.discount)
    }
}

/// One append-only record per status transition, including the initial
/// `PENDING` entry written together with the order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub id: Uuid,
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub actor_role: ActorRole,
    pub actor_id: Option<Uuid>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StatusHistoryEntry {
    pub fn new(order_id: Uuid, status: OrderStatus, actor: Actor, note: Option<String>) -> Self {
        let actor_id = (actor.role != ActorRole::System).then_some(actor.id);
        Self {
            id: Uuid::new_v4(),
            order_id,
            status,
            actor_role: actor.role,
            actor_id,
            note,
            created_at: Utc::now(),
        }
    }
}
