use crate::status::OrderStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named channel grouping related events for subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Timeline of a single order, watched by tracking views.
    Order(Uuid),
    /// Count-changing events across all orders, watched by dashboards.
    Dashboard,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Created,
    StatusChanged,
}

/// A lifecycle event, published after the persistence commit. Subscribers
/// that miss events recover by re-reading the store, never by replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEvent {
    pub kind: EventKind,
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub previous_status: Option<OrderStatus>,
    pub occurred_at: DateTime<Utc>,
}

impl OrderEvent {
    pub fn created(order_id: Uuid) -> Self {
        Self {
            kind: EventKind::Created,
            order_id,
            status: OrderStatus::Pending,
            previous_status: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn status_changed(order_id: Uuid, from: OrderStatus, to: OrderStatus) -> Self {
        Self {
            kind: EventKind::StatusChanged,
            order_id,
            status: to,
            previous_status: Some(from),
            occurred_at: Utc::now(),
        }
    }

    /// Whether dashboards watching active-order counts care about this
    /// event: creations and transitions into a terminal status.
    pub fn changes_active_count(&self) -> bool {
        self.kind == EventKind::Created || self.status.is_terminal()
    }
}
